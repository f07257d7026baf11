//! # 大篷车数据存储模块
//!
//! 定义患者、会诊、医务人员与大篷车活动的仓储接口，
//! 提供内存实现（测试与演示）和 PostgreSQL 实现（生产）。

pub mod connection;
pub mod filters;
pub mod memory;
pub mod models;
pub mod queries;
pub mod repository;

// 重新导出主要类型
pub use connection::DatabasePool;
pub use filters::{CareEventFilter, ClinicianFilter, ConsultationFilter, PatientFilter};
pub use memory::MemoryStore;
pub use queries::PgStore;
pub use repository::{
    CareEventRepository, ClinicianRepository, ConsultationMutation, ConsultationRepository,
    PatientRepository, Store,
};
