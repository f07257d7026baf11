//! # 大篷车工作流模块
//!
//! 提供分诊转诊工作流的核心功能，包括：
//! - 会诊状态机：状态只能前进
//! - 转诊去向：专科、指定医生与超出覆盖范围标记的一致性修复
//! - 可见性计算：为各角色基于快照计算待处理患者队列
//! - 工作流服务：权限检查、校验与存储调用的统一入口
//! - 演示数据

pub mod engine;
pub mod orientation;
pub mod seed;
pub mod state_machine;
pub mod visibility;

// 重新导出主要类型
pub use engine::{
    ConsultationDetail, Dashboard, OutOfNetworkPatient, ReferredPatient, WorkflowEngine, WorkloadEntry,
};
pub use orientation::{apply_orientation, repair_orientation, OrientationPatch};
pub use seed::{seed_demo, DemoData};
pub use state_machine::{ConsultationEvent, ConsultationStateMachine};
pub use visibility::{DashboardSummary, OutOfNetworkEntry, ReferralEntry, SpecialistBeneficiaries};
