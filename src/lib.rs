//! # Caravane
//!
//! 医疗大篷车分诊工作流的统一入口，重新导出各子模块。

pub use caravane_core as core;
pub use caravane_database as database;
pub use caravane_workflow as workflow;
