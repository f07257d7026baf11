//! # 大篷车管理模块
//!
//! 配置管理与日志初始化

pub mod config;
pub mod logging;

pub use config::{
    CaravaneConfig, ConfigManager, ConfigValidator, DatabaseConfig, LoggingConfig, ServerConfig,
    StorageBackend, WorkflowConfig,
};
pub use logging::init_tracing;
