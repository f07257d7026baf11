//! 错误定义模块

use crate::models::ConsultationStatus;
use crate::validation::ValidationErrors;
use thiserror::Error;

/// 系统统一错误类型
#[derive(Error, Debug)]
pub enum CaravaneError {
    #[error("标识重复: {0}")]
    DuplicateIdentifier(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("验证错误: {0}")]
    Validation(ValidationErrors),

    #[error("无效状态转换: 从 {from} 到 {to}")]
    IllegalTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    #[error("权限错误: {0}")]
    Permission(String),

    #[error("数据库错误: {0}")]
    Database(String),

    /// 读取与写入之间记录被其他写者修改
    #[error("并发修改冲突: {0}")]
    Conflict(String),

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CaravaneError {
    /// 单字段验证错误的便捷构造
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        CaravaneError::Validation(errors)
    }

    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        CaravaneError::NotFound(format!("{} {} not found", kind, id))
    }
}

impl From<ValidationErrors> for CaravaneError {
    fn from(errors: ValidationErrors) -> Self {
        CaravaneError::Validation(errors)
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for CaravaneError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => CaravaneError::Timeout(err.to_string()),
            other => CaravaneError::Database(other.to_string()),
        }
    }
}

/// 系统统一结果类型
pub type Result<T> = std::result::Result<T, CaravaneError>;
