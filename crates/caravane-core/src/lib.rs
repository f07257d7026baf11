//! # Caravane Core
//!
//! 分诊系统的核心模块，提供数据模型、错误定义、输入校验、角色能力和通用工具。

pub mod error;
pub mod models;
pub mod query;
pub mod roles;
pub mod utils;
pub mod validation;

pub use error::{CaravaneError, Result};
pub use models::*;
pub use query::{Page, PageRequest, Patch};
pub use roles::{Actor, Capability};
pub use validation::ValidationErrors;
