//! # 大篷车 Web API
//!
//! 基于 axum 的 JSON 接口。操作者身份由上游认证代理通过请求头传入。

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthenticatedActor;
pub use error::ApiError;
pub use server::{create_app, AppState, WebServer};
