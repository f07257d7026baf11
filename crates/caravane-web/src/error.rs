//! 错误响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use caravane_core::CaravaneError;
use serde_json::json;

/// HTTP 层错误
#[derive(Debug)]
pub enum ApiError {
    /// 业务错误
    Domain(CaravaneError),
    /// 缺少操作者身份
    Unauthorized(String),
    /// 请求格式错误
    BadRequest(String),
}

impl From<CaravaneError> for ApiError {
    fn from(err: CaravaneError) -> Self {
        ApiError::Domain(err)
    }
}

impl ApiError {
    /// 状态码与错误类别
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Domain(err) => match err {
                CaravaneError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                CaravaneError::DuplicateIdentifier(_) => (StatusCode::CONFLICT, "duplicate_identifier"),
                CaravaneError::IllegalTransition { .. } => (StatusCode::CONFLICT, "illegal_transition"),
                CaravaneError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
                CaravaneError::Permission(_) => (StatusCode::FORBIDDEN, "permission_denied"),
                CaravaneError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                CaravaneError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                CaravaneError::Database(_)
                | CaravaneError::Config(_)
                | CaravaneError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();

        let mut body = match &self {
            ApiError::Unauthorized(msg) | ApiError::BadRequest(msg) => json!({ "message": msg }),
            ApiError::Domain(err) if status.is_server_error() => {
                // 内部细节只写日志
                tracing::error!("Request failed: {}", err);
                json!({ "message": "internal server error" })
            }
            ApiError::Domain(err) => json!({ "message": err.to_string() }),
        };
        body["error"] = json!(kind);
        body["status"] = json!(status.as_u16());
        if let ApiError::Domain(CaravaneError::Validation(errors)) = &self {
            body["fields"] = json!(errors.fields());
        }

        (status, Json(body)).into_response()
    }
}
