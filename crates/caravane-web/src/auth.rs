//! 操作者身份
//!
//! 认证由上游代理完成，本服务只读取代理写入的请求头：
//! `x-actor-id`、`x-actor-role`，专科医生另带 `x-actor-specialty`。

use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use caravane_core::{Actor, Role, Specialty};
use uuid::Uuid;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_SPECIALTY_HEADER: &str = "x-actor-specialty";

/// 已认证的操作者
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::BadRequest(format!("header {} is not valid text", name)))
        })
        .transpose()
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", ACTOR_ID_HEADER)))?;
        let role = header(parts, ACTOR_ROLE_HEADER)?
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", ACTOR_ROLE_HEADER)))?;

        let id: Uuid = id
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("invalid actor id: {}", id)))?;
        let role: Role = role.parse().map_err(ApiError::BadRequest)?;
        let specialty = header(parts, ACTOR_SPECIALTY_HEADER)?
            .map(str::parse::<Specialty>)
            .transpose()
            .map_err(ApiError::BadRequest)?;

        if role == Role::Specialist && specialty.is_none() {
            return Err(ApiError::BadRequest(format!(
                "specialists must send the {} header",
                ACTOR_SPECIALTY_HEADER
            )));
        }

        tracing::debug!("Request by {} ({})", id, role);
        Ok(AuthenticatedActor(Actor { id, role, specialty }))
    }
}
