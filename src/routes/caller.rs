//! Caller identity

use std::convert::Infallible;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::state::AppState;

/// Header carrying the caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Who is making the request.
///
/// `user_id` is `None` for anonymous callers. `is_service` is set when the
/// request carries the configured service key as a bearer token.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub user_id: Option<String>,
    pub is_service: bool,
}

impl Caller {
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        let is_service = match (&state.config().service_key, bearer) {
            (Some(key), Some(token)) => key == token,
            _ => false,
        };

        Ok(Self { user_id, is_service })
    }
}
