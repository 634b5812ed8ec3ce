use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    Json,
};
use server_api::session::verify_token;
use shared::{
    domain::AttendeeId,
    error::{ApiError, ErrorCode},
};
use tracing::debug;

use crate::app_state::AppState;

/// The attendee behind the request's bearer token.
pub(crate) struct CurrentUser(pub(crate) AttendeeId);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ApiError::new(
                        ErrorCode::Unauthorized,
                        "missing bearer token",
                    )),
                )
            })?;

        let attendee_id = verify_token(&state.session, token).map_err(|e| {
            debug!(error = %e.message, "rejected session token");
            (StatusCode::UNAUTHORIZED, Json(e))
        })?;

        Ok(CurrentUser(attendee_id))
    }
}
