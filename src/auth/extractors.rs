use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{auth::jwt::JwtKeys, db::AppState, error::ApiError, users::repo::User};

/// Resolved identity of the caller, pulled from the bearer token on every
/// request: header -> token -> claims -> user row -> active check.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthorized("Not authenticated"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(ApiError::Unauthorized("Not authenticated"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Unauthorized("Could not validate credentials")
        })?;

        // A deleted account invalidates its outstanding tokens here.
        let user = User::find_by_username(&state.db, &claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized("Could not validate credentials"))?;

        if !user.active {
            return Err(ApiError::Forbidden("Inactive user"));
        }

        Ok(CurrentUser(user))
    }
}
