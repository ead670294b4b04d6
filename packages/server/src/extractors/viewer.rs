use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;
use crate::workload::Viewer;

pub const SESSION_COOKIE: &str = "session";

fn session_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(&parts.headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
    })
}

/// Identity on the session surface, from the `session` cookie or a bearer
/// token. Missing or invalid tokens yield [`Viewer::Guest`]; only a store
/// failure rejects the request.
impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(parts) else {
            return Ok(Viewer::Guest);
        };

        let claims = match jwt::verify(&token, &state.config.auth.jwt_secret) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Ignoring invalid session token");
                return Ok(Viewer::Guest);
            }
        };

        let user = state.store.user_by_id(claims.uid).await?;
        Ok(Viewer::from_user(user))
    }
}
