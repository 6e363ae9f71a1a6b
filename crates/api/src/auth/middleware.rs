//! Session middleware
//!
//! Gates protected routes: no cookie → 401, bad token → 401, otherwise
//! the verified subject id is inserted into request extensions as a typed
//! `AuthUser` and the request continues. The extension is written exactly
//! once here; downstream handlers only ever read it, so no handler can
//! swap in a different subject mid-request.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::auth::cookies::{cookie_value, SESSION_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated subject for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub subject: Uuid,
}

/// Extractor so handlers take `user: AuthUser` directly.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(ApiError::Auth)
    }
}

/// Middleware requiring a valid session cookie.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = cookie_value(request.headers(), SESSION_COOKIE) else {
        tracing::debug!(path = %request.uri().path(), "no session cookie");
        return ApiError::Auth.into_response();
    };

    match state.signer.verify_session(&token) {
        Ok(subject) => {
            request.extensions_mut().insert(AuthUser { subject });
            next.run(request).await
        }
        Err(_) => {
            tracing::debug!(path = %request.uri().path(), "session token rejected");
            ApiError::Auth.into_response()
        }
    }
}
