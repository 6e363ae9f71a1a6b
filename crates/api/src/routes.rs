//! HTTP route table
//!
//! All routes mount under `/api/v1`. Layer ordering matters on the
//! throttled authenticated routes: `require_auth` is added last so it
//! runs first and the limiter can key on the subject id instead of the
//! client address.

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;

use crate::auth::handlers as auth_handlers;
use crate::auth::require_auth;
use crate::ratelimit::{rate_limit, RateLimitPolicy};
use crate::state::AppState;
use crate::users;

/// Password reset requests: 2 per 30 seconds per identity.
const FORGOT_PASSWORD_POLICY: RateLimitPolicy = RateLimitPolicy::new("rate:forgot", 30_000, 2);

/// Phone-update OTPs: 3 per day per subject.
const PHONE_OTP_POLICY: RateLimitPolicy = RateLimitPolicy::new("rate:phone", 86_400_000, 3);

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub fn build_router(state: AppState) -> Router {
    let auth_public = Router::new()
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/verifyEmail", get(auth_handlers::verify_email))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/google", get(auth_handlers::google_redirect))
        .route("/auth/google/callback", get(auth_handlers::google_callback))
        .route(
            "/auth/resetpassword",
            get(auth_handlers::validate_reset_token).post(auth_handlers::reset_password),
        );

    let forgot_password = Router::new()
        .route("/auth/forgotpassword", post(auth_handlers::forgot_password))
        .route_layer(from_fn_with_state(
            (state.clone(), FORGOT_PASSWORD_POLICY),
            rate_limit,
        ));

    let protected = Router::new()
        .route("/auth/logout", post(auth_handlers::logout))
        .route(
            "/users/me",
            get(users::get_me)
                .put(users::update_me)
                .delete(users::delete_me),
        )
        .route("/users/me/updatePhone", put(users::update_phone))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let phone_otp = Router::new()
        .route("/users/me/getUpdatePhone", post(users::request_phone_otp))
        .route_layer(from_fn_with_state(
            (state.clone(), PHONE_OTP_POLICY),
            rate_limit,
        ))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let public_users = Router::new().route("/users/{id}", get(users::get_user));

    let api = Router::new()
        .merge(auth_public)
        .merge(forgot_password)
        .merge(protected)
        .merge(phone_otp)
        .merge(public_users)
        .route("/health", get(health));

    Router::new().nest("/api/v1", api).with_state(state)
}
