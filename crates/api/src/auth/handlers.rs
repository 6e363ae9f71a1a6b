//! Authentication flow handlers
//!
//! Registration + email verification, login/logout, password reset and
//! Google OAuth sign-in. Each flow composes the credential signer, the
//! single-use token ledger and the mailer; the session middleware is the
//! only other consumer of the signer.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::cookies::{append_set_cookie, clear_session_cookie, session_cookie};
use crate::auth::ledger::{Purpose, ACTION_TTL_SECONDS};
use crate::auth::password::{hash_password, verify_password};
use crate::db::{self, User};
use crate::email::templates;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub code: Option<String>,
}

/// Mint a verification action token, record it in the ledger and return
/// the link to embed in email. Shared by registration and the
/// login-before-verification path, which re-issues a fresh link.
pub(crate) async fn issue_verification_link(state: &AppState, user: &User) -> ApiResult<String> {
    let token = state
        .signer
        .issue_action(user.id, ACTION_TTL_SECONDS as i64)?;
    state
        .ledger
        .put(
            Purpose::EmailVerify,
            &token,
            &user.id.to_string(),
            ACTION_TTL_SECONDS,
        )
        .await?;
    Ok(format!(
        "{}/auth/verifyEmail?token={}",
        state.config.public_base_url, token
    ))
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Response> {
    if req.name.is_empty() || req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation(
            "Please provide name, email and password",
        ));
    }

    if db::find_user_by_email(&state.pool, &req.email).await?.is_some() {
        return Err(ApiError::conflict("User already exists"));
    }

    let password_hash = hash_password(&req.password)?;
    let user = db::create_user(&state.pool, &req.name, &req.email, &password_hash).await?;
    tracing::info!(user_id = %user.id, "user registered, pending verification");

    let link = issue_verification_link(&state, &user).await?;
    state
        .mailer
        .send(templates::verification_email(&user.email, &user.name, &link))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "A link has been sent to your email to verify your account."
        })),
    )
        .into_response())
}

/// `GET /auth/verifyEmail?token=`
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Response> {
    let token = query
        .token
        .ok_or_else(|| ApiError::validation("No token provided"))?;

    // Ledger first: the per-subject signing key cannot be reconstructed
    // until the ledger names a candidate subject.
    let Some(raw_subject) = state.ledger.peek(Purpose::EmailVerify, &token).await? else {
        return Err(ApiError::validation("Invalid or expired token"));
    };
    let subject = Uuid::parse_str(&raw_subject)
        .map_err(|_| ApiError::validation("Invalid or expired token"))?;
    state
        .signer
        .verify_action(&token, subject)
        .map_err(|_| ApiError::validation("Invalid or expired token"))?;

    db::mark_email_verified(&state.pool, subject).await?;
    // Delete only after the flag is flipped; a failed write leaves the
    // token usable for a retry.
    state.ledger.consume(Purpose::EmailVerify, &token).await?;
    tracing::info!(user_id = %subject, "email verified");

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "User email verified successfully" })),
    )
        .into_response())
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Please provide email and password"));
    }

    let Some(user) = db::find_user_by_email(&state.pool, &req.email).await? else {
        return Err(ApiError::Auth);
    };

    let Some(stored_hash) = &user.password_hash else {
        // OAuth-only account; a password can never match.
        return Err(ApiError::validation("Please login with Google"));
    };

    if !verify_password(&req.password, stored_hash) {
        return Err(ApiError::Auth);
    }

    if !user.email_verified {
        let link = issue_verification_link(&state, &user).await?;
        state
            .mailer
            .send(templates::verification_email(&user.email, &user.name, &link))
            .await?;
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({
                "message": "Email not verified",
                "link": link,
            })),
        )
            .into_response());
    }

    let token = state.signer.issue_session(user.id)?;
    let mut headers = HeaderMap::new();
    append_set_cookie(&mut headers, &session_cookie(&token, state.config.cookie_secure));
    tracing::info!(user_id = %user.id, "login successful");

    Ok((
        StatusCode::OK,
        headers,
        Json(json!({ "message": "Login successful", "userId": user.id })),
    )
        .into_response())
}

/// `POST /auth/logout`
pub async fn logout(State(state): State<AppState>) -> Response {
    let mut headers = HeaderMap::new();
    append_set_cookie(&mut headers, &clear_session_cookie(state.config.cookie_secure));
    (
        StatusCode::OK,
        headers,
        Json(json!({ "message": "Logout successful" })),
    )
        .into_response()
}

/// `GET /auth/google` — kick off the consent flow.
pub async fn google_redirect(State(state): State<AppState>) -> ApiResult<Redirect> {
    if !state.oauth.is_configured() {
        tracing::error!("Google OAuth requested but not configured");
        return Err(ApiError::Dependency);
    }
    let url = state.oauth.authorize_url()?;
    Ok(Redirect::temporary(&url))
}

/// `GET /auth/google/callback?code=`
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CodeQuery>,
) -> ApiResult<Response> {
    let code = query.code.ok_or(ApiError::Auth)?;
    let profile = state.oauth.fetch_profile(&code).await?;

    let user = match db::find_user_by_oauth_id(&state.pool, &profile.id).await? {
        Some(user) => user,
        None => {
            // First sign-in: Google already verified the address, so the
            // account starts verified with no local verification step.
            let user =
                db::create_oauth_user(&state.pool, &profile.name, &profile.email, &profile.id)
                    .await?;
            tracing::info!(user_id = %user.id, "account created from Google profile");

            let dashboard = format!("{}/dashboard", state.config.public_base_url);
            let welcome = templates::welcome_email(&user.email, &user.name, &dashboard);
            if let Err(e) = state.mailer.send(welcome).await {
                // Sign-in must not hinge on the welcome mail.
                tracing::warn!(user_id = %user.id, error = %e, "welcome email failed");
            }
            user
        }
    };

    let token = state.signer.issue_session(user.id)?;
    let mut headers = HeaderMap::new();
    append_set_cookie(&mut headers, &session_cookie(&token, state.config.cookie_secure));
    tracing::info!(user_id = %user.id, "Google login successful");

    Ok((
        StatusCode::OK,
        headers,
        Json(json!({ "message": "Google login successful", "userId": user.id })),
    )
        .into_response())
}

const RESET_SENT_MESSAGE: &str = "If an account exists, a password reset link has been sent";

/// `POST /auth/forgotpassword`
///
/// Answers the same 200 whether or not the account exists, so the
/// endpoint cannot be used to enumerate addresses.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Response> {
    if req.email.is_empty() {
        return Err(ApiError::validation("Please provide an email"));
    }

    if let Some(user) = db::find_user_by_email(&state.pool, &req.email).await? {
        let token = state
            .signer
            .issue_action(user.id, ACTION_TTL_SECONDS as i64)?;
        state
            .ledger
            .put(
                Purpose::PasswordReset,
                &token,
                &user.id.to_string(),
                ACTION_TTL_SECONDS,
            )
            .await?;
        let link = format!(
            "{}/auth/resetpassword?token={}",
            state.config.public_base_url, token
        );
        state
            .mailer
            .send(templates::reset_email(&user.email, &user.name, &link))
            .await?;
        tracing::info!(user_id = %user.id, "password reset link issued");
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "message": RESET_SENT_MESSAGE })),
    )
        .into_response())
}

/// `GET /auth/resetpassword?token=` — link validity check only.
///
/// Peeks without consuming so the client can probe before rendering the
/// reset form; only the submit consumes.
pub async fn validate_reset_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Response> {
    let token = query
        .token
        .ok_or_else(|| ApiError::validation("No token provided"))?;

    if state
        .ledger
        .peek(Purpose::PasswordReset, &token)
        .await?
        .is_none()
    {
        return Err(ApiError::validation("Invalid or expired token"));
    }

    Ok((StatusCode::OK, Json(json!({ "message": "Token valid" }))).into_response())
}

/// `POST /auth/resetpassword?token=`
pub async fn reset_password(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Response> {
    if req.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    let token = query
        .token
        .ok_or_else(|| ApiError::validation("No token provided"))?;

    let Some(raw_subject) = state.ledger.consume(Purpose::PasswordReset, &token).await? else {
        return Err(ApiError::validation("Invalid or expired token"));
    };
    let subject = Uuid::parse_str(&raw_subject)
        .map_err(|_| ApiError::validation("Invalid or expired token"))?;
    state
        .signer
        .verify_action(&token, subject)
        .map_err(|_| ApiError::validation("Invalid or expired token"))?;

    let password_hash = hash_password(&req.password)?;
    db::set_password_hash(&state.pool, subject, &password_hash).await?;
    tracing::info!(user_id = %subject, "password reset completed");

    // Any session minted before the reset keeps verifying (stateless
    // tokens); clearing the cookie at least ends this browser's session.
    let mut headers = HeaderMap::new();
    append_set_cookie(&mut headers, &clear_session_cookie(state.config.cookie_secure));

    Ok((
        StatusCode::OK,
        headers,
        Json(json!({ "message": "Password reset successful" })),
    )
        .into_response())
}
