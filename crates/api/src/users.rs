//! User profile handlers
//!
//! Profile reads go through the read-through cache; every write
//! invalidates both profile shapes for the subject before touching the
//! database. Account deletion and the two-step phone update also live
//! here because they operate on the caller's own row.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::cookies::{
    append_set_cookie, clear_session_cookie, cookie_value, short_lived_cookie,
};
use crate::auth::handlers::TokenQuery;
use crate::auth::ledger::{Purpose, ACTION_TTL_SECONDS, PHONE_OTP_TTL_SECONDS};
use crate::auth::middleware::AuthUser;
use crate::auth::password::verify_password;
use crate::cache;
use crate::db::{self, ProfileUpdate};
use crate::email::templates;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Cached profile lifetime: two hours.
const PROFILE_CACHE_TTL_SECONDS: u64 = 2 * 60 * 60;

const PHONE_COOKIE: &str = "newPhone";

#[derive(Debug, Default, Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    #[serde(default, rename = "newPhone")]
    pub new_phone: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    #[serde(default)]
    pub otp: String,
}

/// `GET /users/me`
pub async fn get_me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Response> {
    let profile = state
        .cache
        .cached(
            &cache::self_profile_key(user.subject),
            PROFILE_CACHE_TTL_SECONDS,
            || async {
                db::fetch_self_profile(&state.pool, user.subject)
                    .await?
                    .ok_or_else(|| ApiError::not_found("User not found"))
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(profile)).into_response())
}

/// `GET /users/{id}` — public shape, no email.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let profile = state
        .cache
        .cached(
            &cache::public_profile_key(id),
            PROFILE_CACHE_TTL_SECONDS,
            || async {
                db::fetch_public_profile(&state.pool, id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("User not found"))
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(profile)).into_response())
}

/// `PUT /users/me`
///
/// Only whitelisted fields are writable; email, role and the credential
/// columns never pass through here.
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Response> {
    if update.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    // Invalidate before the write so a crash between the two leaves a
    // cache miss, not a stale entry.
    state
        .cache
        .invalidate(&cache::profile_pattern(user.subject))
        .await?;

    let Some(profile) = db::update_user_profile(&state.pool, user.subject, &update).await? else {
        return Err(ApiError::not_found("User not found"));
    };
    tracing::info!(user_id = %user.subject, "profile updated");

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Profile updated", "user": profile })),
    )
        .into_response())
}

/// `DELETE /users/me`
///
/// Password accounts confirm with their password. OAuth-only accounts
/// have none, so the first call mails a confirmation link and the second
/// call carries its token.
pub async fn delete_me(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TokenQuery>,
    body: Option<Json<DeleteAccountRequest>>,
) -> ApiResult<Response> {
    let Some(row) = db::find_user_by_id(&state.pool, user.subject).await? else {
        return Err(ApiError::not_found("User not found"));
    };

    let oauth_only = row.oauth_id.is_some() && row.password_hash.is_none();

    if oauth_only && query.token.is_none() {
        let token = state
            .signer
            .issue_action(user.subject, ACTION_TTL_SECONDS as i64)?;
        state
            .ledger
            .put(
                Purpose::OauthDelete,
                &token,
                &user.subject.to_string(),
                ACTION_TTL_SECONDS,
            )
            .await?;
        let link = format!(
            "{}/users/me?token={}",
            state.config.public_base_url, token
        );
        state
            .mailer
            .send(templates::oauth_delete_email(&row.email, &row.name, &link))
            .await?;
        tracing::info!(user_id = %user.subject, "account deletion confirmation sent");

        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "A confirmation link has been sent to your email."
            })),
        )
            .into_response());
    }

    if let Some(token) = query.token {
        let Some(raw_subject) = state.ledger.consume(Purpose::OauthDelete, &token).await? else {
            return Err(ApiError::Auth);
        };
        let subject =
            Uuid::parse_str(&raw_subject).map_err(|_| ApiError::Auth)?;
        state.signer.verify_action(&token, subject)?;
        // The link must belong to the caller, not just to any account.
        if subject != user.subject {
            return Err(ApiError::Auth);
        }
    } else {
        let req = body.map(|Json(r)| r).unwrap_or_default();
        if req.password.is_empty() {
            return Err(ApiError::validation("Password is required"));
        }
        let Some(stored_hash) = &row.password_hash else {
            return Err(ApiError::validation("Invalid account state"));
        };
        if !verify_password(&req.password, stored_hash) {
            return Err(ApiError::Auth);
        }
    }

    state
        .cache
        .invalidate(&cache::profile_pattern(user.subject))
        .await?;
    if !db::delete_user(&state.pool, user.subject).await? {
        return Err(ApiError::not_found("User not found"));
    }
    tracing::info!(user_id = %user.subject, "account deleted");

    let mut headers = HeaderMap::new();
    append_set_cookie(&mut headers, &clear_session_cookie(state.config.cookie_secure));

    Ok((
        StatusCode::OK,
        headers,
        Json(json!({ "message": "Account deleted successfully" })),
    )
        .into_response())
}

fn hash_otp(otp: &str) -> String {
    hex::encode(Sha256::digest(otp.as_bytes()))
}

/// Ledger token for a phone-update OTP: binds subject and target number
/// so a code minted for one number cannot confirm another.
fn phone_otp_token(subject: Uuid, phone: &str) -> String {
    format!("{subject}:{phone}")
}

/// `POST /users/me/getUpdatePhone`
///
/// Step one of the phone update: mint a six-digit code, store its hash
/// keyed to subject + number, and park the pending number in a
/// short-lived cookie so step two does not trust a client-supplied one.
pub async fn request_phone_otp(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PhoneRequest>,
) -> ApiResult<Response> {
    let phone = req.new_phone.trim();
    if phone.len() < 8 || !phone.chars().all(|c| c.is_ascii_digit() || c == '+') {
        return Err(ApiError::validation("Please provide a valid phone number"));
    }

    let otp = format!("{:06}", rand::random_range(0..1_000_000u32));
    state
        .ledger
        .put(
            Purpose::PhoneUpdateOtp,
            &phone_otp_token(user.subject, phone),
            &hash_otp(&otp),
            PHONE_OTP_TTL_SECONDS,
        )
        .await?;

    // TODO: deliver the code through the SMS gateway once provisioned.
    tracing::info!(user_id = %user.subject, "phone update OTP issued");

    let mut headers = HeaderMap::new();
    append_set_cookie(
        &mut headers,
        &short_lived_cookie(
            PHONE_COOKIE,
            phone,
            PHONE_OTP_TTL_SECONDS,
            state.config.cookie_secure,
        ),
    );

    Ok((
        StatusCode::OK,
        headers,
        Json(json!({ "message": "OTP sent successfully" })),
    )
        .into_response())
}

/// `PUT /users/me/updatePhone`
///
/// Step two: the pending number comes from the cookie, the code from the
/// body. Comparison is constant-time over the hashes.
pub async fn update_phone(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<OtpRequest>,
) -> ApiResult<Response> {
    let Some(phone) = cookie_value(&headers, PHONE_COOKIE) else {
        return Err(ApiError::validation("Phone update session expired"));
    };
    if req.otp.is_empty() {
        return Err(ApiError::validation("OTP is required"));
    }

    let token = phone_otp_token(user.subject, &phone);
    let Some(stored_hash) = state.ledger.peek(Purpose::PhoneUpdateOtp, &token).await? else {
        return Err(ApiError::validation("OTP expired or invalid"));
    };

    let candidate = hash_otp(&req.otp);
    if candidate.as_bytes().ct_eq(stored_hash.as_bytes()).unwrap_u8() != 1 {
        return Err(ApiError::validation("Invalid OTP"));
    }

    state
        .cache
        .invalidate(&cache::profile_pattern(user.subject))
        .await?;
    let Some(profile) = db::set_phone(&state.pool, user.subject, &phone).await? else {
        return Err(ApiError::not_found("User not found"));
    };
    state.ledger.consume(Purpose::PhoneUpdateOtp, &token).await?;
    tracing::info!(user_id = %user.subject, "phone number updated");

    let mut out = HeaderMap::new();
    append_set_cookie(
        &mut out,
        &short_lived_cookie(PHONE_COOKIE, "", 0, state.config.cookie_secure),
    );

    Ok((
        StatusCode::OK,
        out,
        Json(json!({ "message": "Phone updated", "user": profile })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_hash_is_stable_hex() {
        let h = hash_otp("123456");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_otp("123456"));
        assert_ne!(h, hash_otp("123457"));
    }

    #[test]
    fn otp_token_binds_subject_and_number() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        assert_ne!(phone_otp_token(a, "+491701"), phone_otp_token(b, "+491701"));
        assert_ne!(phone_otp_token(a, "+491701"), phone_otp_token(a, "+491702"));
    }
}
