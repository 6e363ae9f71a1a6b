//! Cross-component edge cases for the token and cookie layer.

use axum::http::{HeaderMap, HeaderValue};
use uuid::Uuid;

use crate::auth::cookies::{clear_session_cookie, cookie_value, session_cookie, SESSION_COOKIE};
use crate::auth::jwt::TokenSigner;
use crate::error::ApiError;

const SECRET: &str = "test-secret-test-secret-test-secret!";

fn signer() -> TokenSigner {
    TokenSigner::new(SECRET)
}

#[test]
fn tampered_session_token_is_rejected() {
    let subject = Uuid::new_v4();
    let token = signer().issue_session(subject).unwrap();

    // Flip one character of the signature segment.
    let mut chars: Vec<char> = token.chars().collect();
    let last = chars.len() - 1;
    chars[last] = if chars[last] == 'a' { 'b' } else { 'a' };
    let tampered: String = chars.into_iter().collect();

    assert!(matches!(
        signer().verify_session(&tampered),
        Err(ApiError::Auth)
    ));
}

#[test]
fn tokens_survive_signer_reconstruction() {
    // Stateless tokens must verify across process restarts as long as
    // the base secret is unchanged.
    let subject = Uuid::new_v4();
    let session = signer().issue_session(subject).unwrap();
    let action = signer().issue_action(subject, 60).unwrap();

    let fresh = TokenSigner::new(SECRET);
    assert_eq!(fresh.verify_session(&session).unwrap(), subject);
    assert_eq!(fresh.verify_action(&action, subject).unwrap(), subject);
}

#[test]
fn action_token_is_worthless_without_its_subject() {
    // Holding a leaked action token is not enough; the verifier must be
    // pointed at the exact subject the token was minted for.
    let owner = Uuid::new_v4();
    let token = signer().issue_action(owner, 60).unwrap();

    for _ in 0..16 {
        let guess = Uuid::new_v4();
        assert!(signer().verify_action(&token, guess).is_err());
    }
    assert!(signer().verify_action(&token, owner).is_ok());
}

#[test]
fn issued_cookie_round_trips_through_the_parser() {
    let token = signer().issue_session(Uuid::new_v4()).unwrap();
    let cookie = session_cookie(&token, false);
    let pair = cookie.split(';').next().unwrap();

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::COOKIE,
        HeaderValue::from_str(pair).unwrap(),
    );
    assert_eq!(cookie_value(&headers, SESSION_COOKIE).as_deref(), Some(token.as_str()));
}

#[test]
fn cleared_cookie_reads_as_absent() {
    let cookie = clear_session_cookie(false);
    let pair = cookie.split(';').next().unwrap();

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::COOKIE,
        HeaderValue::from_str(pair).unwrap(),
    );
    assert_eq!(cookie_value(&headers, SESSION_COOKIE), None);
}

#[test]
fn session_token_in_action_slot_is_rejected() {
    // A valid 7-day session credential must never pass where a short
    // subject-bound action credential is expected.
    let subject = Uuid::new_v4();
    let session = signer().issue_session(subject).unwrap();
    assert!(signer().verify_action(&session, subject).is_err());
}
