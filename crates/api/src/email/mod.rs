//! Outbound transactional email
//!
//! Sends through an HTTP mail API (Resend-compatible). When no API key is
//! configured the mailer is disabled and sends become logged no-ops, so
//! local development works without credentials. A configured
//! `TEST_EMAIL` redirects every message to that address instead of the
//! real recipient.

pub mod templates;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

const DEFAULT_API_BASE: &str = "https://api.resend.com";

/// One outbound message. `text` is the plain fallback, `html` optional.
#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    from: String,
    /// Dev/test override: all mail goes here instead of the recipient.
    test_recipient: Option<String>,
}

impl Mailer {
    pub fn new(api_key: &str, from: &str, test_recipient: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
            test_recipient,
        }
    }

    /// Point the mailer at a different API base. Used by tests.
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Send a message and return the provider's message id.
    ///
    /// Disabled mailer: logs and returns a placeholder id rather than
    /// failing the surrounding flow.
    pub async fn send(&self, email: Email) -> ApiResult<String> {
        let to = self
            .test_recipient
            .clone()
            .unwrap_or_else(|| email.to.clone());

        if !self.is_enabled() {
            tracing::warn!(to = %to, subject = %email.subject, "mailer disabled, dropping email");
            return Ok("disabled".to_string());
        }

        let body = serde_json::json!({
            "from": self.from,
            "to": [to],
            "subject": email.subject,
            "text": email.text,
            "html": email.html,
        });

        let response = self
            .client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "mail API request failed");
                ApiError::Dependency
            })?;

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), "mail API rejected send");
            return Err(ApiError::Dependency);
        }

        let parsed: SendResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "mail API returned unparseable body");
            ApiError::Dependency
        })?;

        tracing::info!(message_id = %parsed.id, "email sent");
        Ok(parsed.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email {
            to: "student@example.com".to_string(),
            subject: "Hello".to_string(),
            text: "plain".to_string(),
            html: Some("<p>hi</p>".to_string()),
        }
    }

    #[tokio::test]
    async fn disabled_mailer_is_a_noop() {
        let mailer = Mailer::new("", "Kampus <no-reply@kampus.dev>", None);
        assert!(!mailer.is_enabled());
        let id = mailer.send(email()).await.unwrap();
        assert_eq!(id, "disabled");
    }

    #[tokio::test]
    async fn send_returns_provider_message_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/emails")
            .match_header("authorization", "Bearer key")
            .with_status(200)
            .with_body(r#"{"id":"msg_123"}"#)
            .create_async()
            .await;

        let mailer =
            Mailer::new("key", "Kampus <no-reply@kampus.dev>", None).with_api_base(&server.url());
        let id = mailer.send(email()).await.unwrap();

        assert_eq!(id, "msg_123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn provider_error_surfaces_as_dependency_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/emails")
            .with_status(500)
            .create_async()
            .await;

        let mailer =
            Mailer::new("key", "Kampus <no-reply@kampus.dev>", None).with_api_base(&server.url());
        assert!(mailer.send(email()).await.is_err());
    }

    #[tokio::test]
    async fn test_recipient_overrides_destination() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/emails")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"to":["dev@kampus.dev"]}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"id":"msg_override"}"#)
            .create_async()
            .await;

        let mailer = Mailer::new(
            "key",
            "Kampus <no-reply@kampus.dev>",
            Some("dev@kampus.dev".to_string()),
        )
        .with_api_base(&server.url());
        mailer.send(email()).await.unwrap();
        mock.assert_async().await;
    }
}
