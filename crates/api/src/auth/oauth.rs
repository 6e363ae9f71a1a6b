//! Google OAuth client
//!
//! The server-side half of the authorization-code flow: build the consent
//! URL, exchange the callback code for an access token and fetch the
//! profile. Account lookup/creation lives in the auth handlers; this
//! module only talks to Google.

use serde::Deserialize;
use url::Url;

use crate::error::{ApiError, ApiResult};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// The subset of the Google profile the service uses.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    /// Google's stable account id; stored as `oauth_id`.
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone)]
pub struct GoogleOauth {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    token_endpoint: String,
    userinfo_endpoint: String,
}

impl GoogleOauth {
    pub fn new(client_id: &str, client_secret: &str, redirect_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_url: redirect_url.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            userinfo_endpoint: USERINFO_ENDPOINT.to_string(),
        }
    }

    /// Redirect Google's endpoints elsewhere. Used by tests.
    pub fn with_endpoints(mut self, token: &str, userinfo: &str) -> Self {
        self.token_endpoint = token.to_string();
        self.userinfo_endpoint = userinfo.to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Consent-screen URL the browser is redirected to.
    pub fn authorize_url(&self) -> ApiResult<String> {
        let mut url = Url::parse(AUTH_ENDPOINT).map_err(|e| {
            tracing::error!(error = %e, "bad OAuth authorize endpoint");
            ApiError::Dependency
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile");
        Ok(url.into())
    }

    /// Exchange the callback `code` and fetch the profile. Every failure
    /// collapses to `ApiError::Auth`; the callback endpoint answers 401
    /// without detailing which step broke.
    pub async fn fetch_profile(&self, code: &str) -> ApiResult<GoogleProfile> {
        let token: TokenResponse = self
            .client
            .post(&self.token_endpoint)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "OAuth code exchange failed");
                ApiError::Auth
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::warn!(error = %e, "OAuth code exchange rejected");
                ApiError::Auth
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "OAuth token response unparseable");
                ApiError::Auth
            })?;

        let profile: GoogleProfile = self
            .client
            .get(&self.userinfo_endpoint)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "OAuth userinfo fetch failed");
                ApiError::Auth
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::warn!(error = %e, "OAuth userinfo rejected");
                ApiError::Auth
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "OAuth userinfo unparseable");
                ApiError::Auth
            })?;

        if profile.email.is_empty() {
            tracing::warn!("Google profile carried no email");
            return Err(ApiError::Auth);
        }

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_client_and_redirect() {
        let oauth = GoogleOauth::new("cid", "secret", "http://localhost:3001/cb");
        let url = oauth.authorize_url().unwrap();
        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3001%2Fcb"));
    }

    #[tokio::test]
    async fn fetch_profile_happy_path() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"at-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/userinfo")
            .match_header("authorization", "Bearer at-1")
            .with_status(200)
            .with_body(r#"{"id":"g-123","email":"a@x.com","name":"A"}"#)
            .create_async()
            .await;

        let oauth = GoogleOauth::new("cid", "secret", "http://localhost/cb").with_endpoints(
            &format!("{}/token", server.url()),
            &format!("{}/userinfo", server.url()),
        );

        let profile = oauth.fetch_profile("code-1").await.unwrap();
        assert_eq!(profile.id, "g-123");
        assert_eq!(profile.email, "a@x.com");
    }

    #[tokio::test]
    async fn rejected_code_is_an_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .create_async()
            .await;

        let oauth = GoogleOauth::new("cid", "secret", "http://localhost/cb").with_endpoints(
            &format!("{}/token", server.url()),
            &format!("{}/userinfo", server.url()),
        );

        assert!(matches!(
            oauth.fetch_profile("bad").await,
            Err(ApiError::Auth)
        ));
    }
}
