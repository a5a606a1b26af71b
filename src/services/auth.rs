//! Auth provider client (password grant + token introspection).
//!
//! Tokens are only ever accepted after the provider verifies them; an
//! unverifiable token is an authentication failure, never a fallback to
//! unsigned decoding.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// An authenticated user as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// A successful password-grant session.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub user: AuthenticatedUser,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthenticatedUser,
}

/// Client for the external auth provider.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> Result<String, AppError> {
        if self.base_url.is_empty() {
            return Err(AppError::Configuration(
                "Auth provider is not configured. Set AUTH_BASE_URL and AUTH_API_KEY.".to_string(),
            ));
        }
        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint
        ))
    }

    /// Exchange credentials for a session token. Any rejection from the
    /// provider surfaces as an authentication failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, AppError> {
        let url = self.url("token?grant_type=password")?;

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Auth provider request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            AppError::Upstream(format!("Auth provider response parse error: {}", e))
        })?;

        Ok(LoginSession {
            token: body.access_token,
            user: body.user,
        })
    }

    /// Verify a bearer token with the provider. Strict: any failure —
    /// network, non-2xx, malformed body — rejects the token.
    pub async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let url = self.url("user")?;

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|_| AppError::Unauthorized("Token verification failed".to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Unauthorized("Invalid token".to_string()));
        }

        response
            .json()
            .await
            .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_login_success() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("apikey", "service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt-token",
                "user": {"id": user_id, "email": "user@example.com"}
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri(), "service-key");
        let session = client.login("user@example.com", "hunter2").await.unwrap();
        assert_eq!(session.token, "jwt-token");
        assert_eq!(session.user.id, user_id);
    }

    #[tokio::test]
    async fn test_login_rejection_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri(), "service-key");
        let result = client.login("user@example.com", "wrong").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_login_unconfigured_is_configuration_error() {
        let client = AuthClient::new("", "");
        let result = client.login("user@example.com", "pw").await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_verify_token_rejects_on_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri(), "service-key");
        let result = client.verify_token("stale-token").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_verify_token_success() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": user_id, "email": "user@example.com"
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri(), "service-key");
        let user = client.verify_token("valid-token").await.unwrap();
        assert_eq!(user.id, user_id);
    }
}
