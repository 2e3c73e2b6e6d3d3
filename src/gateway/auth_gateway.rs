use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use crate::errors::AppError;
use crate::gateway::{endpoint, read_json, unreachable, AuthGateway};
use crate::models::{
    AuthCheck, ExchangeRequest, ExchangeResponse, OAuthInitRequest, OAuthInitResponse, UserId,
    UserProfile,
};

/// Auth status as the backend sends it. Some deployments call the flag
/// `is_authorized` instead of `is_authenticated`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthStatusResponse {
    #[serde(default)]
    pub is_authenticated: Option<bool>,
    #[serde(default)]
    pub is_authorized: Option<bool>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<AuthStatusResponse> for AuthCheck {
    fn from(raw: AuthStatusResponse) -> Self {
        let is_authenticated = raw.is_authenticated.or(raw.is_authorized).unwrap_or(false);
        AuthCheck {
            is_authenticated,
            profile: UserProfile { email: raw.email, name: raw.name },
        }
    }
}

#[derive(Clone)]
pub struct HttpAuthGateway {
    client: Client,
    base_url: Url,
}

impl HttpAuthGateway {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    async fn fetch_status(&self, user_id: &UserId) -> Result<AuthStatusResponse, AppError> {
        let url = endpoint(&self.base_url, &format!("auth/status/{user_id}"));
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable(&self.base_url, e))?;
        read_json(&url, resp).await
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn check_auth(&self, user_id: &UserId) -> Result<AuthCheck, AppError> {
        debug!(%user_id, "Checking auth status");
        match self.fetch_status(user_id).await {
            Ok(raw) => Ok(raw.into()),
            Err(e) => {
                error!("Auth check error: {e}");
                Ok(AuthCheck::unauthenticated())
            }
        }
    }

    async fn start_oauth(&self, user_id: &UserId, redirect_uri: &str) -> Result<Url, AppError> {
        let url = endpoint(&self.base_url, "auth/google/init");
        let body = OAuthInitRequest {
            user_id: user_id.clone(),
            redirect_uri: redirect_uri.to_string(),
        };
        debug!(%user_id, redirect_uri, "Starting OAuth flow");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| unreachable(&self.base_url, e))?;
        let init: OAuthInitResponse = read_json(&url, resp).await.inspect_err(|e| {
            error!("OAuth init error: {e}");
        })?;

        Url::parse(&init.authorization_url)
            .map_err(|e| AppError::invalid_url(init.authorization_url.clone(), e))
    }

    async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        user_id: &UserId,
    ) -> Result<ExchangeResponse, AppError> {
        let url = endpoint(&self.base_url, "auth/google/callback");
        let body = ExchangeRequest {
            code: code.to_string(),
            state: state.to_string(),
            user_id: user_id.clone(),
        };
        debug!(%user_id, "Exchanging authorization code");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| unreachable(&self.base_url, e))?;
        read_json(&url, resp).await.inspect_err(|e| {
            error!("OAuth callback error: {e}");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(json: &str) -> AuthCheck {
        serde_json::from_str::<AuthStatusResponse>(json).unwrap().into()
    }

    #[test]
    fn accepts_either_flag_name() {
        assert!(normalize(r#"{"is_authenticated": true}"#).is_authenticated);
        assert!(normalize(r#"{"is_authorized": true, "email": "a@b.com"}"#).is_authenticated);
        assert!(!normalize(r#"{}"#).is_authenticated);
    }

    #[test]
    fn primary_flag_wins_when_both_present() {
        assert!(!normalize(r#"{"is_authenticated": false, "is_authorized": true}"#).is_authenticated);
    }

    #[test]
    fn carries_profile_fields() {
        let check = normalize(r#"{"is_authenticated": true, "email": "a@b.com", "name": "A"}"#);
        assert_eq!(check.profile.email.as_deref(), Some("a@b.com"));
        assert_eq!(check.profile.name.as_deref(), Some("A"));
    }
}
