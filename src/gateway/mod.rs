pub mod auth_gateway;
pub mod chat_gateway;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use crate::errors::AppError;
use crate::models::{AuthCheck, ChatRequest, ChatResponse, ExchangeResponse, UserId};

pub use auth_gateway::HttpAuthGateway;
pub use chat_gateway::HttpChatGateway;

/// Backend authentication operations.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Reports whether `user_id` is signed in. Implementations fold transport
    /// failures into "not authenticated".
    async fn check_auth(&self, user_id: &UserId) -> Result<AuthCheck, AppError>;

    /// Starts an OAuth flow and returns the provider's authorization URL.
    async fn start_oauth(&self, user_id: &UserId, redirect_uri: &str) -> Result<Url, AppError>;

    /// Exchanges an authorization code for a signed-in session.
    async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        user_id: &UserId,
    ) -> Result<ExchangeResponse, AppError>;
}

/// Backend chat operation.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, AppError>;
}

/// Joins `path` onto the backend base URL, keeping any path prefix it has.
pub(crate) fn endpoint(base_url: &Url, path: &str) -> String {
    format!("{}/{}", base_url.as_str().trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Maps a failed `send()` to a transport error.
pub(crate) fn unreachable(base_url: &Url, source: reqwest::Error) -> AppError {
    AppError::BackendUnreachable {
        base_url: base_url.as_str().trim_end_matches('/').to_string(),
        source,
    }
}

/// Checks the status and decodes a JSON body, turning non-2xx into
/// [`AppError::BackendStatus`] with the response text.
pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, AppError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::BackendStatus { status: status.as_u16(), body });
    }

    resp.json::<T>().await.map_err(|e| AppError::InvalidResponse {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}
