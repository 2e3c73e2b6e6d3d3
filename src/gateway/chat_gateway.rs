use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};
use url::Url;

use crate::errors::AppError;
use crate::gateway::{endpoint, read_json, unreachable, ChatGateway};
use crate::models::{ChatRequest, ChatResponse};

#[derive(Clone)]
pub struct HttpChatGateway {
    client: Client,
    base_url: Url,
}

impl HttpChatGateway {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, AppError> {
        let url = endpoint(&self.base_url, "chat");
        debug!(
            user_id = %request.user_id,
            session_id = request.session_id.as_deref().unwrap_or("<new>"),
            "Sending chat message to {url}"
        );

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat request failed: {e}");
                unreachable(&self.base_url, e)
            })?;

        let response: ChatResponse = read_json(&url, resp).await.inspect_err(|e| {
            error!("Chat response error: {e}");
        })?;
        debug!(
            session_id = %response.session_id,
            requires_auth = response.requires_auth,
            "Chat response received"
        );
        Ok(response)
    }
}
