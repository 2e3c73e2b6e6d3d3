use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque token correlating this client to a backend-known user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Agent => "agent",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the conversation log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }
}

/// Normalized result of the backend's auth-status check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthCheck {
    pub is_authenticated: bool,
    pub profile: UserProfile,
}

impl AuthCheck {
    pub fn unauthenticated() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OAuthInitRequest {
    pub user_id: UserId,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthInitResponse {
    pub authorization_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRequest {
    pub code: String,
    pub state: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Server-issued identity; takes precedence over the locally held one.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
}

/// Request body for the backend's `/chat` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub session_state: Option<String>,
    #[serde(default)]
    pub available_actions: Vec<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}
