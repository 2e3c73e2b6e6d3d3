use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info};

use crate::gateway::ChatGateway;
use crate::models::{ChatRequest, Message, MessageRole, UserId};

/// Backend session correlation for one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionHandle {
    /// No successful exchange yet; requests go out without a session id.
    New,
    /// Handle issued by the backend, echoed on every later request.
    Established(String),
}

impl SessionHandle {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionHandle::New => None,
            SessionHandle::Established(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub handle: SessionHandle,
    /// Local correlation id, fresh for every conversation.
    pub conversation_id: String,
    pub selected_agent: String,
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl ConversationSession {
    fn new(selected_agent: String) -> Self {
        Self {
            handle: SessionHandle::New,
            conversation_id: uuid::Uuid::new_v4().to_string(),
            selected_agent,
            messages: Vec::new(),
            is_loading: false,
            error: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.handle.session_id()
    }
}

/// Result of a `send_message` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty text or another exchange still in flight; nothing changed.
    Rejected,
    /// The agent's reply was appended.
    Replied,
    /// The backend wants the user to sign in again.
    RequiresAuth,
    /// The exchange failed; the error is on the session.
    Failed,
    /// A new conversation started while the exchange was in flight.
    Superseded,
}

/// Owns the active conversation.
#[derive(Clone)]
pub struct SessionOrchestrator {
    state: Arc<Mutex<ConversationSession>>,
    gateway: Arc<dyn ChatGateway>,
}

impl SessionOrchestrator {
    pub fn new(gateway: Arc<dyn ChatGateway>, default_agent: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConversationSession::new(default_agent.into()))),
            gateway,
        }
    }

    pub fn state(&self) -> ConversationSession {
        self.lock().clone()
    }

    /// Drops the current conversation and begins an empty one.
    /// The selected agent carries over.
    pub fn start_new_conversation(&self) {
        let mut state = self.lock();
        let agent = std::mem::take(&mut state.selected_agent);
        *state = ConversationSession::new(agent);
        info!(conversation_id = %state.conversation_id, "Started new conversation");
    }

    pub fn select_agent(&self, agent: impl Into<String>) {
        let agent = agent.into();
        debug!(%agent, "Selected agent");
        self.lock().selected_agent = agent;
    }

    /// Sends `text` as `user_id` and waits for the agent's reply.
    ///
    /// The user's message is visible on the session before the request goes
    /// out and stays there whatever the outcome.
    pub async fn send_message(&self, text: &str, user_id: &UserId) -> SendOutcome {
        let content = text.trim();

        let (request, conversation_id) = {
            let mut state = self.lock();
            if state.is_loading || content.is_empty() {
                return SendOutcome::Rejected;
            }

            state.messages.push(Message::new(MessageRole::User, content.to_string()));
            state.is_loading = true;
            state.error = None;

            let request = ChatRequest {
                message: content.to_string(),
                user_id: user_id.clone(),
                session_id: state.session_id().map(str::to_string),
                agent_type: Some(state.selected_agent.clone()),
            };
            (request, state.conversation_id.clone())
        };

        let result = self.gateway.send_message(request).await;

        let mut state = self.lock();
        let current = state.conversation_id == conversation_id;
        if current {
            state.is_loading = false;
        }

        match result {
            // A dead session outlives the conversation that noticed it.
            Ok(response) if response.requires_auth => {
                info!(%conversation_id, "Backend requires re-authentication");
                SendOutcome::RequiresAuth
            }
            _ if !current => {
                debug!(%conversation_id, "Discarding reply for a replaced conversation");
                SendOutcome::Superseded
            }
            Ok(response) => {
                if !response.session_id.is_empty() {
                    state.handle = SessionHandle::Established(response.session_id);
                }
                state.messages.push(Message::new(MessageRole::Agent, response.response));
                SendOutcome::Replied
            }
            Err(e) => {
                error!("Failed to send message: {e}");
                state.error = Some(e.to_string());
                SendOutcome::Failed
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConversationSession> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
