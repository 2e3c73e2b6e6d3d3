use std::sync::Arc;

use url::Url;

use crate::errors::AppError;
use crate::gateway::{AuthGateway, ChatGateway};
use crate::location::Location;
use crate::service::{
    AuthOrchestrator, AuthState, ConversationSession, SendOutcome, SessionOrchestrator,
};
use crate::store::IdentityStore;

/// What the presentation layer should show right now.
#[derive(Debug, Clone)]
pub enum Screen {
    SignIn {
        checking: bool,
        error: Option<String>,
    },
    Chat {
        auth: AuthState,
        session: ConversationSession,
    },
}

/// Shared application state: both orchestrators plus the intents the
/// presentation layer dispatches.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthOrchestrator,
    pub session: SessionOrchestrator,
}

impl AppState {
    pub fn new(
        identity: IdentityStore,
        auth_gateway: Arc<dyn AuthGateway>,
        chat_gateway: Arc<dyn ChatGateway>,
        location: Arc<dyn Location>,
        redirect_uri: impl Into<String>,
        default_agent: impl Into<String>,
    ) -> Self {
        let session = SessionOrchestrator::new(chat_gateway, default_agent);
        let auth = AuthOrchestrator::new(identity, auth_gateway, location, session.clone(), redirect_uri);
        Self { auth, session }
    }

    /// Page load: auth check plus callback handling.
    pub async fn load(&self) {
        self.auth.resolve_page_load().await;
    }

    pub fn screen(&self) -> Screen {
        let auth = self.auth.state();
        if auth.is_authenticated() {
            Screen::Chat { auth, session: self.session.state() }
        } else {
            Screen::SignIn {
                checking: auth.is_checking_auth(),
                error: auth.auth_error().map(str::to_string),
            }
        }
    }

    pub async fn sign_in(&self) -> Result<Url, AppError> {
        self.auth.sign_in().await
    }

    /// Retry after a failed check, without a page load.
    pub async fn recheck_auth(&self) -> bool {
        self.auth.check_auth().await
    }

    pub fn sign_out(&self) {
        self.auth.sign_out();
    }

    pub fn new_chat(&self) {
        self.session.start_new_conversation();
    }

    pub fn select_agent(&self, agent: impl Into<String>) {
        self.session.select_agent(agent);
    }

    /// Sends a message as the current identity; a re-authentication demand
    /// from the backend is routed to the auth orchestrator.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let user_id = self.auth.user_id();
        let outcome = self.session.send_message(text, &user_id).await;
        if outcome == SendOutcome::RequiresAuth {
            self.auth.require_reauthentication();
        }
        outcome
    }
}
