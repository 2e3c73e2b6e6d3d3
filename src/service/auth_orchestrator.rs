use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use url::Url;

use crate::errors::AppError;
use crate::gateway::AuthGateway;
use crate::location::Location;
use crate::models::{AuthCheck, ExchangeResponse, UserId, UserProfile};
use crate::redirect::{app_root, RedirectCallback};
use crate::service::session_orchestrator::SessionOrchestrator;
use crate::store::IdentityStore;

const DEFAULT_EXCHANGE_ERROR: &str = "Authentication failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// Nothing has been checked yet.
    Unknown,
    Checking,
    Authenticated(UserProfile),
    Unauthenticated { error: Option<String> },
}

#[derive(Debug, Clone)]
pub struct AuthState {
    pub user_id: UserId,
    pub status: AuthStatus,
    /// Bumped by every transition; completions carrying an older value are stale.
    epoch: u64,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self.status, AuthStatus::Authenticated(_))
    }

    pub fn is_checking_auth(&self) -> bool {
        matches!(self.status, AuthStatus::Unknown | AuthStatus::Checking)
    }

    pub fn auth_error(&self) -> Option<&str> {
        match &self.status {
            AuthStatus::Unauthenticated { error } => error.as_deref(),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match &self.status {
            AuthStatus::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn user_email(&self) -> Option<&str> {
        self.profile().and_then(|p| p.email.as_deref())
    }

    pub fn user_name(&self) -> Option<&str> {
        self.profile().and_then(|p| p.name.as_deref())
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Identity and epoch captured when an async transition began.
#[derive(Debug, Clone)]
struct Ticket {
    epoch: u64,
    user_id: UserId,
}

/// Owns [`AuthState`] and drives it from page loads, OAuth callbacks and
/// user intents.
#[derive(Clone)]
pub struct AuthOrchestrator {
    state: Arc<Mutex<AuthState>>,
    identity: IdentityStore,
    gateway: Arc<dyn AuthGateway>,
    location: Arc<dyn Location>,
    session: SessionOrchestrator,
    redirect_uri: String,
}

impl AuthOrchestrator {
    pub fn new(
        identity: IdentityStore,
        gateway: Arc<dyn AuthGateway>,
        location: Arc<dyn Location>,
        session: SessionOrchestrator,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let user_id = identity.get_or_create();
        Self {
            state: Arc::new(Mutex::new(AuthState {
                user_id,
                status: AuthStatus::Unknown,
                epoch: 0,
            })),
            identity,
            gateway,
            location,
            session,
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn state(&self) -> AuthState {
        self.lock().clone()
    }

    pub fn user_id(&self) -> UserId {
        self.lock().user_id.clone()
    }

    /// Runs everything a page load triggers. A callback URL is handled on its
    /// own; its outcome settles the auth state, so no status check is sent.
    /// Any other URL gets the regular auth check.
    pub async fn resolve_page_load(&self) {
        let callback = self.take_callback();
        debug!(user_id = %self.user_id(), callback = callback.is_some(), "Resolving page load");

        match callback {
            Some(callback) => self.settle_callback(callback).await,
            None => {
                self.check_auth().await;
            }
        }
    }

    /// Asks the backend whether the current identity is signed in.
    /// Returns `false` when a newer transition made the answer stale.
    pub async fn check_auth(&self) -> bool {
        let ticket = self.begin_checking();
        self.finish_check(ticket).await
    }

    /// Handles an OAuth callback in the current URL, if there is one.
    /// Returns `false` for ordinary URLs.
    pub async fn handle_redirect(&self) -> bool {
        match self.take_callback() {
            Some(callback) => {
                self.settle_callback(callback).await;
                true
            }
            None => false,
        }
    }

    /// Accepts an identity the backend already validated. No network call.
    pub fn adopt_direct_success(&self, user_id: UserId, profile: UserProfile) {
        {
            let mut state = self.lock();
            state.epoch += 1;
            self.identity.replace(&user_id);
            info!(%user_id, email = ?profile.email, "Signed in");
            state.user_id = user_id;
            state.status = AuthStatus::Authenticated(profile);
        }
        self.session.start_new_conversation();
    }

    /// Starts the OAuth flow and navigates away to the provider.
    /// Local state is left alone; the flow resumes on the callback.
    pub async fn sign_in(&self) -> Result<Url, AppError> {
        let user_id = self.user_id();
        let url = self.gateway.start_oauth(&user_id, &self.redirect_uri).await?;
        info!(%user_id, "Redirecting to authorization page");
        self.location.navigate(&url);
        Ok(url)
    }

    /// Forgets the identity and returns to the signed-out state with a new
    /// conversation.
    pub fn sign_out(&self) {
        {
            let mut state = self.lock();
            self.identity.clear();
            let user_id = self.identity.get_or_create();
            info!(previous = %state.user_id, %user_id, "Signed out");
            state.epoch += 1;
            state.user_id = user_id;
            state.status = AuthStatus::Unauthenticated { error: None };
        }
        self.session.start_new_conversation();
    }

    /// The backend rejected the current session; the user must sign in again.
    pub fn require_reauthentication(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        state.status = AuthStatus::Unauthenticated { error: None };
        info!(user_id = %state.user_id, "Re-authentication required");
    }

    async fn settle_callback(&self, callback: RedirectCallback) {
        match callback {
            RedirectCallback::AuthorizationCode { code, state } => {
                let ticket = self.begin_checking();
                self.finish_exchange(ticket, &code, &state).await;
            }
            RedirectCallback::DirectSuccess { user_id, profile } => {
                self.adopt_direct_success(user_id, profile);
            }
            RedirectCallback::Failed { message } => self.fail_callback(message),
        }
    }

    fn begin_checking(&self) -> Ticket {
        let mut state = self.lock();
        state.epoch += 1;
        state.status = AuthStatus::Checking;
        Ticket { epoch: state.epoch, user_id: state.user_id.clone() }
    }

    /// Reads the callback out of the URL and strips it in the same step, so a
    /// re-run of the page load cannot see it again.
    fn take_callback(&self) -> Option<RedirectCallback> {
        let current = self.location.current();
        let callback = RedirectCallback::parse(&current)?;
        self.location.replace(app_root(&current));
        Some(callback)
    }

    async fn finish_check(&self, ticket: Ticket) -> bool {
        let result = self.gateway.check_auth(&ticket.user_id).await;
        self.apply(&ticket, |state| {
            state.status = match result {
                Ok(AuthCheck { is_authenticated: true, profile }) => {
                    AuthStatus::Authenticated(profile)
                }
                Ok(_) => AuthStatus::Unauthenticated { error: None },
                Err(e) => {
                    warn!("Auth check failed: {e}");
                    AuthStatus::Unauthenticated { error: Some(e.to_string()) }
                }
            };
        })
    }

    async fn finish_exchange(&self, ticket: Ticket, code: &str, state: &str) -> bool {
        let result = self.gateway.exchange_code(code, state, &ticket.user_id).await;
        let mut signed_in = false;

        let applied = self.apply(&ticket, |auth| match result {
            Ok(ExchangeResponse { success: true, user_id, user_info, .. }) => {
                if let Some(user_id) = user_id {
                    self.identity.replace(&user_id);
                    auth.user_id = user_id;
                }
                let profile = user_info
                    .map(|info| UserProfile { email: info.email, name: info.name })
                    .unwrap_or_default();
                info!(user_id = %auth.user_id, email = ?profile.email, "Signed in");
                auth.status = AuthStatus::Authenticated(profile);
                signed_in = true;
            }
            Ok(ExchangeResponse { message, .. }) => {
                let err = AppError::AuthorizationDenied(
                    message.unwrap_or_else(|| DEFAULT_EXCHANGE_ERROR.to_string()),
                );
                warn!("Auth callback failed: {err}");
                auth.status = AuthStatus::Unauthenticated { error: Some(err.to_string()) };
            }
            Err(e) => {
                warn!("Auth callback failed: {e}");
                auth.status = AuthStatus::Unauthenticated { error: Some(e.to_string()) };
            }
        });

        if signed_in {
            self.session.start_new_conversation();
        }
        applied
    }

    fn fail_callback(&self, message: String) {
        warn!("OAuth error: {message}");
        let mut state = self.lock();
        state.epoch += 1;
        state.status = AuthStatus::Unauthenticated { error: Some(message) };
    }

    /// Applies `update` unless a newer transition or identity change made
    /// the ticket stale.
    fn apply(&self, ticket: &Ticket, update: impl FnOnce(&mut AuthState)) -> bool {
        let mut state = self.lock();
        if state.epoch != ticket.epoch || state.user_id != ticket.user_id {
            debug!(
                ticket_epoch = ticket.epoch,
                current_epoch = state.epoch,
                "Discarding stale auth result"
            );
            return false;
        }
        update(&mut *state);
        true
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
