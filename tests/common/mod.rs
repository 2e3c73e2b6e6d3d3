#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use url::Url;

use chatmate::errors::AppError;
use chatmate::gateway::{AuthGateway, ChatGateway};
use chatmate::location::MemoryLocation;
use chatmate::models::{AuthCheck, ChatRequest, ChatResponse, ExchangeResponse, UserId, UserProfile};
use chatmate::state::AppState;
use chatmate::store::{IdentityStore, MemoryIdentityStore};

pub const REDIRECT_URI: &str = "http://127.0.0.1:3000/auth/google/callback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCall {
    Check(UserId),
    Start { user_id: UserId, redirect_uri: String },
    Exchange { code: String, state: String, user_id: UserId },
}

/// Scripted auth backend. Unscripted calls answer "not authenticated",
/// a successful exchange, and a fixed authorization URL.
#[derive(Default)]
pub struct FakeAuthGateway {
    pub calls: Mutex<Vec<AuthCall>>,
    checks: Mutex<VecDeque<Result<AuthCheck, AppError>>>,
    exchanges: Mutex<VecDeque<Result<ExchangeResponse, AppError>>>,
    starts: Mutex<VecDeque<Result<Url, AppError>>>,
    check_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeAuthGateway {
    pub fn push_check(&self, result: Result<AuthCheck, AppError>) {
        self.checks.lock().unwrap().push_back(result);
    }

    pub fn push_exchange(&self, result: Result<ExchangeResponse, AppError>) {
        self.exchanges.lock().unwrap().push_back(result);
    }

    pub fn push_start(&self, result: Result<Url, AppError>) {
        self.starts.lock().unwrap().push_back(result);
    }

    /// The next check-auth call waits until the returned sender fires.
    pub fn hold_next_check(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.check_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<AuthCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn exchange_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, AuthCall::Exchange { .. }))
            .count()
    }
}

#[async_trait]
impl AuthGateway for FakeAuthGateway {
    async fn check_auth(&self, user_id: &UserId) -> Result<AuthCheck, AppError> {
        self.calls.lock().unwrap().push(AuthCall::Check(user_id.clone()));
        let gate = self.check_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.checks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AuthCheck::unauthenticated()))
    }

    async fn start_oauth(&self, user_id: &UserId, redirect_uri: &str) -> Result<Url, AppError> {
        self.calls.lock().unwrap().push(AuthCall::Start {
            user_id: user_id.clone(),
            redirect_uri: redirect_uri.to_string(),
        });
        self.starts.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(Url::parse("https://accounts.example.com/o/oauth2/auth?client_id=chatmate").unwrap())
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        user_id: &UserId,
    ) -> Result<ExchangeResponse, AppError> {
        self.calls.lock().unwrap().push(AuthCall::Exchange {
            code: code.to_string(),
            state: state.to_string(),
            user_id: user_id.clone(),
        });
        self.exchanges
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(exchange(serde_json::json!({"success": true}))))
    }
}

/// Scripted chat backend. Unscripted calls reply "ok" on session "s1".
#[derive(Default)]
pub struct FakeChatGateway {
    pub requests: Mutex<Vec<ChatRequest>>,
    replies: Mutex<VecDeque<Result<ChatResponse, AppError>>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeChatGateway {
    pub fn push_reply(&self, result: Result<ChatResponse, AppError>) {
        self.replies.lock().unwrap().push_back(result);
    }

    /// The next send waits until the returned sender fires.
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for FakeChatGateway {
    async fn send_message(&self, request: ChatRequest) -> Result<ChatResponse, AppError> {
        self.requests.lock().unwrap().push(request);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(reply("ok", "s1")))
    }
}

pub fn reply(response: &str, session_id: &str) -> ChatResponse {
    ChatResponse {
        response: response.to_string(),
        session_id: session_id.to_string(),
        ..Default::default()
    }
}

pub fn exchange(json: serde_json::Value) -> ExchangeResponse {
    serde_json::from_value(json).unwrap()
}

pub fn authenticated(email: &str) -> AuthCheck {
    AuthCheck {
        is_authenticated: true,
        profile: UserProfile { email: Some(email.to_string()), name: None },
    }
}

pub fn server_error() -> AppError {
    AppError::BackendStatus { status: 503, body: "backend unavailable".to_string() }
}

pub struct Harness {
    pub app: AppState,
    pub auth: Arc<FakeAuthGateway>,
    pub chat: Arc<FakeChatGateway>,
    pub location: Arc<MemoryLocation>,
    pub stored: MemoryIdentityStore,
}

impl Harness {
    /// App whose browser currently shows `url`, with `local_id` persisted.
    pub fn at(url: &str, local_id: &str) -> Self {
        let auth = Arc::new(FakeAuthGateway::default());
        let chat = Arc::new(FakeChatGateway::default());
        let location = Arc::new(MemoryLocation::new(Url::parse(url).unwrap()));
        let stored = MemoryIdentityStore::with_id(UserId::new(local_id));
        let app = AppState::new(
            IdentityStore::new(Arc::new(stored.clone())),
            auth.clone(),
            chat.clone(),
            location.clone(),
            REDIRECT_URI,
            "Event Planning Agent",
        );
        Self { app, auth, chat, location, stored }
    }

    /// Signed-in app at the root URL.
    pub async fn signed_in() -> Self {
        let harness = Self::at("http://127.0.0.1:3000/", "u1");
        harness.auth.push_check(Ok(authenticated("a@b.com")));
        harness.app.load().await;
        assert!(harness.app.auth.state().is_authenticated());
        harness
    }
}
