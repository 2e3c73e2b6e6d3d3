pub mod auth_orchestrator;
pub mod session_orchestrator;

pub use auth_orchestrator::{AuthOrchestrator, AuthState, AuthStatus};
pub use session_orchestrator::{ConversationSession, SendOutcome, SessionHandle, SessionOrchestrator};
