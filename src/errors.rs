use thiserror::Error;

/// Every recoverable failure the client can hit.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Transport errors ─────────────────────────────────────────────────────
    #[error("Cannot connect to backend server at {base_url}. Please check if the server is running.")]
    BackendUnreachable {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error! status: {status}, message: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    // ── Protocol errors ──────────────────────────────────────────────────────
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{0}")]
    AuthorizationDenied(String),

    #[error("Missing callback parameter '{name}'")]
    MissingCallbackParameter { name: String },

    // ── Storage errors ───────────────────────────────────────────────────────
    #[error("Identity storage failed at {path}: {message}")]
    IdentityStorage { path: String, message: String },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Invalid configuration for {key}: {message}")]
    Config { key: String, message: String },
}

impl AppError {
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        AppError::InvalidUrl { url: url.into(), source }
    }

    pub fn storage(path: impl Into<String>, message: impl ToString) -> Self {
        AppError::IdentityStorage { path: path.into(), message: message.to_string() }
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::BackendUnreachable { .. }
                | AppError::BackendStatus { .. }
                | AppError::InvalidResponse { .. }
        )
    }

    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            AppError::InvalidUrl { .. }
                | AppError::AuthorizationDenied(_)
                | AppError::MissingCallbackParameter { .. }
        )
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, AppError::IdentityStorage { .. })
    }
}
