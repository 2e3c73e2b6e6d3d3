use std::path::PathBuf;

use url::Url;

use crate::errors::AppError;

pub const ENV_BACKEND_URL: &str = "CHATMATE_BACKEND_URL";
pub const ENV_APP_ORIGIN: &str = "CHATMATE_APP_ORIGIN";
pub const ENV_IDENTITY_PATH: &str = "CHATMATE_IDENTITY_PATH";
pub const ENV_DEFAULT_AGENT: &str = "CHATMATE_DEFAULT_AGENT";
pub const ENV_PORT: &str = "PORT";

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_AGENT: &str = "Event Planning Agent";
pub const AVAILABLE_AGENTS: &[&str] = &[DEFAULT_AGENT];

/// Path the OAuth provider redirects to with `code` and `state`.
pub const CODE_CALLBACK_PATH: &str = "/auth/google/callback";
/// Path the backend redirects to after it validated the login itself.
pub const SUCCESS_CALLBACK_PATH: &str = "/auth/success";
/// Older deployments registered this path as the OAuth redirect.
pub const LEGACY_CODE_CALLBACK_PATH: &str = "/auth/callback";

const IDENTITY_FILE: &str = "identity.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: Url,
    pub app_origin: Url,
    pub port: u16,
    pub identity_path: PathBuf,
    pub default_agent: String,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let backend_url = parse_base_url(
            ENV_BACKEND_URL,
            &get(ENV_BACKEND_URL).unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
        )?;

        let port = match get(ENV_PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|e| AppError::Config {
                key: ENV_PORT.to_string(),
                message: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let app_origin = parse_base_url(
            ENV_APP_ORIGIN,
            &get(ENV_APP_ORIGIN).unwrap_or_else(|| format!("http://127.0.0.1:{port}")),
        )?;

        let identity_path = match get(ENV_IDENTITY_PATH) {
            Some(path) => PathBuf::from(path),
            None => default_identity_path(),
        };

        Ok(Self {
            backend_url,
            app_origin,
            port,
            identity_path,
            default_agent: get(ENV_DEFAULT_AGENT).unwrap_or_else(|| DEFAULT_AGENT.to_string()),
        })
    }

    /// Where the OAuth provider sends the browser back to.
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}{CODE_CALLBACK_PATH}",
            self.app_origin.as_str().trim_end_matches('/')
        )
    }
}

fn parse_base_url(key: &str, raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim_end_matches('/')).map_err(|e| AppError::Config {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AppError::Config {
            key: key.to_string(),
            message: format!("'{raw}' must use http:// or https:// and include a host"),
        });
    }
    Ok(url)
}

fn default_identity_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chatmate")
        .join(IDENTITY_FILE)
}
