use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use url::Url;

use crate::config::{CODE_CALLBACK_PATH, LEGACY_CODE_CALLBACK_PATH, SUCCESS_CALLBACK_PATH};

const DONE_PAGE: &str = "<!doctype html>
<html>
  <head><title>ChatMate</title></head>
  <body style=\"font-family: sans-serif; text-align: center; padding-top: 4rem\">
    <h2>Completing authentication...</h2>
    <p>You can close this tab and return to ChatMate.</p>
  </body>
</html>";

/// Forwards every callback the browser lands on to the client loop.
#[derive(Clone)]
pub struct CallbackState {
    origin: Url,
    tx: mpsc::Sender<Url>,
}

impl CallbackState {
    pub fn new(origin: Url, tx: mpsc::Sender<Url>) -> Self {
        Self { origin, tx }
    }
}

pub fn router(state: CallbackState) -> Router {
    Router::new()
        .route(CODE_CALLBACK_PATH, get(callback_handler))
        .route(SUCCESS_CALLBACK_PATH, get(callback_handler))
        .route(LEGACY_CODE_CALLBACK_PATH, get(callback_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET on any callback path: hand the full URL over, answer with a
/// static page.
async fn callback_handler(
    State(state): State<CallbackState>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = match state.origin.join(path_and_query) {
        Ok(url) => url,
        Err(e) => {
            error!("Failed to rebuild callback URL from {uri}: {e}");
            return (StatusCode::BAD_REQUEST, "Invalid callback URL").into_response();
        }
    };

    info!(path = url.path(), "Received auth callback");
    if let Err(e) = state.tx.send(url).await {
        error!("Client loop is gone, dropping callback: {e}");
        return (StatusCode::SERVICE_UNAVAILABLE, "ChatMate is not running").into_response();
    }
    Html(DONE_PAGE).into_response()
}
