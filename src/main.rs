use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use url::Url;

use chatmate::config::{Config, AVAILABLE_AGENTS};
use chatmate::gateway::{HttpAuthGateway, HttpChatGateway};
use chatmate::location::MemoryLocation;
use chatmate::models::MessageRole;
use chatmate::routes::callback_routes::{router, CallbackState};
use chatmate::service::SendOutcome;
use chatmate::state::{AppState, Screen};
use chatmate::store::{FileIdentityStore, IdentityStore};

const HELP: &str = "Commands: /signin  /signout  /new  /agents  /agent <name>  /retry  /status  /quit";

/// Completion of work spawned off the event loop.
enum Update {
    Loaded,
    Sent(SendOutcome),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Logs go to stderr so they stay out of the conversation
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatmate=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let identity = IdentityStore::new(Arc::new(FileIdentityStore::new(&config.identity_path)));
    let location = Arc::new(MemoryLocation::new(config.app_origin.clone()));
    let app = AppState::new(
        identity,
        Arc::new(HttpAuthGateway::new(client.clone(), config.backend_url.clone())),
        Arc::new(HttpChatGateway::new(client, config.backend_url.clone())),
        location.clone(),
        config.redirect_uri(),
        config.default_agent.clone(),
    );

    // ── Loopback listener for OAuth redirects ─────────────────────────────────
    let (tx, mut callbacks) = mpsc::channel::<Url>(8);
    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind callback listener on {addr}"))?;
    info!("Listening for auth callbacks on http://{addr}/");
    let callback_app = router(CallbackState::new(config.app_origin.clone(), tx));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, callback_app).await {
            error!("Callback listener stopped: {e}");
        }
    });

    info!(backend = %config.backend_url, "Starting ChatMate");
    let mut view = View::default();
    app.load().await;
    view.render(&app.screen());

    // ── Event loop ────────────────────────────────────────────────────────────
    // Network round trips run in their own tasks so input and callbacks keep
    // flowing; their completions come back on `updates`.
    let (updates_tx, mut updates) = mpsc::unbounded_channel::<Update>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(url) = callbacks.recv() => {
                location.load(url);
                let app = app.clone();
                let tx = updates_tx.clone();
                tokio::spawn(async move {
                    app.load().await;
                    let _ = tx.send(Update::Loaded);
                });
            }
            Some(update) = updates.recv() => {
                match update {
                    Update::Sent(SendOutcome::Rejected) => {
                        println!("(still waiting for the previous reply)");
                    }
                    Update::Sent(SendOutcome::RequiresAuth) => println!("Your session expired."),
                    Update::Sent(_) | Update::Loaded => {}
                }
                view.render(&app.screen());
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if !handle_line(&app, &location, &mut view, &updates_tx, line.trim()).await {
                    break;
                }
            }
        }
    }

    info!("Bye");
    Ok(())
}

/// Dispatches one line of input. Returns `false` when the user quits.
async fn handle_line(
    app: &AppState,
    location: &MemoryLocation,
    view: &mut View,
    updates: &mpsc::UnboundedSender<Update>,
    line: &str,
) -> bool {
    let (command, arg) = match line.split_once(' ') {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "/quit" | "/exit" => return false,
        "/help" => println!("{HELP}"),
        "/status" => {
            view.reset();
            view.render(&app.screen());
        }
        "/signin" => match app.sign_in().await {
            Ok(_) => {
                for url in location.take_navigations() {
                    println!("Open this URL in your browser to sign in:\n  {url}");
                }
            }
            Err(e) => println!("Could not start sign-in: {e}"),
        },
        "/retry" => {
            app.recheck_auth().await;
            view.render(&app.screen());
        }
        "/signout" => {
            app.sign_out();
            view.render(&app.screen());
        }
        _ if !matches!(app.screen(), Screen::Chat { .. }) => {
            println!("Please sign in first (/signin).");
        }
        "/new" => {
            app.new_chat();
            view.render(&app.screen());
        }
        "/agents" => {
            for agent in AVAILABLE_AGENTS {
                println!("  {agent}");
            }
        }
        "/agent" if !arg.is_empty() => {
            app.select_agent(arg);
            println!("Now talking to {arg}.");
        }
        _ if command.starts_with('/') => println!("{HELP}"),
        _ => {
            let app = app.clone();
            let tx = updates.clone();
            let text = line.to_string();
            tokio::spawn(async move {
                let outcome = app.send_message(&text).await;
                let _ = tx.send(Update::Sent(outcome));
            });
        }
    }
    true
}

/// Text rendering of [`Screen`], printing only what changed since last time.
#[derive(Default)]
struct View {
    conversation_id: Option<String>,
    shown: usize,
    last_error: Option<String>,
}

impl View {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn render(&mut self, screen: &Screen) {
        match screen {
            Screen::SignIn { checking: true, .. } => println!("Checking authentication..."),
            Screen::SignIn { error: Some(err), .. } => {
                println!("Authentication failed: {err}");
                println!("Type /signin to try again.");
                self.conversation_id = None;
            }
            Screen::SignIn { .. } => {
                println!("Welcome to ChatMate. Type /signin to sign in with Google.");
                self.conversation_id = None;
            }
            Screen::Chat { auth, session } => {
                if self.conversation_id.as_deref() != Some(session.conversation_id.as_str()) {
                    let who = auth.user_name().or(auth.user_email()).unwrap_or("you");
                    println!("── ChatMate · signed in as {who} · {} ──", session.selected_agent);
                    println!("Start a conversation with your {}. {HELP}", session.selected_agent);
                    self.conversation_id = Some(session.conversation_id.clone());
                    self.shown = 0;
                    self.last_error = None;
                }
                for message in session.messages.iter().skip(self.shown) {
                    let label = match message.role {
                        MessageRole::User => "you",
                        MessageRole::Agent => "agent",
                    };
                    println!("[{}] {label}: {}", message.timestamp.format("%H:%M"), message.content);
                }
                self.shown = session.messages.len();
                if session.error != self.last_error {
                    if let Some(err) = &session.error {
                        println!("! {err}");
                    }
                    self.last_error = session.error.clone();
                }
            }
        }
    }
}
