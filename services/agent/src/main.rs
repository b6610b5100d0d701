mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use clap::Parser;
use interview_core::{
    Command,
    agent::{self, InterviewAgent},
    generation::{GenerationClient, QuestionGenerator},
    metadata::{self, SessionContext},
    session_state::{SessionMode, SessionState},
    store::{DocumentStore, FirestoreStore},
    tools::{ToolCall, ToolOutcome, ToolSpec, tool_specs},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::Instrument;
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::config::Config;

#[derive(Parser)]
#[command(about = "Voice interview session service")]
struct Cli {
    /// Override the configured listen address
    #[arg(long)]
    listen: Option<String>,
}

/// Messages the reasoning driver sends over the session socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Opens the session with the raw context blobs, room-level first.
    Start {
        #[serde(default)]
        context: Vec<String>,
    },
    ToolCall {
        id: u64,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
}

/// Messages the service sends back to the driver.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Ready {
        mode: SessionMode,
        instructions: String,
        tools: Vec<ToolSpec>,
    },
    ToolResult {
        id: u64,
        result: ToolOutcome,
    },
    ToolError {
        id: u64,
        kind: &'static str,
        message: String,
    },
    Say {
        text: String,
    },
    Closed,
    Fatal {
        message: String,
    },
}

#[derive(Clone)]
struct AppState {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn QuestionGenerator>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::from_env().context("failed to load service configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let cli = Cli::parse();
    let listen_addr = cli.listen.unwrap_or_else(|| config.listen_addr.clone());

    tracing::info!(
        project = %config.credentials.project_id,
        client = %config.credentials.client_email,
        "document store credentials resolved"
    );

    let auth_token = config.firestore_auth_token.take();
    let store: Arc<dyn DocumentStore> = Arc::new(
        FirestoreStore::new(config.credentials.project_id.as_str(), auth_token)
            .context("failed to build document store client")?,
    );
    let generator: Arc<dyn QuestionGenerator> = Arc::new(
        GenerationClient::new(&config.generation_base_url)
            .context("failed to build generation client")?,
    );
    tracing::info!(base_url = %config.generation_base_url, "generation endpoint configured");

    // The driver boundary is a browser-facing WebSocket, so CORS stays
    // permissive.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/session", get(ws_handler))
        .layer(cors)
        .with_state(AppState { store, generator });

    tracing::info!(addr = %listen_addr, "starting session service");
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let session_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("session", id = %session_id);
    ws.on_upgrade(move |socket| handle_session(socket, state).instrument(span))
}

/// Runs one voice session over its socket, from the driver's start message
/// to termination.
async fn handle_session(mut socket: WebSocket, state: AppState) {
    // The driver must open with a start message carrying the raw context
    // sources.
    let context = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Start { context }) => break context,
                Ok(_) => {
                    let reply = ServerMessage::Fatal {
                        message: "expected a start message".to_owned(),
                    };
                    send(&mut socket, &reply).await;
                    return;
                }
                Err(e) => {
                    let reply = ServerMessage::Fatal {
                        message: format!("unreadable message: {e}"),
                    };
                    send(&mut socket, &reply).await;
                    return;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "socket error before session start");
                return;
            }
        }
    };

    let fields = metadata::resolve(&context);
    let session_context = SessionContext::from_fields(&fields);
    let mode = session_context.mode;

    let session_state = match SessionState::from_context(session_context) {
        Ok(session_state) => session_state,
        Err(e) => {
            // A session that cannot identify its interview must not accept
            // any tool call.
            tracing::error!(error = %e, "session setup failed");
            let reply = ServerMessage::Fatal {
                message: e.to_string(),
            };
            send(&mut socket, &reply).await;
            return;
        }
    };

    let (command_tx, mut command_rx) = mpsc::channel::<Command>(8);
    let mut agent = InterviewAgent::new(
        session_state,
        state.store.clone(),
        state.generator.clone(),
        command_tx,
    );

    let ready = ServerMessage::Ready {
        mode,
        instructions: agent::driver_instructions(mode),
        tools: tool_specs(),
    };
    send(&mut socket, &ready).await;
    tracing::info!(mode = ?mode, "session ready");

    // Tool calls run strictly sequentially: read one, dispatch it to
    // completion, relay any commands it produced, then read the next.
    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "socket error, ending session");
                break;
            }
        };

        let (id, name, arguments) = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::ToolCall {
                id,
                name,
                arguments,
            }) => (id, name, arguments),
            Ok(ClientMessage::Start { .. }) => {
                tracing::warn!("duplicate start message ignored");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "unreadable driver message ignored");
                continue;
            }
        };

        let reply = match agent.dispatch(ToolCall { name, arguments }).await {
            Ok(result) => ServerMessage::ToolResult { id, result },
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "tool call failed");
                ServerMessage::ToolError {
                    id,
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };
        send(&mut socket, &reply).await;

        let mut close_session = false;
        while let Ok(command) = command_rx.try_recv() {
            match command {
                Command::Say(text) => send(&mut socket, &ServerMessage::Say { text }).await,
                Command::Close => close_session = true,
            }
        }
        if close_session {
            send(&mut socket, &ServerMessage::Closed).await;
            break;
        }
    }

    tracing::info!(usage = %agent.usage().summary(), "session finished");
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(payload) => {
            if let Err(e) = socket.send(Message::Text(payload.into())).await {
                tracing::warn!(error = %e, "failed to send message to driver");
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to encode server message"),
    }
}
