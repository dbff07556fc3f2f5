use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use client::config::{ChannelConfig, ConfigError};
use client::net::event_channel::{EventChannel, FrameError, parse_frame};
use client::net::reconnect::ConnectionState;
use client::net::sse::{HttpEventSource, SseEvent, TransportError};
use client::state::Stores;
use client::state::session::Session;
use frames::Envelope;
use serde_json::Value;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

/// How often `tail` drains new notifications from the UI store.
const DRAIN_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; pass --session-token or set INBOX_SESSION_TOKEN")]
    MissingSessionToken,
    #[error("missing organization; pass --organization-id or set INBOX_ORGANIZATION_ID")]
    MissingOrganization,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame rejected: {0}")]
    Frame(#[from] FrameError),
    #[error("event channel gave up after {0} failed attempts")]
    Exhausted(u32),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "inbox-cli", about = "Inbox realtime event stream CLI")]
struct Cli {
    /// Overrides `INBOX_BASE_URL` from the channel config.
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long, env = "INBOX_SESSION_TOKEN")]
    session_token: Option<String>,

    #[arg(long, env = "INBOX_ORGANIZATION_ID")]
    organization_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream events from the backend and print notifications.
    Tail,
    /// Print the base64 frame body for an event.
    Encode(EncodeArgs),
    /// Validate a frame body and print the decoded event.
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[arg(long)]
    event: String,

    #[arg(long, help = "Payload as JSON")]
    data: String,

    #[arg(long)]
    user_id: Option<String>,

    #[arg(long)]
    organization_id: Option<String>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    #[arg(long)]
    event: String,

    /// Base64 frame body.
    body: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Tail => {
            let session = session_from(cli.session_token, cli.organization_id)?;
            let config = config_with(cli.base_url);
            LocalSet::new().run_until(run_tail(config, session)).await
        }
        Command::Encode(args) => {
            println!("{}", encode_frame(&args)?);
            Ok(())
        }
        Command::Decode(args) => {
            let decoded = decode_frame(&args.event, &args.body)?;
            print_json(&decoded)
        }
    }
}

fn session_from(token: Option<String>, organization_id: Option<String>) -> Result<Session, CliError> {
    let session = Session {
        token,
        organization_id,
        user_id: None,
    };
    if session.token().is_none() {
        return Err(CliError::MissingSessionToken);
    }
    if session.organization_id().is_none() {
        return Err(CliError::MissingOrganization);
    }
    Ok(session)
}

fn config_with(base_url: Option<String>) -> ChannelConfig {
    let mut config = ChannelConfig::from_env();
    if let Some(base_url) = base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    config
}

async fn run_tail(config: ChannelConfig, session: Session) -> Result<(), CliError> {
    // Surface a bad base URL as an error instead of an inert channel.
    config.stream_url("")?;

    let source = HttpEventSource::new(config.connect_timeout)?;
    let stores = Stores::default();
    let channel = EventChannel::new(config, source, stores.clone());
    let mut state_rx = channel.subscribe_state();
    let mut drain = tokio::time::interval(DRAIN_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    channel.activate(&session);

    let result = loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                break signal.map_err(CliError::from);
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *state_rx.borrow_and_update();
                let attempts = channel.reconnect_attempts();
                tracing::info!(?state, attempts, "connection state changed");
                if state == ConnectionState::Disconnected && channel.is_exhausted() {
                    break Err(CliError::Exhausted(attempts));
                }
            }
            _ = drain.tick() => drain_ui(&stores),
        }
    };

    drain_ui(&stores);
    tracing::info!(stats = ?channel.stats(), "tail finished");
    channel.teardown();
    result
}

/// Print and clear pending notifications and the reload flag.
fn drain_ui(stores: &Stores) {
    let (notifications, reload_required) = stores.ui.update(|ui| {
        let reload = ui.reload_required;
        ui.acknowledge_reload();
        (std::mem::take(&mut ui.notifications), reload)
    });
    for notification in notifications {
        println!("notification {}: {}", notification.id, notification.message);
    }
    if reload_required {
        println!("reload required");
    }
}

fn encode_frame(args: &EncodeArgs) -> Result<String, CliError> {
    let data = serde_json::from_str::<Value>(&args.data)?;
    let mut envelope = Envelope::new(args.event.clone(), data);
    envelope.user_id.clone_from(&args.user_id);
    envelope.organization_id.clone_from(&args.organization_id);
    Ok(frames::encode_body(&envelope))
}

fn decode_frame(event: &str, body: &str) -> Result<Value, CliError> {
    let frame = SseEvent {
        event: Some(event.to_owned()),
        data: body.to_owned(),
        id: None,
    };
    let inbound = parse_frame(&frame)?;
    Ok(serde_json::to_value(&inbound)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
