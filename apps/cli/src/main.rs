//! `taskboard-watch`: loads one board, follows it over the real-time channel
//! and logs every change to the local store.
//!
//! Usage:
//!   TASKBOARD_TOKEN=... taskboard-watch <board-id>
//!   RUST_LOG=debug taskboard-watch <board-id> --api-url http://localhost:5000/api

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use taskboard_api_client::{BoardClient, ClientConfig};
use taskboard_core::coordinator::MutationCoordinator;
use taskboard_core::models::{Board, Card};
use taskboard_core::reconcile::RefetchScope;
use taskboard_core::store::EntityStore;
use taskboard_realtime::{BoardSession, ChannelConfig, EventStreamTransport, RealtimeChannel};

#[derive(Parser, Debug)]
#[command(name = "taskboard-watch")]
#[command(about = "Follow a task board and log every change")]
struct Args {
    /// Board to follow
    board_id: String,

    /// Bearer token for the REST API and the event stream
    #[arg(long, env = "TASKBOARD_TOKEN", hide_env_values = true)]
    token: String,

    /// REST root (defaults to TASKBOARD_API_URL or http://localhost:5000/api)
    #[arg(long)]
    api_url: Option<String>,

    /// Event stream root (defaults to TASKBOARD_REALTIME_URL or http://localhost:5000)
    #[arg(long)]
    realtime_url: Option<String>,
}

fn log_board(store: &EntityStore, board_id: &str) {
    let Some(board) = store.get::<Board>(board_id) else {
        warn!(board = %board_id, "board is not in the store");
        return;
    };
    info!(board = %board.id, name = %board.name, members = board.members.len(), "board loaded");
    for card in store.cards_for_board(board_id) {
        log_card(store, &card);
    }
}

fn log_card(store: &EntityStore, card: &Card) {
    let tasks = store.tasks_for_card(&card.id);
    info!(card = %card.id, name = %card.name, position = card.position, tasks = tasks.len(), "card");
    for task in tasks {
        info!(
            task = %task.id,
            title = %task.title,
            position = task.position,
            completed = task.completed,
            "  task"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut client_config = ClientConfig::from_env().with_token(args.token.clone());
    if let Some(url) = args.api_url {
        client_config.base_url = url;
    }
    let mut channel_config = ChannelConfig::from_env();
    if let Some(url) = args.realtime_url {
        channel_config.url = url;
    }

    let api = Arc::new(BoardClient::new(client_config).context("building REST client")?);
    let store = Arc::new(EntityStore::new());
    let coordinator = Arc::new(MutationCoordinator::new(store.clone(), api));

    coordinator
        .refetch(&RefetchScope::board(&args.board_id))
        .await
        .with_context(|| format!("loading board {}", args.board_id))?;
    log_board(&store, &args.board_id);

    let _changes = store.listen(|change| {
        for entity in &change.upserted {
            info!(%entity, "updated");
        }
        for entity in &change.removed {
            info!(%entity, "removed");
        }
        if change.error_changed {
            warn!("mutation error recorded");
        }
    });

    let transport = Arc::new(EventStreamTransport::new(&channel_config.url));
    let channel = Arc::new(RealtimeChannel::new(channel_config, transport));
    let _status = channel.subscribe_status(|status| info!(?status, "channel"));
    let session = BoardSession::attach(channel.clone(), coordinator, args.board_id.clone());
    channel.connect(args.token);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutting down");

    session.detach();
    channel.disconnect().await;
    log_board(&store, &args.board_id);
    Ok(())
}
