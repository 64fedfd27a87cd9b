//! Replay raw IRC server lines through the rejoin subsystem and print the
//! JOIN commands it issues.
//!
//! ```text
//! printf ':srv 437 me #foo :Nick/channel is temporarily unavailable\n' \
//!     | rejoin-demo --interval 2
//! ```
//!
//! A line reading `/disconnect` drops the session as if the socket closed.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use freeq_rejoin::irc::Message;
use freeq_rejoin::{ChannelRejoin, Connection, EventBus, ProtocolKind, RejoinConfig, Sessions};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rejoin-demo", about = "Replay IRC lines through channel rejoin")]
struct Args {
    /// Config file (default: ~/.config/freeq/rejoin.toml).
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Seconds between rejoin passes (overrides the config file).
    #[arg(long, env = "FREEQ_REJOIN_INTERVAL")]
    interval: Option<u64>,

    /// Our nick; the session is treated as registered under it.
    #[arg(long, default_value = "freeq_demo")]
    nick: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Use JSON logs when FREEQ_LOG_JSON=1, human-readable otherwise
    let json_logs = std::env::var("FREEQ_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("freeq_rejoin=debug".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => RejoinConfig::load_from(path)?,
        None => RejoinConfig::load()?,
    };
    if let Some(secs) = args.interval {
        config.interval_secs = secs;
    }

    let bus = Arc::new(EventBus::new());
    let sessions = Arc::new(Sessions::new());
    let handle = ChannelRejoin::start(&config, &bus, Arc::clone(&sessions))?;

    let (session, mut cmd_rx) = sessions.open(ProtocolKind::Irc);
    session.set_registered(&args.nick);
    let conn: Arc<dyn Connection> = session.clone();

    let writer = tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            println!("{cmd}");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/disconnect" {
            sessions.remove(conn.id());
            bus.disconnect(Arc::clone(&conn));
            continue;
        }
        if let Some(msg) = Message::parse(line) {
            session.observe(&msg);
            bus.dispatch(&conn, &msg);
        }
    }

    tracing::info!(
        interval_secs = config.interval_secs,
        "input finished, waiting for one rejoin pass"
    );
    tokio::time::sleep(config.interval() + std::time::Duration::from_millis(100)).await;

    handle.stop();
    // The writer finishes once the last handle to the session is gone.
    let id = conn.id();
    drop(conn);
    drop(session);
    sessions.remove(id);
    if let Err(e) = writer.await {
        tracing::warn!(error = %e, "command writer task failed");
    }
    Ok(())
}
