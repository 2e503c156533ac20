//! Line-oriented front end for a link session.
//!
//! Reads host commands from stdin (`connect`, `mode`, `bang`, `disconnect`)
//! and writes replies and asynchronous events to stdout as JSON lines.
//!
//! Usage: `mavsession [config.yaml]`. Logging goes to stderr and is filtered
//! with `RUST_LOG` (default `info`).

use anyhow::Context;
use futures::StreamExt;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mavsession::host::{self, HostCommand};
use mavsession::{LinkConfig, LinkSession};

#[derive(Serialize)]
struct ErrorLine {
    error: String,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("Failed to serialize output: {}", e),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => LinkConfig::load(&path)
            .with_context(|| format!("loading configuration from {}", path.to_string_lossy()))?,
        None => LinkConfig::default(),
    };
    info!(endpoint = %config.endpoint, "Default endpoint");

    let mut session = LinkSession::new(config);

    let mut events = session.events();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            print_json(&event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match line.parse::<HostCommand>() {
            Ok(command) => host::execute(&mut session, command).await,
            Err(e) => Err(e),
        };
        match reply {
            Ok(reply) => print_json(&reply),
            Err(e) => {
                warn!("Command '{}' rejected: {}", line.trim(), e);
                print_json(&ErrorLine { error: e.to_string() });
            }
        }
    }

    info!("stdin closed, shutting down");
    session.disconnect().await;
    // Dropping the last event sender ends the printer after it flushes
    drop(session);
    printer.await.context("event printer task")?;
    Ok(())
}
