//! Headless client for the Tessera simulation server.
//!
//! Connects, joins one game and follows it: every frame it drains the
//! session's event queue, mirrors store changes into pooled markers,
//! advances move animations, and every few seconds logs a game summary.
//!
//! # Configuration
//!
//! `TESSERA_CONFIG` may point at a YAML file; otherwise everything comes
//! from `TESSERA_*` environment variables. `TESSERA_GAME_ID` names the
//! game to follow.

mod view;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tessera_client::{ClientConfig, Session, Transport};
use tessera_types::GameId;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::view::{Marker, View};

/// Time between rendered frames.
const FRAME: Duration = Duration::from_millis(50);

/// Frames between summary log lines.
const SUMMARY_EVERY: u32 = 100;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is missing or the game cannot be
/// joined.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("tessera-watch starting");

    let config = load_config()?;
    info!(
        server_addr = config.server_addr,
        request_timeout_ms = config.request_timeout_ms,
        supervisor_interval_ms = config.supervisor_interval_ms,
        grid_pitch = config.grid_pitch,
        "configuration loaded"
    );

    let game = std::env::var("TESSERA_GAME_ID")
        .map(GameId::new)
        .context("TESSERA_GAME_ID must name the game to follow")?;

    let (transport, events) = Transport::tcp(config);
    let mut session: Session<Marker> = Session::new(transport.clone(), events);

    transport.start().await.context("connecting to server")?;
    session
        .join(game.clone())
        .await
        .with_context(|| format!("joining game {game}"))?;

    let mut view = View::new();
    let mut frames = tokio::time::interval(FRAME);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    info!(%game, "following game");
    let mut frame: u32 = 0;
    loop {
        tokio::select! {
            _ = frames.tick() => {
                session.pump();
                let changes = session.drain_changes();
                view.apply(session.context_mut(), changes);
                session.context_mut().scheduler_mut().advance(FRAME);

                frame = frame.wrapping_add(1);
                if frame.checked_rem(SUMMARY_EVERY) == Some(0) {
                    view::log_summary(&session, &view);
                }
                if let Some(outcome) = session.context().outcome() {
                    info!(victory = ?outcome.victory, reason = ?outcome.reason, "game finished");
                    break;
                }
            }
            signal = &mut interrupt => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for interrupt");
                }
                info!("interrupted");
                break;
            }
        }
    }

    view::log_summary(&session, &view);
    view.clear(session.context_mut());
    session.reset();
    transport.shutdown().await;
    Ok(())
}

/// Load configuration from `TESSERA_CONFIG` when set, else from the
/// environment alone.
fn load_config() -> anyhow::Result<ClientConfig> {
    match std::env::var("TESSERA_CONFIG") {
        Ok(path) => ClientConfig::from_file(Path::new(&path))
            .with_context(|| format!("loading configuration from {path}")),
        Err(_) => ClientConfig::from_env().context("loading configuration from environment"),
    }
}
