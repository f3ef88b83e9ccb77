//! airmute-daemon: toggle the microphone with a volume up, volume down gesture
//!
//! This daemon runs as a LaunchAgent and provides:
//! - Output volume sampling and up-then-down gesture recognition
//! - A single mute toggle shared by the gesture, a global shortcut
//!   (Command+Option+Shift+M) and the menu bar app
//! - IPC server for menu bar app communication
//!
//! Nothing is persisted; every launch starts unmuted.

mod config;
mod engine;
mod events;
mod gesture;
mod hotkey;
mod ipc;
mod lifecycle;
mod mute;
mod volume;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::Engine;
use crate::events::MuteEvent;
use crate::gesture::GestureRecognizer;
use crate::hotkey::HotkeyListener;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::mute::{MuteController, OsascriptInputGain, SystemFeedback};
use crate::volume::{OsascriptVolume, VolumePoller};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "airmute-daemon starting");

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        window_ms = config.window.as_millis() as u64,
        poll_ms = config.poll_interval.as_millis() as u64,
        "configuration loaded"
    );

    let shutdown = ShutdownSignal::new();

    // Sampler, hotkey listener and IPC -> engine
    let (engine_tx, engine_rx) = mpsc::channel(64);
    // Engine -> IPC server and feedback
    let (event_tx, _event_rx) = broadcast::channel::<MuteEvent>(64);

    let controller = MuteController::new(
        OsascriptInputGain::new(config.unmuted_input_level),
        SystemFeedback::new(
            config.mute_sound.clone(),
            config.unmute_sound.clone(),
            config.sound_volume,
            event_tx.clone(),
        ),
    );
    let mut engine = Engine::new(
        GestureRecognizer::new(config.window),
        controller,
        event_tx.clone(),
    );

    let poller = VolumePoller::new(OsascriptVolume::new(), config.poll_interval, engine_tx.clone());
    let sampler = tokio::spawn(poller.run());

    // Start the hotkey listener; returns once the event tap is installed
    let hotkey_listener = HotkeyListener::new(engine_tx.clone());
    let hotkey_registered = match hotkey_listener.start() {
        Ok(()) => {
            info!("hotkey listener started");
            true
        }
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
            warn!("continuing without the mute shortcut");
            false
        }
    };

    let server = Server::new(&config.socket_path, engine_tx, event_tx.clone(), shutdown.clone())?;
    server.set_hotkey_registered(hotkey_registered).await;

    let mut ipc_event_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Gesture recognition and mute control
        _ = engine.run(engine_rx) => {
            info!("engine exited");
        }

        // Accept menu bar clients
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the IPC status snapshot in sync with the engine
        _ = async {
            loop {
                match ipc_event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "mute event");
                        server_for_events.apply_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "mute event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("mute event handler exited");
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // The engine future is gone at this point; nothing reaches the
    // controller after this line
    info!(muted = engine.is_muted(), "shutting down...");

    hotkey_listener.stop();
    sampler.abort();
    server.shutdown().await;

    info!("airmute-daemon stopped");

    Ok(())
}
