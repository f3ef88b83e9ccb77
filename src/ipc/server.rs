//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of mute
//! events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::unix::OwnedReadHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};

use crate::engine::Command;
use crate::events::{MuteEvent, ToggleSource};
use crate::lifecycle::ShutdownSignal;

use super::protocol::{read_frame, write_frame, DaemonStatus, Notification, Request, Response};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    context: ClientContext,
}

/// Shared server state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
}

/// Handles every client needs
#[derive(Clone)]
struct ClientContext {
    engine_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<MuteEvent>,
    quit: ShutdownSignal,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        engine_tx: mpsc::Sender<Command>,
        event_tx: broadcast::Sender<MuteEvent>,
        quit: ShutdownSignal,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: DaemonStatus::default(),
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            state,
            shutdown_tx,
            context: ClientContext {
                engine_tx,
                event_tx,
                quit,
            },
        })
    }

    /// Record whether the global shortcut is active
    pub async fn set_hotkey_registered(&self, registered: bool) {
        self.state.write().await.status.hotkey_registered = registered;
    }

    /// Fold an engine event into the status snapshot
    pub async fn apply_event(&self, event: &MuteEvent) {
        let mut state = self.state.write().await;
        match event {
            MuteEvent::GestureDetected => {
                state.status.gestures_detected += 1;
            }
            MuteEvent::MuteChanged { muted, source } => {
                if state.status.muted != *muted {
                    info!(muted, %source, "IPC server: mute state updated");
                }
                state.status.muted = *muted;
            }
            MuteEvent::ActuationFailed { .. } | MuteEvent::IconChanged { .. } => {}
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let context = self.context.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        context: ClientContext,
    ) -> Result<()> {
        let (reader, mut writer) = stream.into_split();

        // Frames are read on their own task so a partial read is never
        // dropped when a notification wins the select below
        let (request_tx, mut request_rx) = mpsc::channel(8);
        let reader_task = tokio::spawn(Self::read_requests(reader, request_tx));

        let mut events: Option<broadcast::Receiver<MuteEvent>> = None;

        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else {
                        debug!("client disconnected");
                        break Ok(());
                    };

                    let response = match request {
                        Ok(request) => {
                            debug!(?request, "received request");
                            Self::process_request(request, &state, &context, &mut events).await
                        }
                        Err(message) => Response::error("bad_request", message),
                    };

                    if let Err(e) = write_frame(&mut writer, &response).await {
                        break Err(e);
                    }
                }

                event = next_event(&mut events) => match event {
                    Some(event) => {
                        let notification = Notification::Event { event };
                        if let Err(e) = write_frame(&mut writer, &notification).await {
                            break Err(e);
                        }
                    }
                    None => {
                        events = None;
                    }
                },
            }
        };

        reader_task.abort();
        result
    }

    /// Forward parsed frames; a parse failure is reported, not fatal
    async fn read_requests(
        mut reader: OwnedReadHalf,
        request_tx: mpsc::Sender<Result<Request, String>>,
    ) {
        loop {
            let request = match read_frame::<_, Request>(&mut reader).await {
                Ok(Some(request)) => Ok(request),
                Ok(None) => return,
                Err(e) if e.downcast_ref::<serde_json::Error>().is_some() => Err(format!("{:#}", e)),
                Err(e) => {
                    warn!(?e, "closing client connection");
                    return;
                }
            };

            if request_tx.send(request).await.is_err() {
                return;
            }
        }
    }

    /// Process a request and return a response
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        context: &ClientContext,
        events: &mut Option<broadcast::Receiver<MuteEvent>>,
    ) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let mut state = state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                Response::Status(state.status.clone())
            }

            Request::Toggle => {
                let (reply_tx, reply_rx) = oneshot::channel();
                let command = Command::Toggle {
                    source: ToggleSource::Menu,
                    reply: Some(reply_tx),
                };

                if context.engine_tx.send(command).await.is_err() {
                    return Response::error("engine_unavailable", "engine is not running");
                }

                match reply_rx.await {
                    Ok(muted) => Response::MuteState { muted },
                    Err(_) => Response::error("engine_unavailable", "engine dropped the request"),
                }
            }

            Request::Subscribe => {
                if events.is_none() {
                    *events = Some(context.event_tx.subscribe());
                    debug!("client subscribed to notifications");
                }
                Response::Subscribed
            }

            Request::Quit => {
                info!("quit requested via IPC");
                context.quit.trigger();
                Response::ShuttingDown
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Next event for a subscribed client. Pending forever when not subscribed;
/// `None` once the event channel has closed.
async fn next_event(events: &mut Option<broadcast::Receiver<MuteEvent>>) -> Option<MuteEvent> {
    let Some(rx) = events.as_mut() else {
        return std::future::pending().await;
    };

    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "notification receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
