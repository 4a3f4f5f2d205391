//! WhatsApp Connection Lifecycle
//!
//! Owns the pairing flow for the single WhatsApp session of this process:
//! - QR attempt counting with a hard budget (`max_qr_attempts`)
//! - QR expiry (one deadline live at a time, replaced on every new QR)
//! - Disconnected / Pairing / Connected / Closed transitions
//! - Credential persistence on every update from the transport
//!
//! All mutations happen inside one spawned task. Commands from handles,
//! transport events and the QR deadline are selected in that task, so no two
//! transitions ever interleave. Slow I/O (credential load, transport open,
//! transport close) runs in side tasks whose completions are posted back as
//! commands.

use super::credentials::CredentialStore;
use super::qr::{self, QrImage};
use super::status::{ConnectionState, Phase, StatusSnapshot};
use super::traits::*;
use crate::storage::SessionStorage;
use futures::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, Instant, Sleep};
use tracing::{debug, error, info, warn};

/// QR codes issued per pairing cycle before giving up
pub const DEFAULT_MAX_QR_ATTEMPTS: u32 = 5;

/// How long a QR code stays visible after issuance
pub const DEFAULT_QR_TIMEOUT: Duration = Duration::from_millis(5000);

/// Lifecycle tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub max_qr_attempts: u32,
    pub qr_timeout: Duration,
    /// Also print each QR code to stdout
    pub print_qr_in_terminal: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_qr_attempts: DEFAULT_MAX_QR_ATTEMPTS,
            qr_timeout: DEFAULT_QR_TIMEOUT,
            print_qr_in_terminal: false,
        }
    }
}

impl LifecycleConfig {
    /// Whether the QR for `attempt` goes to the terminal. The final attempt
    /// tears the session down at once, so it is never printed.
    fn prints_qr(&self, attempt: u32) -> bool {
        self.print_qr_in_terminal && attempt < self.max_qr_attempts
    }
}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Transport initialization failed: {0}")]
    TransportInit(#[source] TransportError),

    #[error("Connection lifecycle has stopped")]
    Stopped,
}

enum Command {
    Connect {
        reply: oneshot::Sender<LifecycleResult<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    /// Posted by the open task once credentials are loaded and the transport is up
    SessionReady {
        generation: u64,
        result: TransportResult<TransportSession>,
        reply: oneshot::Sender<LifecycleResult<()>>,
    },
    State {
        reply: oneshot::Sender<ConnectionState>,
    },
    ActiveTransport {
        reply: oneshot::Sender<Option<Arc<dyn MessagingTransport>>>,
    },
}

/// Handle to the connection lifecycle
///
/// Cheap to clone. The lifecycle task stops once every handle is dropped.
#[derive(Clone)]
pub struct ConnectionLifecycle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<StatusSnapshot>,
}

impl ConnectionLifecycle {
    /// Spawn the lifecycle task on the current tokio runtime.
    pub fn spawn(
        config: LifecycleConfig,
        factory: Arc<dyn TransportFactory>,
        credentials: Arc<dyn CredentialStore>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());

        let actor = LifecycleActor {
            config,
            factory,
            credentials,
            storage,
            commands: commands_rx,
            self_tx: commands_tx.downgrade(),
            status_tx,
            phase: Phase::Disconnected,
            attempts: 0,
            qr_image: None,
            qr_expiry: None,
            transport: None,
            events: None,
            generation: 0,
        };
        tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            status: status_rx,
        }
    }

    /// Start a session unless one is already pairing or connected.
    ///
    /// Returns once the transport is open; pairing continues in the
    /// background and is visible through [`ConnectionLifecycle::status`].
    ///
    /// # Errors
    /// Returns `TransportInit` if the transport could not be opened; the
    /// lifecycle is back in `Disconnected` in that case.
    pub async fn connect(&self) -> LifecycleResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect { reply })?;
        rx.await.map_err(|_| LifecycleError::Stopped)?
    }

    /// Tear down the session. No-op when already disconnected.
    pub async fn disconnect(&self) -> LifecycleResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Disconnect { reply })?;
        rx.await.map_err(|_| LifecycleError::Stopped)
    }

    /// Latest status snapshot. Pure read.
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Watch status snapshots as the lifecycle publishes them
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Current state, read through the lifecycle task.
    ///
    /// Everything posted to the lifecycle before this call has been applied
    /// by the time it returns.
    pub async fn state(&self) -> LifecycleResult<ConnectionState> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::State { reply })?;
        rx.await.map_err(|_| LifecycleError::Stopped)
    }

    /// The live transport, only while `Connected`
    pub(crate) async fn active_transport(
        &self,
    ) -> LifecycleResult<Option<Arc<dyn MessagingTransport>>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ActiveTransport { reply })?;
        rx.await.map_err(|_| LifecycleError::Stopped)
    }

    fn send(&self, command: Command) -> LifecycleResult<()> {
        self.commands
            .send(command)
            .map_err(|_| LifecycleError::Stopped)
    }
}

/// Pending QR expiry deadline for one attempt
struct QrExpiry {
    attempt: u32,
    deadline: Pin<Box<Sleep>>,
}

struct LifecycleActor {
    config: LifecycleConfig,
    factory: Arc<dyn TransportFactory>,
    credentials: Arc<dyn CredentialStore>,
    storage: Arc<dyn SessionStorage>,
    commands: mpsc::UnboundedReceiver<Command>,
    self_tx: mpsc::WeakUnboundedSender<Command>,
    status_tx: watch::Sender<StatusSnapshot>,

    phase: Phase,
    attempts: u32,
    qr_image: Option<QrImage>,
    qr_expiry: Option<QrExpiry>,
    transport: Option<Arc<dyn MessagingTransport>>,
    events: Option<EventStream>,
    /// Bumped whenever a session starts or is torn down; stale open
    /// completions carry an old value
    generation: u64,
}

async fn next_event(events: &mut Option<EventStream>) -> Option<TransportEvent> {
    match events {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn qr_expired(expiry: &mut Option<QrExpiry>) -> u32 {
    match expiry {
        Some(expiry) => {
            expiry.deadline.as_mut().await;
            expiry.attempt
        }
        None => std::future::pending().await,
    }
}

fn close_in_background(
    transport: Option<Arc<dyn MessagingTransport>>,
    reply: Option<oneshot::Sender<()>>,
) {
    tokio::spawn(async move {
        if let Some(transport) = transport {
            transport.close().await;
        }
        if let Some(reply) = reply {
            let _ = reply.send(());
        }
    });
}

impl LifecycleActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                event = next_event(&mut self.events) => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => self.handle_stream_ended().await,
                },
                attempt = qr_expired(&mut self.qr_expiry) => self.handle_qr_expired(attempt),
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        debug!("connection lifecycle stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => self.connect(reply),
            Command::Disconnect { reply } => self.disconnect(reply).await,
            Command::SessionReady {
                generation,
                result,
                reply,
            } => self.session_ready(generation, result, reply).await,
            Command::State { reply } => {
                let _ = reply.send(self.connection_state());
            }
            Command::ActiveTransport { reply } => {
                let transport = match self.phase {
                    Phase::Connected => self.transport.clone(),
                    _ => None,
                };
                let _ = reply.send(transport);
            }
        }
    }

    fn connect(&mut self, reply: oneshot::Sender<LifecycleResult<()>>) {
        if matches!(self.phase, Phase::Pairing | Phase::Connected) {
            debug!(phase = ?self.phase, "connect ignored, session already active");
            let _ = reply.send(Ok(()));
            return;
        }

        let Some(commands) = self.self_tx.upgrade() else {
            let _ = reply.send(Err(LifecycleError::Stopped));
            return;
        };

        self.generation += 1;
        self.phase = Phase::Pairing;
        self.attempts = 0;
        self.clear_qr();
        self.publish();
        info!(generation = self.generation, "opening WhatsApp session");

        let generation = self.generation;
        let factory = Arc::clone(&self.factory);
        let credentials = Arc::clone(&self.credentials);
        tokio::spawn(async move {
            let stored = credentials.load().await;
            let result = factory.open(stored).await;

            if let Err(mpsc::error::SendError(Command::SessionReady {
                result: Ok(session),
                ..
            })) = commands.send(Command::SessionReady {
                generation,
                result,
                reply,
            }) {
                // Lifecycle is gone; nobody will own this session
                session.transport.close().await;
            }
        });
    }

    async fn session_ready(
        &mut self,
        generation: u64,
        result: TransportResult<TransportSession>,
        reply: oneshot::Sender<LifecycleResult<()>>,
    ) {
        if generation != self.generation || self.phase != Phase::Pairing {
            debug!(generation, "discarding superseded session");
            if let Ok(session) = result {
                close_in_background(Some(session.transport), None);
            }
            let _ = reply.send(Ok(()));
            return;
        }

        match result {
            Ok(session) => {
                self.transport = Some(session.transport);
                self.events = Some(session.events);
                info!(generation, "WhatsApp transport open, waiting for pairing");
                let _ = reply.send(Ok(()));
            }
            Err(e) => {
                error!(error = %e, "failed to open WhatsApp transport");
                self.phase = Phase::Disconnected;
                self.publish();
                let _ = reply.send(Err(LifecycleError::TransportInit(e)));
            }
        }
    }

    async fn disconnect(&mut self, reply: oneshot::Sender<()>) {
        if self.phase == Phase::Disconnected {
            let _ = reply.send(());
            return;
        }

        info!("disconnecting from WhatsApp");
        let transport = self.teardown(Phase::Disconnected).await;
        close_in_background(transport, Some(reply));
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::QrIssued(token) => self.handle_qr_issued(token).await,
            TransportEvent::Opened => self.handle_opened().await,
            TransportEvent::Closed(reason) => self.handle_closed(reason).await,
            TransportEvent::CredentialsUpdated(credentials) => {
                if let Err(e) = self.credentials.save(&credentials).await {
                    warn!(error = %e, "failed to persist updated credentials");
                }
            }
        }
    }

    async fn handle_qr_issued(&mut self, token: String) {
        if self.phase != Phase::Pairing {
            warn!(phase = ?self.phase, "ignoring QR code outside of pairing");
            return;
        }

        self.attempts += 1;
        let attempt = self.attempts;
        let max = self.config.max_qr_attempts;
        info!(attempt, max, "QR code issued");

        match qr::render_data_url(&token) {
            Ok(data_url) => {
                self.qr_image = Some(QrImage {
                    attempt,
                    data_url,
                    issued_at: Instant::now(),
                });
                // Replaces (and thereby cancels) the previous attempt's deadline
                self.qr_expiry = Some(QrExpiry {
                    attempt,
                    deadline: Box::pin(sleep(self.config.qr_timeout)),
                });
                if self.config.prints_qr(attempt) {
                    qr::print_to_terminal(&token, attempt, max);
                }
            }
            Err(e) => error!(attempt, error = %e, "failed to render QR code"),
        }

        if attempt >= max {
            warn!(attempts = attempt, "max QR attempts reached, disconnecting");
            let transport = self.teardown(Phase::Disconnected).await;
            close_in_background(transport, None);
        } else {
            self.publish();
        }
    }

    async fn handle_opened(&mut self) {
        info!("connected to WhatsApp");
        self.phase = Phase::Connected;
        self.attempts = 0;
        self.clear_qr();
        self.persist_session_status(true).await;
        self.publish();
    }

    async fn handle_closed(&mut self, reason: String) {
        info!(%reason, "disconnected from WhatsApp");
        let transport = self.teardown(Phase::Disconnected).await;
        close_in_background(transport, None);
    }

    async fn handle_stream_ended(&mut self) {
        warn!(phase = ?self.phase, "transport event stream ended unexpectedly");
        let transport = self.teardown(Phase::Closed).await;
        close_in_background(transport, None);
    }

    fn handle_qr_expired(&mut self, attempt: u32) {
        self.qr_expiry = None;
        if self.qr_image.as_ref().map(|image| image.attempt) == Some(attempt) {
            debug!(attempt, "QR code expired");
            self.qr_image = None;
            self.publish();
        }
    }

    /// Leave the active session: drop its events and QR state, persist
    /// `is_connected = false`, and hand back the transport for closing.
    async fn teardown(&mut self, next: Phase) -> Option<Arc<dyn MessagingTransport>> {
        self.generation += 1;
        self.events = None;
        self.clear_qr();
        let transport = self.transport.take();
        self.phase = next;
        self.persist_session_status(false).await;
        self.publish();
        transport
    }

    fn clear_qr(&mut self) {
        self.qr_image = None;
        self.qr_expiry = None;
    }

    async fn persist_session_status(&mut self, is_connected: bool) {
        let storage = Arc::clone(&self.storage);
        if let Err(e) = storage.update_session_status(is_connected).await {
            warn!(is_connected, error = %e, "failed to persist session status");
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(StatusSnapshot::project(
            self.phase,
            self.qr_image.as_ref(),
            self.attempts,
        ));
    }

    fn connection_state(&self) -> ConnectionState {
        match self.phase {
            Phase::Disconnected => ConnectionState::Disconnected,
            Phase::Pairing => ConnectionState::Pairing {
                qr_image: self.qr_image.clone(),
                attempts: self.attempts,
            },
            Phase::Connected => ConnectionState::Connected,
            Phase::Closed => ConnectionState::Closed,
        }
    }
}
