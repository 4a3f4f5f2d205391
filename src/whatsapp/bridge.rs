//! WebSocket Bridge Transport
//!
//! The WhatsApp wire protocol is spoken by an external bridge process. This
//! module talks to it over a WebSocket using small JSON frames:
//!
//! Client → bridge:
//! - `{"type":"hello","credentials":"<base64>"}` once, right after connecting
//! - `{"type":"send","id":"<uuid>","to":"<jid>","text":"..."}`
//!
//! Bridge → client:
//! - `{"type":"qr","token":"..."}`
//! - `{"type":"open"}`
//! - `{"type":"close","reason":"..."}`
//! - `{"type":"creds","credentials":"<base64>"}`
//! - `{"type":"ack","id":"<uuid>","error":null}`

use super::retry::{retry_with_backoff, RetryPolicy};
use super::traits::*;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long `close` waits for the close frame to be flushed
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Bridge connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// WebSocket URL of the bridge (e.g. `ws://127.0.0.1:3001`)
    pub url: String,
    /// How long to wait for the bridge to acknowledge a send
    pub send_timeout: Duration,
    /// Bound on one dial, TCP connect plus WebSocket handshake
    pub dial_timeout: Duration,
    /// Retry schedule for the initial dial
    pub dial_retry: RetryPolicy,
}

impl BridgeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            send_timeout: Duration::from_secs(30),
            dial_timeout: Duration::from_secs(10),
            dial_retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame<'a> {
    Hello { credentials: String },
    Send { id: Uuid, to: &'a str, text: &'a str },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeFrame {
    Qr {
        token: String,
    },
    Open,
    Close {
        #[serde(default)]
        reason: Option<String>,
    },
    Creds {
        credentials: String,
    },
    Ack {
        id: Uuid,
        #[serde(default)]
        error: Option<String>,
    },
}

type PendingAcks = Arc<Mutex<HashMap<Uuid, oneshot::Sender<Result<(), String>>>>>;

/// Lock a mutex, recovering the data if a previous holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn dial_error(e: WsError) -> TransportError {
    match e {
        WsError::Io(e) => TransportError::Network(e.to_string()),
        other => TransportError::Protocol(other.to_string()),
    }
}

/// Opens sessions against a WebSocket bridge
pub struct BridgeTransportFactory {
    config: BridgeConfig,
}

impl BridgeTransportFactory {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for BridgeTransportFactory {
    async fn open(&self, credentials: Credentials) -> TransportResult<TransportSession> {
        let url = self.config.url.as_str();
        let dial_timeout = self.config.dial_timeout;
        let (socket, _) = retry_with_backoff(
            self.config.dial_retry,
            || async move {
                match tokio::time::timeout(dial_timeout, tokio_tungstenite::connect_async(url))
                    .await
                {
                    Ok(dialed) => dialed.map_err(dial_error),
                    Err(_) => Err(TransportError::Network(format!(
                        "bridge handshake timed out after {:?}",
                        dial_timeout
                    ))),
                }
            },
            TransportError::is_retryable,
        )
        .await?;
        info!(url, "connected to WhatsApp bridge");

        let (mut sink, mut stream) = socket.split();

        let hello = serde_json::to_string(&ClientFrame::Hello {
            credentials: BASE64.encode(credentials.as_bytes()),
        })
        .map_err(|e| TransportError::Protocol(e.to_string()))?;
        sink.send(WsMessage::Text(hello)).await.map_err(dial_error)?;

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, WsMessage::Close(_));
                if let Err(e) = sink.send(message).await {
                    debug!(error = %e, "bridge writer stopped");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending: PendingAcks = Arc::default();
        let reader_pending = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<BridgeFrame>(&text) {
                        Ok(frame) => dispatch(frame, &events_tx, &reader_pending),
                        Err(e) => warn!(error = %e, "ignoring malformed bridge frame"),
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "bridge socket error");
                        break;
                    }
                }
            }
            // Dropping the senders fails every in-flight send with `Closed`
            lock(&reader_pending).clear();
            debug!("bridge reader stopped");
        });

        let transport = BridgeTransport {
            outbound: outbound_tx,
            pending,
            send_timeout: self.config.send_timeout,
            reader: reader.abort_handle(),
            writer: Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
        };

        Ok(TransportSession {
            transport: Arc::new(transport),
            events: Box::pin(UnboundedReceiverStream::new(events_rx)),
        })
    }
}

fn dispatch(
    frame: BridgeFrame,
    events: &mpsc::UnboundedSender<TransportEvent>,
    pending: &PendingAcks,
) {
    let event = match frame {
        BridgeFrame::Qr { token } => TransportEvent::QrIssued(token),
        BridgeFrame::Open => TransportEvent::Opened,
        BridgeFrame::Close { reason } => {
            TransportEvent::Closed(reason.unwrap_or_else(|| "closed by bridge".to_string()))
        }
        BridgeFrame::Creds { credentials } => match BASE64.decode(credentials.as_bytes()) {
            Ok(blob) => TransportEvent::CredentialsUpdated(Credentials::from_bytes(blob)),
            Err(e) => {
                warn!(error = %e, "bridge sent undecodable credentials");
                return;
            }
        },
        BridgeFrame::Ack { id, error } => {
            let waiter = lock(pending).remove(&id);
            match waiter {
                Some(waiter) => {
                    let _ = waiter.send(error.map_or(Ok(()), Err));
                }
                None => debug!(%id, "ack for unknown or expired send"),
            }
            return;
        }
    };

    // The lifecycle may already have let go of this session
    let _ = events.send(event);
}

/// An open bridge session
pub struct BridgeTransport {
    outbound: mpsc::UnboundedSender<WsMessage>,
    pending: PendingAcks,
    send_timeout: Duration,
    reader: AbortHandle,
    writer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

#[async_trait]
impl MessagingTransport for BridgeTransport {
    async fn send_text(&self, to: &Jid, text: &str) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let id = Uuid::new_v4();
        let frame = serde_json::to_string(&ClientFrame::Send {
            id,
            to: to.as_str(),
            text,
        })
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let (ack_tx, ack_rx) = oneshot::channel();
        lock(&self.pending).insert(id, ack_tx);

        if self.outbound.send(WsMessage::Text(frame)).is_err() {
            lock(&self.pending).remove(&id);
            return Err(TransportError::Closed);
        }

        match tokio::time::timeout(self.send_timeout, ack_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(TransportError::Protocol(reason)),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(TransportError::Timeout(format!("no ack for message {}", id)))
            }
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.outbound.send(WsMessage::Close(None));
        let writer = lock(&self.writer).take();
        if let Some(writer) = writer {
            let abort = writer.abort_handle();
            if tokio::time::timeout(CLOSE_GRACE, writer).await.is_err() {
                abort.abort();
            }
        }
        self.reader.abort();
        lock(&self.pending).clear();
        debug!("bridge session closed");
    }
}

impl Drop for BridgeTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
