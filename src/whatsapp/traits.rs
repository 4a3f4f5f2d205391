//! WhatsApp Transport Trait Abstractions
//!
//! The wire protocol lives outside this crate. The lifecycle only sees a
//! [`TransportFactory`] that opens sessions and a [`MessagingTransport`] that
//! sends, plus a closed set of [`TransportEvent`]s.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Server suffix for individual (non-group) chats
pub const USER_SERVER: &str = "s.whatsapp.net";

/// WhatsApp recipient identifier (`<number>@s.whatsapp.net`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid(String);

impl Jid {
    /// Normalize a user-supplied recipient into a JID.
    ///
    /// A leading `+` is dropped and the user server suffix is appended when the
    /// identifier has no `@`. Returns `None` for blank input.
    pub fn from_recipient(recipient: &str) -> Option<Self> {
        let trimmed = recipient.trim();
        let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return None;
        }

        if trimmed.contains('@') {
            Some(Self(trimmed.to_string()))
        } else {
            Some(Self(format!("{}@{}", trimmed, USER_SERVER)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque authentication state handed to the transport.
///
/// Only the credential store and the transport look inside. The bytes are
/// wiped when the value is dropped.
#[derive(Clone, PartialEq, Eq, Default, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    blob: Vec<u8>,
}

impl Credentials {
    /// Freshly initialized (empty) credentials for a device that has never paired
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn from_bytes(blob: impl Into<Vec<u8>>) -> Self {
        Self { blob: blob.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    pub fn is_fresh(&self) -> bool {
        self.blob.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("len", &self.blob.len())
            .finish()
    }
}

/// Lifecycle events emitted by a transport session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new pairing token is available for scanning
    QrIssued(String),
    /// The device link is confirmed and the session is usable
    Opened,
    /// The network closed the session
    Closed(String),
    /// The transport rotated its authentication state
    CredentialsUpdated(Credentials),
}

/// Stream of events for one transport session
pub type EventStream = BoxStream<'static, TransportEvent>;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Session closed")]
    Closed,
}

impl TransportError {
    /// Network failures are transient; everything else is not worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

/// Command surface of an open transport session
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Send a text message
    async fn send_text(&self, to: &Jid, text: &str) -> TransportResult<()>;

    /// Tear down the session. Safe to call more than once.
    async fn close(&self);
}

/// A freshly opened session: the command handle plus its event stream
pub struct TransportSession {
    pub transport: Arc<dyn MessagingTransport>,
    pub events: EventStream,
}

/// Opens transport sessions
///
/// Implemented by the WebSocket bridge in production and by
/// `MockTransportFactory` in tests.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Establish a socket with the given credentials.
    ///
    /// Returns once the socket is up; pairing progress arrives on the
    /// session's event stream.
    async fn open(&self, credentials: Credentials) -> TransportResult<TransportSession>;
}
