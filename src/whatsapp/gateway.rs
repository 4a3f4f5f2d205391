//! Outbound message gateway.
//!
//! Sends only while the lifecycle reports `Connected` and records each
//! successful send in the message log. No retries at this layer.

use super::lifecycle::{ConnectionLifecycle, LifecycleError};
use super::traits::{Jid, TransportError};
use crate::storage::{Message, SessionStorage, StorageError};
use std::sync::Arc;
use tracing::{info, warn};

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("WhatsApp not connected")]
    NotConnected,

    #[error("Invalid recipient: {0:?}")]
    InvalidRecipient(String),

    #[error("Message content is empty")]
    EmptyContent,

    #[error("Send failed: {0}")]
    SendFailed(#[source] TransportError),

    #[error("Failed to record message: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Validates and forwards outbound messages
#[derive(Clone)]
pub struct MessageGateway {
    lifecycle: ConnectionLifecycle,
    storage: Arc<dyn SessionStorage>,
}

impl MessageGateway {
    pub fn new(lifecycle: ConnectionLifecycle, storage: Arc<dyn SessionStorage>) -> Self {
        Self { lifecycle, storage }
    }

    /// Send a text message and record it.
    ///
    /// The connection state is read once, at call time. A disconnect that
    /// lands while the send is in flight surfaces as `SendFailed`.
    ///
    /// # Errors
    /// - `NotConnected` unless the lifecycle is `Connected` (checked first)
    /// - `InvalidRecipient` / `EmptyContent` before the transport is touched
    /// - `SendFailed` if the transport rejects the send; nothing is recorded
    pub async fn send(&self, to: &str, content: &str) -> GatewayResult<Message> {
        let transport = self
            .lifecycle
            .active_transport()
            .await?
            .ok_or(GatewayError::NotConnected)?;

        let jid = Jid::from_recipient(to)
            .ok_or_else(|| GatewayError::InvalidRecipient(to.to_string()))?;
        if content.trim().is_empty() {
            return Err(GatewayError::EmptyContent);
        }

        if let Err(e) = transport.send_text(&jid, content).await {
            warn!(to = %jid, error = %e, "failed to send message");
            return Err(GatewayError::SendFailed(e));
        }

        let message = self.storage.create_message(to, content).await?;
        info!(id = message.id, to = %jid, "message sent");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;
    use crate::whatsapp::credentials::FileCredentialStore;
    use crate::whatsapp::lifecycle::LifecycleConfig;
    use crate::whatsapp::mock::{MockSession, MockTransportFactory};
    use crate::whatsapp::traits::TransportEvent;
    use tempfile::TempDir;

    struct Fixture {
        gateway: MessageGateway,
        lifecycle: ConnectionLifecycle,
        factory: MockTransportFactory,
        storage: Arc<MemStorage>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let factory = MockTransportFactory::new();
        let storage = Arc::new(MemStorage::new());
        let lifecycle = ConnectionLifecycle::spawn(
            LifecycleConfig::default(),
            Arc::new(factory.clone()),
            Arc::new(FileCredentialStore::new(dir.path().join("auth.json"))),
            storage.clone(),
        );
        let gateway = MessageGateway::new(lifecycle.clone(), storage.clone());
        Fixture {
            gateway,
            lifecycle,
            factory,
            storage,
            _dir: dir,
        }
    }

    async fn connected(f: &Fixture) -> MockSession {
        f.lifecycle.connect().await.unwrap();
        let session = f.factory.latest().unwrap();
        session.emit(TransportEvent::Opened);
        f.lifecycle.state().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_send_while_connected() {
        let f = fixture();
        let session = connected(&f).await;

        let message = f.gateway.send("15551234567", "hi").await.unwrap();

        assert_eq!(message.to, "15551234567");
        assert_eq!(message.content, "hi");
        assert!(message.sent);

        let sent = session.transport().sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.as_str(), "15551234567@s.whatsapp.net");
        assert_eq!(f.storage.messages().await.unwrap(), vec![message]);
    }

    #[tokio::test]
    async fn test_send_while_disconnected() {
        let f = fixture();

        let result = f.gateway.send("15551234567", "hi").await;

        assert!(matches!(result, Err(GatewayError::NotConnected)));
        assert!(f.storage.messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_while_pairing() {
        let f = fixture();
        f.lifecycle.connect().await.unwrap();
        let session = f.factory.latest().unwrap();

        let result = f.gateway.send("15551234567", "hi").await;

        assert!(matches!(result, Err(GatewayError::NotConnected)));
        assert!(session.transport().sent_messages().is_empty());
        assert!(f.storage.messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_never_reaches_transport() {
        let f = fixture();
        let session = connected(&f).await;

        assert!(matches!(
            f.gateway.send("15551234567", "").await,
            Err(GatewayError::EmptyContent)
        ));
        assert!(matches!(
            f.gateway.send("15551234567", "   ").await,
            Err(GatewayError::EmptyContent)
        ));
        assert!(session.transport().sent_messages().is_empty());
        assert!(f.storage.messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_recipient_rejected() {
        let f = fixture();
        let session = connected(&f).await;

        assert!(matches!(
            f.gateway.send("", "hi").await,
            Err(GatewayError::InvalidRecipient(_))
        ));
        assert!(session.transport().sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_records_nothing() {
        let f = fixture();
        let session = connected(&f).await;
        session.transport().fail_sends("not on whatsapp");

        let result = f.gateway.send("15551234567", "hi").await;

        assert!(matches!(result, Err(GatewayError::SendFailed(_))));
        assert!(f.storage.messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_after_disconnect() {
        let f = fixture();
        connected(&f).await;
        f.lifecycle.disconnect().await.unwrap();

        assert!(matches!(
            f.gateway.send("15551234567", "hi").await,
            Err(GatewayError::NotConnected)
        ));
    }
}
