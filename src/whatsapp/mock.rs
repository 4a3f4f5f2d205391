//! Mock WhatsApp Transport for Testing
//!
//! Provides MockTransportFactory so the lifecycle, gateway and HTTP layer can
//! be driven without a real bridge. Tests push events into a session with
//! [`MockSession::emit`] and inspect what the lifecycle did with it.

use super::traits::*;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Mock transport factory
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    state: Arc<Mutex<FactoryState>>,
}

#[derive(Default)]
struct FactoryState {
    sessions: Vec<MockSession>,
    opened_with: Vec<Credentials>,
    fail_next_open: Option<String>,
}

/// One session opened through the mock factory
#[derive(Clone)]
pub struct MockSession {
    transport: MockTransport,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MockSession {
    /// Push an event as if the network produced it.
    ///
    /// Returns false once the lifecycle has dropped the session's stream.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// End the event stream without a `Closed` event (transport crash)
    pub fn hang_up(self) {
        drop(self);
    }

    pub fn transport(&self) -> &MockTransport {
        &self.transport
    }
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` fail with a network error
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().fail_next_open = Some(reason.into());
    }

    /// Number of successfully opened sessions
    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    /// Credentials passed to each `open` call, in order
    pub fn opened_with(&self) -> Vec<Credentials> {
        self.state.lock().unwrap().opened_with.clone()
    }

    /// Most recently opened session
    ///
    /// The factory keeps its own event sender for every session, so a stream
    /// only ends when the lifecycle drops it or `hang_up` is called on the
    /// last handle; use [`MockTransportFactory::take_latest`] for the latter.
    pub fn latest(&self) -> Option<MockSession> {
        self.state.lock().unwrap().sessions.last().cloned()
    }

    /// Remove and return the most recent session, giving the caller the only
    /// handle to its event sender.
    pub fn take_latest(&self) -> Option<MockSession> {
        self.state.lock().unwrap().sessions.pop()
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn open(&self, credentials: Credentials) -> TransportResult<TransportSession> {
        let mut state = self.state.lock().unwrap();
        state.opened_with.push(credentials);

        if let Some(reason) = state.fail_next_open.take() {
            return Err(TransportError::Network(reason));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = MockTransport::default();
        state.sessions.push(MockSession {
            transport: transport.clone(),
            events: events_tx,
        });

        Ok(TransportSession {
            transport: Arc::new(transport),
            events: Box::pin(UnboundedReceiverStream::new(events_rx)),
        })
    }
}

/// Mock transport session handle
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

#[derive(Default)]
struct TransportState {
    sent: Vec<SentMessage>,
    close_count: usize,
    fail_sends: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: Jid,
    pub text: String,
}

impl MockTransport {
    /// Get sent messages for assertions
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    /// How many times `close` was called
    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().close_count
    }

    /// Make every subsequent send fail with a protocol error
    pub fn fail_sends(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().fail_sends = Some(reason.into());
    }
}

#[async_trait]
impl MessagingTransport for MockTransport {
    async fn send_text(&self, to: &Jid, text: &str) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.close_count > 0 {
            return Err(TransportError::Closed);
        }
        if let Some(reason) = &state.fail_sends {
            return Err(TransportError::Protocol(reason.clone()));
        }

        state.sent.push(SentMessage {
            to: to.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn close(&self) {
        self.state.lock().unwrap().close_count += 1;
    }
}
