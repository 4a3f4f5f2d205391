//! WhatsApp Integration Module
//!
//! One WhatsApp session per process:
//! - Pairing through QR codes with a bounded attempt budget
//! - Opaque credential blob persisted across restarts
//! - Outbound text messages only while connected
//!
//! The wire protocol lives in an external bridge process; see [`bridge`].

pub mod bridge;
pub mod credentials;
pub mod gateway;
pub mod lifecycle;
pub mod mock;
pub mod qr;
pub mod retry;
pub mod status;
pub mod traits;

pub use bridge::{BridgeConfig, BridgeTransportFactory};
pub use credentials::{CredentialError, CredentialStore, FileCredentialStore};
pub use gateway::{GatewayError, GatewayResult, MessageGateway};
pub use lifecycle::{ConnectionLifecycle, LifecycleConfig, LifecycleError, LifecycleResult};
pub use mock::MockTransportFactory;
pub use status::{ConnectionState, Phase, StatusSnapshot};
pub use traits::{Credentials, Jid, TransportError, TransportEvent, TransportResult};
