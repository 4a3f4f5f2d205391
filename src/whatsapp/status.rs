//! Status projection for UI pollers.

use super::qr::QrImage;
use serde::{Deserialize, Serialize};

/// Coarse connection phase owned by the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Disconnected,
    Pairing,
    Connected,
    /// The transport went away without saying goodbye; `connect()` re-enters
    Closed,
}

/// Full connection state as a tagged variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Pairing {
        qr_image: Option<QrImage>,
        attempts: u32,
    },
    Connected,
    Closed,
}

impl ConnectionState {
    pub fn phase(&self) -> Phase {
        match self {
            ConnectionState::Disconnected => Phase::Disconnected,
            ConnectionState::Pairing { .. } => Phase::Pairing,
            ConnectionState::Connected => Phase::Connected,
            ConnectionState::Closed => Phase::Closed,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Immutable status snapshot
///
/// Serializes as `{"isConnected":bool,"qrCode":string|null,"qrAttempts":int}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_connected: bool,
    pub qr_code: Option<String>,
    pub qr_attempts: u32,
}

impl StatusSnapshot {
    /// Project lifecycle state into a snapshot.
    ///
    /// The attempt counter is passed separately because it outlives the
    /// pairing phase (a cycle that ran out of attempts still reports them).
    pub fn project(phase: Phase, qr_image: Option<&QrImage>, attempts: u32) -> Self {
        Self {
            is_connected: phase == Phase::Connected,
            qr_code: match phase {
                Phase::Pairing => qr_image.map(|image| image.data_url.clone()),
                _ => None,
            },
            qr_attempts: attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn image() -> QrImage {
        QrImage {
            attempt: 1,
            data_url: "data:image/svg+xml;base64,AAAA".to_string(),
            issued_at: Instant::now(),
        }
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = StatusSnapshot {
            is_connected: false,
            qr_code: None,
            qr_attempts: 2,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"isConnected": false, "qrCode": null, "qrAttempts": 2})
        );
    }

    #[test]
    fn test_project_pairing_exposes_qr() {
        let image = image();
        let snapshot = StatusSnapshot::project(Phase::Pairing, Some(&image), 1);

        assert!(!snapshot.is_connected);
        assert_eq!(snapshot.qr_code.as_deref(), Some(image.data_url.as_str()));
        assert_eq!(snapshot.qr_attempts, 1);
    }

    #[test]
    fn test_project_hides_qr_outside_pairing() {
        let image = image();
        for phase in [Phase::Disconnected, Phase::Connected, Phase::Closed] {
            let snapshot = StatusSnapshot::project(phase, Some(&image), 3);
            assert!(snapshot.qr_code.is_none(), "phase {:?} leaked a QR", phase);
        }
    }

    #[test]
    fn test_project_connected() {
        let snapshot = StatusSnapshot::project(Phase::Connected, None, 0);
        assert!(snapshot.is_connected);
        assert_eq!(snapshot, StatusSnapshot {
            is_connected: true,
            qr_code: None,
            qr_attempts: 0,
        });
    }

    #[test]
    fn test_connection_state_phase() {
        let state = ConnectionState::Pairing {
            qr_image: None,
            attempts: 0,
        };
        assert_eq!(state.phase(), Phase::Pairing);
        assert!(!state.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert_eq!(ConnectionState::Closed.phase(), Phase::Closed);
    }
}
