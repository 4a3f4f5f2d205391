//! Session Storage
//!
//! Message log and session-status flag shared by the lifecycle, the gateway
//! and the HTTP layer. The log is append-only; records are never updated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A sent message record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub to: String,
    pub content: String,
    pub sent: bool,
    pub timestamp: DateTime<Utc>,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Message log and session-status collaborator
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Append a sent message and return the stored record
    async fn create_message(&self, to: &str, content: &str) -> StorageResult<Message>;

    /// All messages, oldest first
    async fn messages(&self) -> StorageResult<Vec<Message>>;

    async fn update_session_status(&self, is_connected: bool) -> StorageResult<()>;

    async fn session_status(&self) -> StorageResult<bool>;
}

#[derive(Default)]
struct MemState {
    messages: Vec<Message>,
    is_connected: bool,
}

/// In-memory storage (process lifetime only)
#[derive(Default)]
pub struct MemStorage {
    state: RwLock<MemState>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemStorage {
    async fn create_message(&self, to: &str, content: &str) -> StorageResult<Message> {
        let mut state = self.state.write().await;
        let message = Message {
            id: state.messages.len() as u64 + 1,
            to: to.to_string(),
            content: content.to_string(),
            sent: true,
            timestamp: Utc::now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn messages(&self) -> StorageResult<Vec<Message>> {
        Ok(self.state.read().await.messages.clone())
    }

    async fn update_session_status(&self, is_connected: bool) -> StorageResult<()> {
        self.state.write().await.is_connected = is_connected;
        Ok(())
    }

    async fn session_status(&self) -> StorageResult<bool> {
        Ok(self.state.read().await.is_connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_message_assigns_sequential_ids() {
        let storage = MemStorage::new();

        let first = storage.create_message("1555", "hi").await.unwrap();
        let second = storage.create_message("1666", "there").await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(first.sent);
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_messages_oldest_first() {
        let storage = MemStorage::new();
        storage.create_message("a", "one").await.unwrap();
        storage.create_message("b", "two").await.unwrap();
        storage.create_message("c", "three").await.unwrap();

        let contents: Vec<String> = storage
            .messages()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_session_status() {
        let storage = MemStorage::new();
        assert!(!storage.session_status().await.unwrap());

        storage.update_session_status(true).await.unwrap();
        assert!(storage.session_status().await.unwrap());

        storage.update_session_status(false).await.unwrap();
        assert!(!storage.session_status().await.unwrap());
    }

    #[test]
    fn test_message_json_shape() {
        let message = Message {
            id: 1,
            to: "1555".to_string(),
            content: "hi".to_string(),
            sent: true,
            timestamp: "2024-05-01T12:00:00Z".parse().unwrap(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["to"], "1555");
        assert_eq!(json["sent"], true);
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }
}
