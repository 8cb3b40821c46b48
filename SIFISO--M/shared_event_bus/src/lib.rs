#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Publish/subscribe abstractions connecting the Sifiso core to its outer collaborators.
//!
//! The bus is generic over the event payload: telemetry uses [`EventRecord`], agents hand
//! notification intents to the same machinery, and the UI subscribes to whichever it needs.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::broadcast};
use uuid::Uuid;

/// Generic lifecycle event encoded as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier (uuid).
    pub id: String,
    /// Component producing the event.
    pub source: String,
    /// Event type (e.g., `orchestrator.task.completed`).
    pub event_type: String,
    /// RFC3339 timestamp.
    pub timestamp: String,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EventRecord {
    /// Creates a record with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("evt-{}", Uuid::new_v4()),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now().to_rfc3339(),
            payload,
        }
    }
}

/// Event publisher interface.
#[async_trait]
pub trait EventPublisher<E>: Send + Sync
where
    E: Send + 'static,
{
    /// Publishes an event. Implementations must not wait on slow consumers.
    async fn publish(&self, event: E) -> Result<()>;
}

/// Event subscriber interface.
#[async_trait]
pub trait EventSubscriber<E>: Send + Sync
where
    E: Send + 'static,
{
    /// Returns a receiver observing every event published after the call.
    async fn subscribe(&self) -> Result<broadcast::Receiver<E>>;
}

/// In-memory broadcast bus with a bounded backlog of recent events.
///
/// Lagging receivers lose the oldest events rather than stalling publishers.
#[derive(Debug, Clone)]
pub struct MemoryEventBus<E> {
    sender: broadcast::Sender<E>,
    backlog: Arc<Mutex<VecDeque<E>>>,
    capacity: usize,
}

impl<E> MemoryEventBus<E>
where
    E: Clone + Send + 'static,
{
    /// Creates a new bus with the given capacity (channel depth and backlog length).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            backlog: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Snapshot of recent events retained in memory, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<E> {
        self.backlog.lock().iter().cloned().collect()
    }

    /// Number of live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn retain(&self, event: E) {
        let mut backlog = self.backlog.lock();
        backlog.push_back(event);
        while backlog.len() > self.capacity {
            backlog.pop_front();
        }
    }
}

/// File-backed publisher appending one JSON document per line.
#[derive(Debug, Clone)]
pub struct FileEventPublisher {
    path: PathBuf,
}

impl FileEventPublisher {
    /// Creates a publisher that appends JSON lines to the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<E> EventPublisher<E> for MemoryEventBus<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn publish(&self, event: E) -> Result<()> {
        self.retain(event.clone());
        // No receivers is not an error: the backlog still records the event.
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[async_trait]
impl<E> EventSubscriber<E> for MemoryEventBus<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn subscribe(&self) -> Result<broadcast::Receiver<E>> {
        Ok(self.sender.subscribe())
    }
}

#[async_trait]
impl<E> EventPublisher<E> for FileEventPublisher
where
    E: Serialize + Send + Sync + 'static,
{
    async fn publish(&self, event: E) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut data = serde_json::to_vec(&event)?;
        data.push(b'\n');
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_event() -> EventRecord {
        EventRecord::new(
            "tester",
            "unit.test",
            serde_json::json!({"value": 1}),
        )
    }

    #[tokio::test]
    async fn publishes_and_receives() {
        let bus: MemoryEventBus<EventRecord> = MemoryEventBus::new(16);
        let mut rx = bus.subscribe().await.unwrap();
        bus.publish(sample_event()).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "unit.test");
        assert!(event.id.starts_with("evt-"));
    }

    #[tokio::test]
    async fn backlog_is_bounded() {
        let bus: MemoryEventBus<u32> = MemoryEventBus::new(3);
        for value in 0..5 {
            bus.publish(value).await.unwrap();
        }
        assert_eq!(bus.snapshot(), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn lagging_receiver_does_not_block_publisher() {
        let bus: MemoryEventBus<u32> = MemoryEventBus::new(2);
        let mut rx = bus.subscribe().await.unwrap();
        for value in 0..10 {
            bus.publish(value).await.unwrap();
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(rx.recv().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn file_publisher_writes_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        let publisher = FileEventPublisher::new(&path).unwrap();
        publisher.publish(sample_event()).await.unwrap();
        publisher.publish(sample_event()).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("unit.test"));
    }
}
