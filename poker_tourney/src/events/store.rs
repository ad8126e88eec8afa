//! Append-only event log contract and the in-memory implementation.

use super::{EventError, EventResult, event::GameEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One record of a game's event log.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct StoredEvent {
    pub game_id: String,
    /// Starts at 1 and increases by exactly one per append.
    pub sequence_number: u64,
    pub event_type: String,
    pub event: GameEvent,
    pub timestamp: DateTime<Utc>,
}

impl StoredEvent {
    pub fn new(game_id: &str, sequence_number: u64, event: GameEvent) -> Self {
        Self {
            game_id: game_id.to_string(),
            sequence_number,
            event_type: event.event_type().to_string(),
            event,
            timestamp: Utc::now(),
        }
    }
}

/// Durable, per-game ordered log of events.
///
/// Sequence numbers are gapless and strictly increasing per game id. The
/// log is never rewritten; [`EventStore::clear`] exists for tests and
/// administration and restarts numbering at 1.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `event` and returns the stored record with its sequence
    /// number.
    async fn append(&self, game_id: &str, event: &GameEvent) -> EventResult<StoredEvent>;

    async fn events(&self, game_id: &str) -> EventResult<Vec<StoredEvent>>;

    /// Events with a sequence number strictly greater than `sequence`.
    async fn events_since(&self, game_id: &str, sequence: u64) -> EventResult<Vec<StoredEvent>>;

    /// Sequence number of the last appended event, 0 for an empty log.
    async fn current_sequence(&self, game_id: &str) -> EventResult<u64>;

    async fn clear(&self, game_id: &str) -> EventResult<()>;
}

/// Rejects ids that cannot key a log.
pub(crate) fn check_game_id(game_id: &str) -> EventResult<()> {
    if game_id.trim().is_empty() {
        return Err(EventError::InvalidGameId(game_id.to_string()));
    }
    Ok(())
}

#[derive(Default)]
pub struct InMemoryEventStore {
    logs: RwLock<HashMap<String, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, game_id: &str, event: &GameEvent) -> EventResult<StoredEvent> {
        check_game_id(game_id)?;
        let mut logs = self.logs.write().await;
        let log = logs.entry(game_id.to_string()).or_default();
        let stored = StoredEvent::new(game_id, log.len() as u64 + 1, event.clone());
        log.push(stored.clone());
        Ok(stored)
    }

    async fn events(&self, game_id: &str) -> EventResult<Vec<StoredEvent>> {
        check_game_id(game_id)?;
        Ok(self
            .logs
            .read()
            .await
            .get(game_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn events_since(&self, game_id: &str, sequence: u64) -> EventResult<Vec<StoredEvent>> {
        check_game_id(game_id)?;
        let logs = self.logs.read().await;
        let Some(log) = logs.get(game_id) else {
            return Ok(Vec::new());
        };
        // Sequence n lives at index n - 1.
        let start = usize::try_from(sequence).unwrap_or(usize::MAX).min(log.len());
        Ok(log[start..].to_vec())
    }

    async fn current_sequence(&self, game_id: &str) -> EventResult<u64> {
        check_game_id(game_id)?;
        Ok(self
            .logs
            .read()
            .await
            .get(game_id)
            .map_or(0, |log| log.len() as u64))
    }

    async fn clear(&self, game_id: &str) -> EventResult<()> {
        check_game_id(game_id)?;
        self.logs.write().await.remove(game_id);
        Ok(())
    }
}
