//! Event bus and the append-only event log behind it.

pub mod bus;
pub mod event;
pub mod file_store;
pub mod pg_store;
pub mod store;

pub use bus::{BroadcastCallback, EventBus, EventListener};
pub use event::{GameEvent, RevealedHand};
pub use file_store::JsonFileEventStore;
pub use pg_store::PgEventStore;
pub use store::{EventStore, InMemoryEventStore, StoredEvent};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid game id: {0:?}")]
    InvalidGameId(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EventResult<T> = Result<T, EventError>;
