//! PostgreSQL-backed event log.

use super::{
    EventResult,
    event::GameEvent,
    store::{EventStore, StoredEvent, check_game_id},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

/// Schema for the `game_events` table. Applied by [`PgEventStore::ensure_schema`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS game_events (
    id BIGSERIAL PRIMARY KEY,
    game_id TEXT NOT NULL,
    sequence_number BIGINT NOT NULL,
    event_type TEXT NOT NULL,
    event_data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (game_id, sequence_number)
)
"#;

/// Event log in the `game_events` table. The highest sequence number of
/// every game is loaded when the store is built, so numbering carries on
/// across restarts.
pub struct PgEventStore {
    pool: Arc<PgPool>,
    sequences: Mutex<HashMap<String, u64>>,
}

impl PgEventStore {
    /// Builds the store and loads the current sequence number of every game.
    ///
    /// # Arguments
    ///
    /// * `pool` - Connection pool shared with the rest of the server
    ///
    /// # Returns
    ///
    /// * `EventResult<PgEventStore>` - The store, or the database error
    pub async fn new(pool: Arc<PgPool>) -> EventResult<Self> {
        let rows = sqlx::query(
            "SELECT game_id, MAX(sequence_number) AS last FROM game_events GROUP BY game_id",
        )
        .fetch_all(pool.as_ref())
        .await?;

        let mut sequences = HashMap::with_capacity(rows.len());
        for row in rows {
            let game_id: String = row.try_get("game_id")?;
            let last: i64 = row.try_get("last")?;
            sequences.insert(game_id, u64::try_from(last).unwrap_or(0));
        }
        log::info!("event store loaded sequence numbers for {} game(s)", sequences.len());

        Ok(Self {
            pool,
            sequences: Mutex::new(sequences),
        })
    }

    /// Creates the `game_events` table if it is missing.
    pub async fn ensure_schema(pool: &PgPool) -> EventResult<()> {
        sqlx::query(SCHEMA).execute(pool).await?;
        Ok(())
    }
}

fn stored_from_row(row: &PgRow) -> EventResult<StoredEvent> {
    let sequence: i64 = row.try_get("sequence_number")?;
    let Json(event): Json<GameEvent> = row.try_get("event_data")?;
    let timestamp: DateTime<Utc> = row.try_get("created_at")?;
    Ok(StoredEvent {
        game_id: row.try_get("game_id")?,
        sequence_number: u64::try_from(sequence).unwrap_or(0),
        event_type: row.try_get("event_type")?,
        event,
        timestamp,
    })
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, game_id: &str, event: &GameEvent) -> EventResult<StoredEvent> {
        check_game_id(game_id)?;
        let mut sequences = self.sequences.lock().await;
        let next = sequences.get(game_id).copied().unwrap_or(0) + 1;
        let stored = StoredEvent::new(game_id, next, event.clone());

        sqlx::query(
            r#"
            INSERT INTO game_events (game_id, sequence_number, event_type, event_data, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(game_id)
        .bind(next as i64)
        .bind(&stored.event_type)
        .bind(Json(&stored.event))
        .bind(stored.timestamp)
        .execute(self.pool.as_ref())
        .await?;

        sequences.insert(game_id.to_string(), next);
        Ok(stored)
    }

    async fn events(&self, game_id: &str) -> EventResult<Vec<StoredEvent>> {
        self.events_since(game_id, 0).await
    }

    async fn events_since(&self, game_id: &str, sequence: u64) -> EventResult<Vec<StoredEvent>> {
        check_game_id(game_id)?;
        let rows = sqlx::query(
            r#"
            SELECT game_id, sequence_number, event_type, event_data, created_at
            FROM game_events
            WHERE game_id = $1 AND sequence_number > $2
            ORDER BY sequence_number
            "#,
        )
        .bind(game_id)
        .bind(i64::try_from(sequence).unwrap_or(i64::MAX))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(stored_from_row).collect()
    }

    async fn current_sequence(&self, game_id: &str) -> EventResult<u64> {
        check_game_id(game_id)?;
        Ok(self
            .sequences
            .lock()
            .await
            .get(game_id)
            .copied()
            .unwrap_or(0))
    }

    async fn clear(&self, game_id: &str) -> EventResult<()> {
        check_game_id(game_id)?;
        let mut sequences = self.sequences.lock().await;
        sqlx::query("DELETE FROM game_events WHERE game_id = $1")
            .bind(game_id)
            .execute(self.pool.as_ref())
            .await?;
        sequences.remove(game_id);
        Ok(())
    }
}
