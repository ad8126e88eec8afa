//! Event log kept as one JSON-lines file per game.

use super::{
    EventError, EventResult,
    event::GameEvent,
    store::{EventStore, StoredEvent, check_game_id},
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};

const EXTENSION: &str = "jsonl";

/// Writes `<dir>/<game_id>.jsonl`, one [`StoredEvent`] per line. The last
/// sequence number of every log in the directory is read back on open, so
/// numbering carries on after a restart.
pub struct JsonFileEventStore {
    dir: PathBuf,
    sequences: Mutex<HashMap<String, u64>>,
}

impl JsonFileEventStore {
    pub async fn open(dir: impl AsRef<Path>) -> EventResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut sequences = HashMap::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(game_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let last = read_log(&path)
                .await?
                .last()
                .map_or(0, |e| e.sequence_number);
            sequences.insert(game_id.to_string(), last);
        }
        log::debug!(
            "opened event log directory {} with {} game(s)",
            dir.display(),
            sequences.len()
        );

        Ok(Self {
            dir,
            sequences: Mutex::new(sequences),
        })
    }

    fn path_for(&self, game_id: &str) -> EventResult<PathBuf> {
        check_game_id(game_id)?;
        if game_id
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        {
            return Err(EventError::InvalidGameId(game_id.to_string()));
        }
        Ok(self.dir.join(format!("{game_id}.{EXTENSION}")))
    }
}

async fn read_log(path: &Path) -> EventResult<Vec<StoredEvent>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(EventError::from))
        .collect()
}

#[async_trait]
impl EventStore for JsonFileEventStore {
    async fn append(&self, game_id: &str, event: &GameEvent) -> EventResult<StoredEvent> {
        let path = self.path_for(game_id)?;
        // Held across the write so two appends cannot take the same number.
        let mut sequences = self.sequences.lock().await;
        let next = sequences.get(game_id).copied().unwrap_or(0) + 1;
        let stored = StoredEvent::new(game_id, next, event.clone());

        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        sequences.insert(game_id.to_string(), next);
        Ok(stored)
    }

    async fn events(&self, game_id: &str) -> EventResult<Vec<StoredEvent>> {
        let path = self.path_for(game_id)?;
        let _guard = self.sequences.lock().await;
        read_log(&path).await
    }

    async fn events_since(&self, game_id: &str, sequence: u64) -> EventResult<Vec<StoredEvent>> {
        Ok(self
            .events(game_id)
            .await?
            .into_iter()
            .filter(|e| e.sequence_number > sequence)
            .collect())
    }

    async fn current_sequence(&self, game_id: &str) -> EventResult<u64> {
        self.path_for(game_id)?;
        Ok(self
            .sequences
            .lock()
            .await
            .get(game_id)
            .copied()
            .unwrap_or(0))
    }

    async fn clear(&self, game_id: &str) -> EventResult<()> {
        let path = self.path_for(game_id)?;
        let mut sequences = self.sequences.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        sequences.remove(game_id);
        Ok(())
    }
}
