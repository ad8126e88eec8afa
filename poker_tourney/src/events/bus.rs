use super::{
    EventResult,
    event::GameEvent,
    store::{EventStore, StoredEvent, check_game_id},
};
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, PoisonError, RwLock},
};
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 1024;

/// In-process subscriber to a game's events.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &StoredEvent);
}

impl<F> EventListener for F
where
    F: Fn(&StoredEvent) + Send + Sync,
{
    fn on_event(&self, event: &StoredEvent) {
        self(event);
    }
}

pub type BroadcastCallback = Box<dyn Fn(&StoredEvent) + Send + Sync>;

/// Persists a game's events, then fans them out.
///
/// `publish` appends to the store first. Only a stored event reaches
/// listeners, the broadcast callback and channel subscribers. A listener
/// that panics is logged and skipped.
pub struct EventBus {
    game_id: String,
    store: Arc<dyn EventStore>,
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
    broadcast_callback: RwLock<Option<BroadcastCallback>>,
    sender: broadcast::Sender<StoredEvent>,
}

impl EventBus {
    pub fn new(game_id: impl Into<String>, store: Arc<dyn EventStore>) -> EventResult<Self> {
        let game_id = game_id.into();
        check_game_id(&game_id)?;
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Ok(Self {
            game_id,
            store,
            listeners: RwLock::new(Vec::new()),
            broadcast_callback: RwLock::new(None),
            sender,
        })
    }

    #[must_use]
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn set_broadcast_callback(&self, callback: BroadcastCallback) {
        *self
            .broadcast_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    /// Live feed of published events. Receivers that fall behind see
    /// `RecvError::Lagged` and can catch up through the store.
    pub fn subscribe(&self) -> broadcast::Receiver<StoredEvent> {
        self.sender.subscribe()
    }

    pub async fn publish(&self, event: GameEvent) -> EventResult<StoredEvent> {
        let stored = self.store.append(&self.game_id, &event).await?;

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(&stored))).is_err() {
                log::warn!(
                    "listener failed on {} #{} for game {}",
                    stored.event_type,
                    stored.sequence_number,
                    self.game_id
                );
            }
        }

        {
            let callback = self
                .broadcast_callback
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(callback) = callback.as_ref()
                && catch_unwind(AssertUnwindSafe(|| callback(&stored))).is_err()
            {
                log::warn!("broadcast callback failed for game {}", self.game_id);
            }
        }

        // No subscribers is fine.
        let _ = self.sender.send(stored.clone());
        Ok(stored)
    }

    /// Publishes in order, stopping at the first storage failure.
    pub async fn publish_all(&self, events: Vec<GameEvent>) -> EventResult<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    pub async fn events_since(&self, sequence: u64) -> EventResult<Vec<StoredEvent>> {
        self.store.events_since(&self.game_id, sequence).await
    }

    pub async fn current_sequence(&self) -> EventResult<u64> {
        self.store.current_sequence(&self.game_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventError, InMemoryEventStore};
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    struct Faulty;

    impl EventListener for Faulty {
        fn on_event(&self, _event: &StoredEvent) {
            panic!("listener bug");
        }
    }

    fn bus() -> EventBus {
        EventBus::new("game", Arc::new(InMemoryEventStore::new())).unwrap()
    }

    #[tokio::test]
    async fn test_publish_persists_before_dispatch() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.add_listener(Arc::new(move |e: &StoredEvent| {
            sink.lock().unwrap().push(e.sequence_number);
        }));

        bus.publish(GameEvent::PlayerLeft { player_id: 1 }).await.unwrap();
        bus.publish(GameEvent::PlayerLeft { player_id: 2 }).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(bus.current_sequence().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_block_others() {
        let bus = bus();
        let delivered = Arc::new(AtomicUsize::new(0));
        let broadcast = Arc::new(AtomicUsize::new(0));

        bus.add_listener(Arc::new(Faulty));
        let counter = delivered.clone();
        bus.add_listener(Arc::new(move |_: &StoredEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = broadcast.clone();
        bus.set_broadcast_callback(Box::new(move |_: &StoredEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let stored = bus
            .publish(GameEvent::PlayerLeft { player_id: 1 })
            .await
            .unwrap();
        assert_eq!(stored.sequence_number, 1);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(broadcast.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_stored_events() {
        let bus = bus();
        let mut rx = bus.subscribe();
        bus.publish(GameEvent::GamePaused { by: 9 }).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, GameEvent::GamePaused { by: 9 });
        assert_eq!(received.sequence_number, 1);
    }

    #[test]
    fn test_blank_game_id_fails_fast() {
        let result = EventBus::new("", Arc::new(InMemoryEventStore::new()));
        assert!(matches!(result, Err(EventError::InvalidGameId(_))));
    }
}
