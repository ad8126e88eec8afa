use crate::{game::PlayerId, instance::SessionRegistry};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::sync::oneshot;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferKind {
    Rebuy,
    Addon,
}

/// Outstanding rebuy and add-on offers to human players. An offer that is
/// not answered in time, or is withdrawn, counts as declined.
///
/// Disconnected players follow the same grace rule as action requests:
/// once they have run out their grace turns they are declined without
/// waiting. Without a clock nothing would end the wait, so a disconnected
/// player is then declined straight away.
pub struct OfferBroker {
    pending: Mutex<HashMap<(PlayerId, OfferKind), oneshot::Sender<bool>>>,
    sessions: Arc<SessionRegistry>,
    disconnect_grace_turns: u32,
}

impl OfferBroker {
    pub fn new(sessions: Arc<SessionRegistry>, disconnect_grace_turns: u32) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            sessions,
            disconnect_grace_turns,
        }
    }

    /// Waits for the player's answer. A zero `timeout` waits indefinitely
    /// for a connected player.
    pub async fn offer(&self, player_id: PlayerId, kind: OfferKind, timeout: Duration) -> bool {
        if self.sessions.is_disconnected(player_id)
            && (timeout.is_zero()
                || self.sessions.consecutive_timeouts(player_id) >= self.disconnect_grace_turns)
        {
            log::info!("player {player_id} is away, {kind:?} offer declined");
            return false;
        }
        let (reply, answer) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((player_id, kind), reply);

        let accepted = if timeout.is_zero() {
            answer.await.unwrap_or(false)
        } else {
            matches!(tokio::time::timeout(timeout, answer).await, Ok(Ok(true)))
        };
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(player_id, kind));
        accepted
    }

    /// Answers an outstanding offer. Returns false when none was waiting.
    pub fn decide(&self, player_id: PlayerId, kind: OfferKind, accept: bool) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(player_id, kind))
            .is_some_and(|reply| reply.send(accept).is_ok())
    }

    #[must_use]
    pub fn is_pending(&self, player_id: PlayerId, kind: OfferKind) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(player_id, kind))
    }

    /// Declines the player's outstanding offers. Returns how many there
    /// were.
    pub fn withdraw(&self, player_id: PlayerId) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let before = pending.len();
        pending.retain(|(id, _), _| *id != player_id);
        before - pending.len()
    }

    /// Declines every outstanding offer.
    pub fn cancel_all(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
