//! Who is in a game and whether they are connected.

use crate::game::PlayerId;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerSession {
    pub profile_id: PlayerId,
    pub name: String,
    pub is_ai: bool,
    pub skill_level: u8,
    pub connected: bool,
    pub sitting_out: bool,
    /// Turns in a row this player let the clock run out.
    pub consecutive_timeouts: u32,
}

impl PlayerSession {
    pub fn human(profile_id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            profile_id,
            name: name.into(),
            is_ai: false,
            skill_level: 0,
            connected: true,
            sitting_out: false,
            consecutive_timeouts: 0,
        }
    }

    pub fn ai(profile_id: PlayerId, name: impl Into<String>, skill_level: u8) -> Self {
        Self {
            is_ai: true,
            skill_level,
            ..Self::human(profile_id, name)
        }
    }
}

/// Sessions of one game, in join order. Shared between the instance, the
/// director and the human action provider.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<Vec<PlayerSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session. Returns false when the profile already has one.
    pub fn add(&self, session: PlayerSession) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.iter().any(|s| s.profile_id == session.profile_id) {
            return false;
        }
        sessions.push(session);
        true
    }

    pub fn remove(&self, profile_id: PlayerId) -> Option<PlayerSession> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let index = sessions.iter().position(|s| s.profile_id == profile_id)?;
        Some(sessions.remove(index))
    }

    #[must_use]
    pub fn get(&self, profile_id: PlayerId) -> Option<PlayerSession> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.profile_id == profile_id)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, profile_id: PlayerId) -> bool {
        self.get(profile_id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn all(&self) -> Vec<PlayerSession> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn humans(&self) -> Vec<PlayerId> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| !s.is_ai)
            .map(|s| s.profile_id)
            .collect()
    }

    /// Applies `f` to the session, returning its result.
    pub fn update<T>(&self, profile_id: PlayerId, f: impl FnOnce(&mut PlayerSession) -> T) -> Option<T> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.iter_mut().find(|s| s.profile_id == profile_id).map(f)
    }

    pub fn set_connected(&self, profile_id: PlayerId, connected: bool) -> bool {
        self.update(profile_id, |s| {
            s.connected = connected;
            if connected {
                s.consecutive_timeouts = 0;
            }
        })
        .is_some()
    }

    #[must_use]
    pub fn is_disconnected(&self, profile_id: PlayerId) -> bool {
        self.get(profile_id).is_some_and(|s| !s.connected)
    }

    /// Counts a timeout. Returns the new streak length.
    pub fn record_timeout(&self, profile_id: PlayerId) -> u32 {
        self.update(profile_id, |s| {
            s.consecutive_timeouts += 1;
            s.consecutive_timeouts
        })
        .unwrap_or(0)
    }

    pub fn reset_timeouts(&self, profile_id: PlayerId) {
        self.update(profile_id, |s| s.consecutive_timeouts = 0);
    }

    #[must_use]
    pub fn consecutive_timeouts(&self, profile_id: PlayerId) -> u32 {
        self.get(profile_id).map_or(0, |s| s.consecutive_timeouts)
    }
}
