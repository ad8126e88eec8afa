use super::{ActionOutcome, ActionProvider, ActionSource};
use crate::{
    game::{PlayerAction, PlayerId},
    instance::SessionRegistry,
    tournament::ActionRequest,
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Duration,
};
use tokio::sync::oneshot;

/// Called with every request a human has to answer, so the outside world
/// can prompt them.
pub type ActionNotifier = Arc<dyn Fn(&ActionRequest) + Send + Sync>;

struct PendingAction {
    request: ActionRequest,
    reply: oneshot::Sender<PlayerAction>,
}

/// Waits for human decisions.
///
/// A request stays pending until [`submit_action`](Self::submit_action)
/// answers it or `options.timeout_secs` passes, whichever happens first.
/// Taking the entry out of the pending map is what resolves it, so a late
/// submission racing the timer finds nothing and is ignored.
pub struct HumanActionProvider {
    pending: Mutex<HashMap<PlayerId, PendingAction>>,
    notifier: RwLock<Option<ActionNotifier>>,
    sessions: Arc<SessionRegistry>,
    /// Timeouts in a row after which a disconnected player is no longer
    /// waited for.
    disconnect_grace_turns: u32,
}

impl HumanActionProvider {
    pub fn new(sessions: Arc<SessionRegistry>, disconnect_grace_turns: u32) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            notifier: RwLock::new(None),
            sessions,
            disconnect_grace_turns,
        }
    }

    pub fn set_notifier(&self, notifier: ActionNotifier) {
        *self.notifier.write().unwrap_or_else(PoisonError::into_inner) = Some(notifier);
    }

    /// Answers the player's outstanding request.
    ///
    /// The action is checked against the options that were offered: an
    /// illegal type becomes a fold and bet or raise amounts are clamped.
    ///
    /// # Returns
    ///
    /// * `true` - The request was waiting and has been answered
    /// * `false` - Nothing was pending (never asked, already answered or
    ///   timed out)
    pub fn submit_action(&self, player_id: PlayerId, action: PlayerAction) -> bool {
        let Some(pending) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&player_id)
        else {
            return false;
        };
        let action = pending.request.options.validate(action);
        pending.reply.send(action).is_ok()
    }

    /// The request the player still has to answer, for resending after a
    /// reconnect.
    #[must_use]
    pub fn pending_request(&self, player_id: PlayerId) -> Option<ActionRequest> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player_id)
            .map(|p| p.request.clone())
    }

    #[must_use]
    pub fn has_pending(&self, player_id: PlayerId) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&player_id)
    }

    /// Withdraws every pending request; each waiter falls back to its
    /// default action.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        drained.len()
    }

    fn notify(&self, request: &ActionRequest) {
        let notifier = self
            .notifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(notify) = notifier {
            notify(request);
        }
    }

    fn should_skip(&self, player_id: PlayerId) -> bool {
        self.sessions.is_disconnected(player_id)
            && self.sessions.consecutive_timeouts(player_id) >= self.disconnect_grace_turns
    }
}

#[async_trait]
impl ActionProvider for HumanActionProvider {
    async fn get_action(&self, request: &ActionRequest) -> ActionOutcome {
        let player_id = request.player_id;
        let fallback = request.options.default_action();
        if self.should_skip(player_id) {
            return ActionOutcome::new(fallback, ActionSource::AutoResolved);
        }

        let (reply, mut answer) = oneshot::channel();
        // A stale entry for the same player is dropped, which releases its
        // waiter.
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                player_id,
                PendingAction {
                    request: request.clone(),
                    reply,
                },
            );
        self.notify(request);

        let outcome = if request.options.timeout_secs == 0 {
            Ok((&mut answer).await)
        } else {
            let limit = Duration::from_secs(request.options.timeout_secs);
            tokio::time::timeout(limit, &mut answer).await
        };

        match outcome {
            Ok(Ok(action)) => ActionOutcome::new(action, ActionSource::Player),
            Ok(Err(_)) => ActionOutcome::new(fallback, ActionSource::Cancelled),
            Err(_) => {
                let removed = self
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&player_id);
                if removed.is_some() {
                    log::info!("player {player_id} timed out, auto {fallback}");
                    return ActionOutcome::new(fallback, ActionSource::Timeout);
                }
                // A submission won the race with the timer.
                match answer.try_recv() {
                    Ok(action) => ActionOutcome::new(action, ActionSource::Player),
                    Err(_) => ActionOutcome::new(fallback, ActionSource::Cancelled),
                }
            }
        }
    }
}
