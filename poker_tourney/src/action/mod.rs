//! Where player decisions come from.
//!
//! The director never knows whether it is waiting on a bot or a person: it
//! hands an [`ActionRequest`] to an [`ActionProvider`] and gets back an
//! action the table can apply. AI seats answer straight away. Human seats
//! park the request until the player submits or the clock runs out.

pub mod ai;
pub mod human;
pub mod offer;

pub use ai::AiActionProvider;
pub use human::{ActionNotifier, HumanActionProvider};
pub use offer::{OfferBroker, OfferKind};

use crate::{game::PlayerAction, tournament::ActionRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How an action was arrived at.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionSource {
    /// An AI strategy decided.
    Strategy,
    /// The player submitted it.
    Player,
    /// The clock ran out.
    Timeout,
    /// The player is disconnected past their grace; no wait.
    AutoResolved,
    /// The request was withdrawn, e.g. by shutdown.
    Cancelled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActionOutcome {
    pub action: PlayerAction,
    pub source: ActionSource,
}

impl ActionOutcome {
    pub fn new(action: PlayerAction, source: ActionSource) -> Self {
        Self { action, source }
    }
}

#[async_trait]
pub trait ActionProvider: Send + Sync {
    /// Obtains a decision for `request.player_id`. Always returns; the
    /// action is one of `request.options`.
    async fn get_action(&self, request: &ActionRequest) -> ActionOutcome;
}

/// Routes each request by seat type: AI seats to the strategy provider,
/// human seats to the waiting provider.
pub struct ServerActionProvider {
    ai: Arc<AiActionProvider>,
    human: Arc<HumanActionProvider>,
}

impl ServerActionProvider {
    pub fn new(ai: Arc<AiActionProvider>, human: Arc<HumanActionProvider>) -> Self {
        Self { ai, human }
    }

    #[must_use]
    pub fn human(&self) -> &Arc<HumanActionProvider> {
        &self.human
    }
}

#[async_trait]
impl ActionProvider for ServerActionProvider {
    async fn get_action(&self, request: &ActionRequest) -> ActionOutcome {
        if request.is_human {
            self.human.get_action(request).await
        } else {
            self.ai.get_action(request).await
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        game::{ActionOptions, BettingRound, Card, PlayerId, Suit},
        tournament::ActionRequest,
    };

    pub fn request(player_id: PlayerId, is_human: bool, can_check: bool, timeout_secs: u64) -> ActionRequest {
        ActionRequest {
            table_id: 0,
            player_id,
            player_name: format!("p{player_id}"),
            is_human,
            skill_level: if is_human { 0 } else { 1 },
            options: ActionOptions {
                can_fold: true,
                can_check,
                can_call: !can_check,
                can_bet: can_check,
                can_raise: !can_check,
                amount_to_call: if can_check { 0 } else { 100 },
                min_bet: 100,
                max_bet: 5000,
                min_raise: 200,
                max_raise: 5000,
                timeout_secs,
            },
            hole_cards: Some([Card(14, Suit::Spade), Card(2, Suit::Club)]),
            board: Vec::new(),
            pot_size: 150,
            players_in_hand: 3,
            players_dealt: 3,
            round: BettingRound::PreFlop,
            position: 0,
            big_blind: 100,
            chips: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::request, *};
    use crate::{game::ActionType, instance::SessionRegistry};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_routes_by_seat_type() {
        let sessions = Arc::new(SessionRegistry::new());
        let human = Arc::new(HumanActionProvider::new(sessions, 2));
        let provider = ServerActionProvider::new(
            Arc::new(AiActionProvider::new(Duration::ZERO)),
            human.clone(),
        );

        let ai = provider.get_action(&request(-1, false, true, 0)).await;
        assert_eq!(ai.source, ActionSource::Strategy);

        let timed_out = provider.get_action(&request(5, true, true, 3)).await;
        assert_eq!(timed_out.source, ActionSource::Timeout);
        assert_eq!(timed_out.action.action_type, ActionType::Check);
    }
}
