//! AI strategies, dispatched statically over the skill range.

use super::{
    decision::BotDecisionMaker,
    models::{BotDifficulty, DifficultyParams},
};
use crate::{
    game::{ActionOptions, ActionType, Chips, PlayerAction},
    tournament::ActionRequest,
};
use enum_dispatch::enum_dispatch;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Something that picks a poker action for an AI seat.
#[enum_dispatch]
pub trait Strategy {
    /// Choose an action. The result is always one `request.options` allows.
    fn decide(&mut self, request: &ActionRequest) -> PlayerAction;

    /// Whether to take an offered rebuy or add-on.
    fn accept_offer(&mut self) -> bool {
        true
    }
}

/// Skill level 1: picks uniformly among the legal actions and sizes bets in
/// the lower half of the allowed range.
pub struct SimpleStrategy {
    rng: StdRng,
}

impl SimpleStrategy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn lower_half(&mut self, min: Chips, max: Chips) -> Chips {
        if max <= min {
            return max;
        }
        let mid = min + (max - min) / 2;
        self.rng.random_range(min..=mid)
    }
}

impl Default for SimpleStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for SimpleStrategy {
    fn decide(&mut self, request: &ActionRequest) -> PlayerAction {
        let options = &request.options;
        let legal: Vec<ActionType> = [
            ActionType::Fold,
            ActionType::Check,
            ActionType::Call,
            ActionType::Bet,
            ActionType::Raise,
        ]
        .into_iter()
        .filter(|a| options.allows(*a))
        .collect();
        if legal.is_empty() {
            return options.default_action();
        }
        match legal[self.rng.random_range(0..legal.len())] {
            ActionType::Check => PlayerAction::check(),
            ActionType::Call => PlayerAction::call(),
            ActionType::Bet => PlayerAction::bet(self.lower_half(options.min_bet, options.max_bet)),
            ActionType::Raise => {
                PlayerAction::raise(self.lower_half(options.min_raise, options.max_raise))
            }
            _ => PlayerAction::fold(),
        }
    }
}

/// Skill levels 2 to 7: the difficulty-preset decision maker.
pub struct BotStrategy {
    params: DifficultyParams,
    maker: BotDecisionMaker,
}

impl BotStrategy {
    pub fn new(difficulty: BotDifficulty) -> Self {
        Self {
            params: DifficultyParams::from_difficulty(difficulty),
            maker: BotDecisionMaker::new(),
        }
    }

    pub fn seeded(difficulty: BotDifficulty, seed: u64) -> Self {
        Self {
            params: DifficultyParams::from_difficulty(difficulty),
            maker: BotDecisionMaker::seeded(seed),
        }
    }

    #[must_use]
    pub fn params(&self) -> &DifficultyParams {
        &self.params
    }
}

impl Strategy for BotStrategy {
    fn decide(&mut self, request: &ActionRequest) -> PlayerAction {
        let action = self.maker.decide_action(&self.params, request);
        sanitize(&request.options, action)
    }
}

#[enum_dispatch(Strategy)]
pub enum AiStrategy {
    SimpleStrategy,
    BotStrategy,
}

impl AiStrategy {
    /// Strategy for an AI of the given skill level (1..=7).
    pub fn for_skill(skill_level: u8) -> Self {
        match BotDifficulty::from_skill_level(skill_level) {
            Some(difficulty) => BotStrategy::new(difficulty).into(),
            None => SimpleStrategy::new().into(),
        }
    }

    pub fn seeded(skill_level: u8, seed: u64) -> Self {
        match BotDifficulty::from_skill_level(skill_level) {
            Some(difficulty) => BotStrategy::seeded(difficulty, seed).into(),
            None => SimpleStrategy::seeded(seed).into(),
        }
    }
}

/// Never let a heuristic produce an illegal move.
fn sanitize(options: &ActionOptions, action: PlayerAction) -> PlayerAction {
    if options.allows(action.action_type) {
        options.validate(action)
    } else if action.action_type == ActionType::Fold && options.can_check {
        PlayerAction::check()
    } else if options.can_call {
        PlayerAction::call()
    } else {
        options.default_action()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{BettingRound, Card, Suit};

    fn request(options: ActionOptions) -> ActionRequest {
        ActionRequest {
            table_id: 0,
            player_id: -1,
            player_name: "AI 1".to_string(),
            is_human: false,
            skill_level: 1,
            options,
            hole_cards: Some([Card(10, Suit::Heart), Card(11, Suit::Heart)]),
            board: Vec::new(),
            pot_size: 30,
            players_in_hand: 3,
            players_dealt: 3,
            round: BettingRound::PreFlop,
            position: 1,
            big_blind: 20,
            chips: 500,
        }
    }

    fn facing_bet() -> ActionOptions {
        ActionOptions {
            can_fold: true,
            can_check: false,
            can_call: true,
            can_bet: false,
            can_raise: true,
            amount_to_call: 20,
            min_bet: 0,
            max_bet: 0,
            min_raise: 40,
            max_raise: 500,
            timeout_secs: 0,
        }
    }

    #[test]
    fn test_simple_strategy_picks_legal_actions() {
        let mut strategy = SimpleStrategy::seeded(9);
        let req = request(facing_bet());
        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            let action = strategy.decide(&req);
            assert!(req.options.allows(action.action_type));
            if action.action_type == ActionType::Raise {
                // Lower half of 40..=500.
                assert!((40..=270).contains(&action.amount), "{}", action.amount);
            }
            seen.insert(action.action_type);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_simple_strategy_all_in_only() {
        let mut strategy = SimpleStrategy::seeded(10);
        let mut options = facing_bet();
        options.min_raise = 600;
        options.max_raise = 500;
        let req = request(options);
        for _ in 0..50 {
            let action = strategy.decide(&req);
            if action.action_type == ActionType::Raise {
                assert_eq!(action.amount, 500);
            }
        }
    }

    #[test]
    fn test_skill_selects_strategy() {
        assert!(matches!(AiStrategy::for_skill(1), AiStrategy::SimpleStrategy(_)));
        assert!(matches!(AiStrategy::for_skill(4), AiStrategy::BotStrategy(_)));
        match AiStrategy::seeded(7, 1) {
            AiStrategy::BotStrategy(bot) => assert_eq!(bot.params(), &DifficultyParams::tag()),
            AiStrategy::SimpleStrategy(_) => panic!("skill 7 should use a preset"),
        }
    }

    #[test]
    fn test_ai_accepts_offers() {
        let mut strategy = AiStrategy::seeded(3, 2);
        assert!(strategy.accept_offer());
    }

    #[test]
    fn test_bot_strategy_output_is_legal() {
        let mut strategy = AiStrategy::seeded(5, 11);
        let req = request(facing_bet());
        for _ in 0..200 {
            let action = strategy.decide(&req);
            assert!(req.options.allows(action.action_type));
        }
    }
}
