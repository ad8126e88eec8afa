//! Bot decision-making logic with difficulty-based behavior.

use super::models::DifficultyParams;
use crate::{
    game::{Card, Chips, HandCategory, PlayerAction, evaluate},
    tournament::ActionRequest,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Base strength per hand category, weakest first.
const CATEGORY_STRENGTH: [f32; 10] = [
    0.10, // high card
    0.25, // pair
    0.40, // two pair
    0.55, // trips
    0.70, // straight
    0.75, // flush
    0.85, // full house
    0.95, // quads
    0.99, // straight flush
    0.99, // royal flush
];

/// Thresholds and multipliers for bot decisions.
///
/// All threshold values are hand strength floats in range [0.0, 1.0].
/// Higher threshold = more conservative (tighter play).
#[derive(Debug, Clone)]
pub struct BotDecisionConfig {
    /// Hand strength below this folds (easy bots).
    pub easy_fold_threshold: f32,
    /// Hand strength above this raises (easy bots).
    pub easy_raise_threshold: f32,
    pub standard_fold_threshold: f32,
    pub standard_raise_threshold: f32,
    pub tag_fold_threshold: f32,
    pub tag_raise_threshold: f32,

    /// Bluff size as a multiple of the pot.
    pub bluff_size_multiplier: f32,

    /// Pot odds above this add `pot_odds_bonus_value` to the call chance.
    pub pot_odds_bonus_threshold: f32,
    pub pot_odds_bonus_value: f32,

    /// call chance = base + aggression / divisor (+ pot odds bonus)
    pub base_call_probability: f32,
    pub call_aggression_divisor: f32,

    /// raise chance = base + aggression / divisor
    pub base_raise_probability: f32,
    pub raise_aggression_divisor: f32,

    /// Raise size in pots for passive, moderate and aggressive bots.
    pub passive_raise_multiplier: f32,
    pub moderate_raise_multiplier: f32,
    pub aggressive_raise_multiplier: f32,
    /// Raise sizes vary randomly by this fraction either way.
    pub raise_variance: f32,

    pub late_position_bonus: f32,
    pub middle_position_bonus: f32,
    pub early_middle_position_penalty: f32,
    pub utg_position_penalty: f32,
}

impl Default for BotDecisionConfig {
    fn default() -> Self {
        Self {
            easy_fold_threshold: 0.08,
            easy_raise_threshold: 0.20,
            standard_fold_threshold: 0.12,
            standard_raise_threshold: 0.28,
            tag_fold_threshold: 0.18,
            tag_raise_threshold: 0.33,
            bluff_size_multiplier: 1.5,
            pot_odds_bonus_threshold: 0.25,
            pot_odds_bonus_value: 0.2,
            base_call_probability: 0.3,
            call_aggression_divisor: 5.0,
            base_raise_probability: 0.4,
            raise_aggression_divisor: 4.0,
            passive_raise_multiplier: 2.0,
            moderate_raise_multiplier: 2.5,
            aggressive_raise_multiplier: 3.0,
            raise_variance: 0.2,
            late_position_bonus: 0.08,
            middle_position_bonus: 0.04,
            early_middle_position_penalty: -0.03,
            utg_position_penalty: -0.05,
        }
    }
}

/// Bot decision maker
pub struct BotDecisionMaker {
    rng: StdRng,
    config: BotDecisionConfig,
}

impl BotDecisionMaker {
    pub fn new() -> Self {
        Self::with_config(BotDecisionConfig::default())
    }

    pub fn with_config(config: BotDecisionConfig) -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
            config,
        }
    }

    /// Seeded decision maker, for reproducible games and tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config: BotDecisionConfig::default(),
        }
    }

    /// Decide an action for the request, given the bot's difficulty.
    ///
    /// # Arguments
    ///
    /// * `params` - Difficulty parameters
    /// * `request` - The table's question, with the bot's own cards
    ///
    /// # Returns
    ///
    /// * `PlayerAction` - An action within `request.options`
    pub fn decide_action(&mut self, params: &DifficultyParams, request: &ActionRequest) -> PlayerAction {
        let options = &request.options;
        let hole: Vec<Card> = request.hole_cards.map(|c| c.to_vec()).unwrap_or_default();

        let mut hand_strength = self.estimate_hand_strength(&hole, &request.board);
        let position_modifier =
            self.calculate_position_modifier(request.position, request.players_dealt);
        hand_strength = (hand_strength + position_modifier).clamp(0.0, 1.0);

        let can_check = options.can_check;
        let to_call = options.amount_to_call;

        // Calling takes the whole stack anyway.
        if !can_check && request.chips <= to_call {
            return if hand_strength >= 0.25 {
                PlayerAction::call()
            } else {
                PlayerAction::fold()
            };
        }

        let pot_odds = if to_call > 0 && !can_check {
            self.calculate_pot_odds(request.pot_size, to_call)
        } else {
            0.0
        };

        let (fold_threshold, raise_threshold) = match params.vpip {
            v if v > 0.40 => (
                self.config.easy_fold_threshold,
                self.config.easy_raise_threshold,
            ),
            v if v > 0.25 => (
                self.config.standard_fold_threshold,
                self.config.standard_raise_threshold,
            ),
            _ => (
                self.config.tag_fold_threshold,
                self.config.tag_raise_threshold,
            ),
        };

        if hand_strength < fold_threshold {
            if can_check {
                return PlayerAction::check();
            }
            if params.bluffs && self.rng.random_bool(f64::from(params.bluff_frequency)) {
                let bluff = (request.pot_size as f32 * self.config.bluff_size_multiplier) as Chips;
                return self.aggressive_action(request, bluff);
            }
            return PlayerAction::fold();
        }

        if hand_strength < raise_threshold {
            if can_check {
                return PlayerAction::check();
            }
            let pot_odds_bonus = if pot_odds > self.config.pot_odds_bonus_threshold {
                self.config.pot_odds_bonus_value
            } else {
                0.0
            };
            let call_probability = self.config.base_call_probability
                + (params.aggression_factor / self.config.call_aggression_divisor)
                + pot_odds_bonus;
            if self.rng.random_bool(f64::from(call_probability.min(1.0))) {
                return PlayerAction::call();
            }
            return PlayerAction::fold();
        }

        let raise_probability = self.config.base_raise_probability
            + (params.aggression_factor / self.config.raise_aggression_divisor);
        if self.rng.random_bool(f64::from(raise_probability.min(1.0))) {
            let amount = self.calculate_raise_amount(params, request.pot_size, to_call);
            self.aggressive_action(request, amount)
        } else if can_check {
            // Slow-play
            PlayerAction::check()
        } else {
            PlayerAction::call()
        }
    }

    /// Bet or raise by roughly `size` chips on top of any call, clamped to
    /// what the table allows.
    fn aggressive_action(&self, request: &ActionRequest, size: Chips) -> PlayerAction {
        let options = &request.options;
        if options.can_bet {
            let target = size.max(options.min_bet).min(options.max_bet);
            PlayerAction::bet(target)
        } else if options.can_raise {
            let already_in = options.min_raise.saturating_sub(request.big_blind.max(1));
            let target = (already_in + size)
                .max(options.min_raise)
                .min(options.max_raise);
            PlayerAction::raise(target)
        } else if options.can_call {
            PlayerAction::call()
        } else {
            options.default_action()
        }
    }

    fn calculate_raise_amount(&mut self, params: &DifficultyParams, pot_size: Chips, to_call: Chips) -> Chips {
        let base_multiplier = match params.aggression_factor {
            x if x < 1.0 => self.config.passive_raise_multiplier,
            x if x < 2.0 => self.config.moderate_raise_multiplier,
            _ => self.config.aggressive_raise_multiplier,
        };
        let variance = self
            .rng
            .random_range(-self.config.raise_variance..=self.config.raise_variance);
        let multiplier = base_multiplier * (1.0 + variance);
        ((pot_size + to_call) as f32 * multiplier / 2.0) as Chips
    }

    /// Pot odds as pot / (pot + call), e.g. 0.67 for a 100 pot and 50 to call.
    fn calculate_pot_odds(&self, pot_size: Chips, call_amount: Chips) -> f32 {
        if call_amount == 0 {
            return 1.0;
        }
        let total_pot = pot_size + call_amount;
        pot_size as f32 / total_pot as f32
    }

    /// Late position (the button is position 0) plays slightly weaker hands.
    fn calculate_position_modifier(&self, position: usize, players: usize) -> f32 {
        if players <= 2 {
            return 0.0;
        }
        let relative_pos = position as f32 / players as f32;
        match relative_pos {
            x if x < 0.2 => self.config.late_position_bonus,
            x if x < 0.4 => self.config.middle_position_bonus,
            x if x < 0.6 => 0.0,
            x if x < 0.8 => self.config.early_middle_position_penalty,
            _ => self.config.utg_position_penalty,
        }
    }

    /// Rough strength in [0.0, 1.0]: the made hand's category plus a small
    /// bonus for its top card.
    pub fn estimate_hand_strength(&self, hole_cards: &[Card], board_cards: &[Card]) -> f32 {
        if hole_cards.len() + board_cards.len() < 2 {
            return 0.0;
        }
        let score = evaluate(hole_cards, board_cards);
        let category = score.category();
        let base = CATEGORY_STRENGTH[category as usize - 1];
        let kicker_bonus = if category == HandCategory::HighCard {
            // Unpaired hole cards: both cards matter.
            let sum: u32 = hole_cards.iter().map(|c| u32::from(c.value())).sum();
            (sum as f32 / 28.0) * 0.1
        } else {
            (f32::from(score.top_value()) / 14.0) * 0.1
        };
        (base + kicker_bonus).min(1.0)
    }
}

impl Default for BotDecisionMaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{ActionOptions, ActionType, BettingRound, Suit};

    fn request(hole: [Card; 2], position: usize, can_check: bool) -> ActionRequest {
        ActionRequest {
            table_id: 0,
            player_id: 1,
            player_name: "bot".to_string(),
            is_human: false,
            skill_level: 4,
            options: ActionOptions {
                can_fold: true,
                can_check,
                can_call: !can_check,
                can_bet: can_check,
                can_raise: !can_check,
                amount_to_call: if can_check { 0 } else { 20 },
                min_bet: 20,
                max_bet: 1000,
                min_raise: 40,
                max_raise: 1000,
                timeout_secs: 0,
            },
            hole_cards: Some(hole),
            board: Vec::new(),
            pot_size: 100,
            players_in_hand: 6,
            players_dealt: 6,
            round: BettingRound::PreFlop,
            position,
            big_blind: 20,
            chips: 1000,
        }
    }

    fn count<F: Fn(&PlayerAction) -> bool>(
        maker: &mut BotDecisionMaker,
        params: &DifficultyParams,
        req: &ActionRequest,
        trials: usize,
        pred: F,
    ) -> usize {
        (0..trials)
            .filter(|_| pred(&maker.decide_action(params, req)))
            .count()
    }

    fn is_aggressive(action: &PlayerAction) -> bool {
        matches!(action.action_type, ActionType::Bet | ActionType::Raise)
    }

    #[test]
    fn test_easy_bot_is_passive() {
        let mut maker = BotDecisionMaker::seeded(1);
        let req = request([Card(14, Suit::Spade), Card(14, Suit::Heart)], 0, false);
        let raises = count(&mut maker, &DifficultyParams::easy(), &req, 100, is_aggressive);
        assert!(raises < 70, "easy bot raised {raises}/100 with aces");
    }

    #[test]
    fn test_tag_bot_is_aggressive() {
        let mut maker = BotDecisionMaker::seeded(2);
        let req = request([Card(13, Suit::Spade), Card(13, Suit::Heart)], 0, false);
        let raises = count(&mut maker, &DifficultyParams::tag(), &req, 100, is_aggressive);
        assert!(raises > 70, "tag bot raised {raises}/100 with kings");
    }

    #[test]
    fn test_tag_bot_folds_weak_hands() {
        let mut maker = BotDecisionMaker::seeded(3);
        let req = request([Card(7, Suit::Club), Card(2, Suit::Diamond)], 5, false);
        let folds = count(&mut maker, &DifficultyParams::tag(), &req, 500, |a| {
            a.action_type == ActionType::Fold
        });
        assert!(folds > 300, "tag bot folded {folds}/500 with 7-2 offsuit");
    }

    #[test]
    fn test_never_folds_when_checking_is_free() {
        let mut maker = BotDecisionMaker::seeded(4);
        let req = request([Card(7, Suit::Club), Card(2, Suit::Diamond)], 5, true);
        let folds = count(&mut maker, &DifficultyParams::tag(), &req, 200, |a| {
            a.action_type == ActionType::Fold
        });
        assert_eq!(folds, 0);
    }

    #[test]
    fn test_actions_stay_within_options() {
        let mut maker = BotDecisionMaker::seeded(5);
        for hole in [
            [Card(14, Suit::Spade), Card(14, Suit::Heart)],
            [Card(9, Suit::Spade), Card(8, Suit::Spade)],
        ] {
            for can_check in [true, false] {
                let req = request(hole, 2, can_check);
                for _ in 0..200 {
                    let action = maker.decide_action(&DifficultyParams::tag(), &req);
                    assert!(req.options.allows(action.action_type), "{action:?}");
                    if action.action_type == ActionType::Raise {
                        assert!(action.amount >= req.options.min_raise);
                        assert!(action.amount <= req.options.max_raise);
                    }
                    if action.action_type == ActionType::Bet {
                        assert!(action.amount >= req.options.min_bet);
                    }
                }
            }
        }
    }

    #[test]
    fn test_pot_odds_calculation() {
        let maker = BotDecisionMaker::seeded(6);
        assert!((maker.calculate_pot_odds(100, 20) - 0.833).abs() < 0.01);
        assert!((maker.calculate_pot_odds(100, 50) - 0.667).abs() < 0.01);
        assert!((maker.calculate_pot_odds(50, 100) - 0.333).abs() < 0.01);
        assert_eq!(maker.calculate_pot_odds(100, 0), 1.0);
    }

    #[test]
    fn test_hand_strength_orders_categories() {
        let maker = BotDecisionMaker::seeded(7);
        let pair = maker.estimate_hand_strength(&[Card(9, Suit::Club), Card(9, Suit::Heart)], &[]);
        let high = maker.estimate_hand_strength(&[Card(14, Suit::Club), Card(13, Suit::Heart)], &[]);
        let trips = maker.estimate_hand_strength(
            &[Card(9, Suit::Club), Card(9, Suit::Heart)],
            &[Card(9, Suit::Spade), Card(2, Suit::Diamond), Card(5, Suit::Club)],
        );
        assert!(pair > high);
        assert!(trips > pair);
        assert_eq!(maker.estimate_hand_strength(&[], &[]), 0.0);
    }
}
