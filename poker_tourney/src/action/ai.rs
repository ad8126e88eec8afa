use super::{ActionOutcome, ActionProvider, ActionSource};
use crate::{
    bot::{AiStrategy, Strategy},
    game::PlayerId,
    tournament::ActionRequest,
};
use async_trait::async_trait;
use rand::Rng;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

/// Answers for AI seats. Each seat keeps its own strategy, built from its
/// skill level the first time it is asked.
pub struct AiActionProvider {
    strategies: Mutex<HashMap<PlayerId, AiStrategy>>,
    /// Mean thinking time; zero answers immediately.
    delay: Duration,
    seed: Option<u64>,
}

impl AiActionProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            strategies: Mutex::new(HashMap::new()),
            delay,
            seed: None,
        }
    }

    /// Reproducible strategies: each seat's generator is derived from
    /// `seed` and its player id.
    pub fn seeded(delay: Duration, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::new(delay)
        }
    }

    fn decide(&self, request: &ActionRequest) -> crate::game::PlayerAction {
        let mut strategies = self.strategies.lock().unwrap_or_else(PoisonError::into_inner);
        let strategy = strategies
            .entry(request.player_id)
            .or_insert_with(|| match self.seed {
                Some(seed) => AiStrategy::seeded(request.skill_level, seed ^ request.player_id as u64),
                None => AiStrategy::for_skill(request.skill_level),
            });
        strategy.decide(request)
    }

    /// Whether the AI seat takes an offered rebuy or add-on.
    pub fn accept_offer(&self, player_id: PlayerId, skill_level: u8) -> bool {
        let mut strategies = self.strategies.lock().unwrap_or_else(PoisonError::into_inner);
        strategies
            .entry(player_id)
            .or_insert_with(|| AiStrategy::for_skill(skill_level))
            .accept_offer()
    }

    /// Somewhere between half and twice the configured delay.
    fn thinking_time(&self) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }
        let millis = self.delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(millis / 2..=millis * 2))
    }
}

#[async_trait]
impl ActionProvider for AiActionProvider {
    async fn get_action(&self, request: &ActionRequest) -> ActionOutcome {
        let pause = self.thinking_time();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        let action = self.decide(request);
        ActionOutcome::new(request.options.validate(action), ActionSource::Strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::test_support::request;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_answers_with_legal_action() {
        let provider = AiActionProvider::seeded(Duration::ZERO, 42);
        for can_check in [true, false] {
            let req = request(-3, false, can_check, 0);
            for _ in 0..50 {
                let outcome = provider.get_action(&req).await;
                assert_eq!(outcome.source, ActionSource::Strategy);
                assert!(req.options.allows(outcome.action.action_type));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_thinking_time_within_bounds() {
        let provider = AiActionProvider::new(Duration::from_millis(400));
        let req = request(-1, false, true, 0);
        for _ in 0..10 {
            let start = Instant::now();
            provider.get_action(&req).await;
            let took = start.elapsed();
            assert!(took >= Duration::from_millis(200), "{took:?}");
            assert!(took <= Duration::from_millis(801), "{took:?}");
        }
    }

    #[test]
    fn test_ai_accepts_offers() {
        let provider = AiActionProvider::new(Duration::ZERO);
        assert!(provider.accept_offer(-1, 1));
        assert!(provider.accept_offer(-2, 6));
    }
}
