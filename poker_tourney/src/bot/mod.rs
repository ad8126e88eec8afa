//! AI players.
//!
//! Skill level 1 plays [`SimpleStrategy`], a random legal move. Levels 2 to 7
//! map onto three presets played by [`BotDecisionMaker`]:
//!
//! ### Easy (Loose-Passive), skill 2-3
//! - VPIP: 45% (plays many hands)
//! - Aggression: 0.5 (passive)
//! - Never bluffs
//!
//! ### Standard (Balanced TAG), skill 4-5
//! - VPIP: 30% (moderate range)
//! - Aggression: 1.5 (moderately aggressive)
//! - Bluffs 15% of time
//!
//! ### TAG (Tight-Aggressive), skill 6-7
//! - VPIP: 20% (very tight)
//! - Aggression: 2.5 (very aggressive)
//! - Bluffs 25% of time

pub mod decision;
pub mod models;
pub mod strategy;

pub use decision::{BotDecisionConfig, BotDecisionMaker};
pub use models::{BotDifficulty, DifficultyParams};
pub use strategy::{AiStrategy, BotStrategy, SimpleStrategy, Strategy};
