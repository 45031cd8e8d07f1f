//! Game evaluators. Each module owns one game's hand state, dealing,
//! interactive moves, and outcome ranking; none of them touch the
//! ledger or the session store.

pub mod blackjack;
pub mod chinchiro;
pub mod poker;
pub mod slot;

use serde::{Deserialize, Serialize};

pub use blackjack::BlackjackOutcome;
pub use chinchiro::ChinchiroOutcome;
pub use poker::PokerRank;
pub use slot::SlotOutcome;

/// Terminal outcome of any game, carried on a resolved session until
/// settlement completes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", content = "outcome", rename_all = "snake_case")]
pub enum GameOutcome {
    Blackjack(BlackjackOutcome),
    Chinchiro(ChinchiroOutcome),
    Poker(PokerRank),
    Slot(SlotOutcome),
}

impl GameOutcome {
    /// Base payout multiplier, before any bonus amplification.
    pub fn multiplier(&self) -> f64 {
        match self {
            GameOutcome::Blackjack(o) => o.multiplier(),
            GameOutcome::Chinchiro(o) => o.multiplier(),
            GameOutcome::Poker(o) => o.multiplier(),
            GameOutcome::Slot(o) => o.multiplier(),
        }
    }

    /// Human-readable outcome name for settlement records and logs.
    pub fn label(&self) -> String {
        match self {
            GameOutcome::Blackjack(o) => o.label().to_string(),
            GameOutcome::Chinchiro(o) => o.label(),
            GameOutcome::Poker(o) => o.label().to_string(),
            GameOutcome::Slot(o) => o.label(),
        }
    }
}
