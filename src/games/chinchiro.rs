//! Chinchiro: three-dice outcome evaluation with the strict hand
//! priority (triples before the 1-2-3 sequence before pairs) and the
//! reroll loop state.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::deck::roll_three_d6;

/// Named chinchiro hands in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChinchiroOutcome {
    /// Triple ones.
    Pinzoro,
    /// Any other triple; carries the die value.
    Zoro(u8),
    /// The 1-2-3 sequence: the player pays double the wager.
    Hifumi,
    /// A pair plus a distinguishing single die; carries the point value.
    Point(u8),
    /// No recognized pattern; the stake is lost.
    NoHand,
}

impl ChinchiroOutcome {
    pub fn multiplier(&self) -> f64 {
        match self {
            ChinchiroOutcome::Pinzoro => 5.0,
            ChinchiroOutcome::Zoro(_) => 3.0,
            ChinchiroOutcome::Hifumi => -2.0,
            ChinchiroOutcome::Point(_) => 1.0,
            ChinchiroOutcome::NoHand => 0.0,
        }
    }

    pub fn label(&self) -> String {
        match self {
            ChinchiroOutcome::Pinzoro => "pinzoro".to_string(),
            ChinchiroOutcome::Zoro(n) => format!("triple {}s", n),
            ChinchiroOutcome::Hifumi => "hifumi".to_string(),
            ChinchiroOutcome::Point(n) => format!("point {}", n),
            ChinchiroOutcome::NoHand => "no hand".to_string(),
        }
    }

    /// A named hand ends the game immediately on the opening roll.
    pub fn is_named(&self) -> bool {
        !matches!(self, ChinchiroOutcome::NoHand)
    }
}

/// Dice and reroll bookkeeping for one session.
#[derive(Debug, Clone, Copy)]
pub struct ChinchiroHand {
    pub dice: [u8; 3],
    pub rerolls_used: u8,
}

/// Evaluate a roll. Triples are checked before the sequence and pair
/// patterns so the priority order can never be shadowed.
pub fn evaluate(dice: [u8; 3]) -> ChinchiroOutcome {
    let mut sorted = dice;
    sorted.sort_unstable();

    if sorted[0] == sorted[1] && sorted[1] == sorted[2] {
        return if sorted[0] == 1 {
            ChinchiroOutcome::Pinzoro
        } else {
            ChinchiroOutcome::Zoro(sorted[0])
        };
    }

    if sorted == [1, 2, 3] {
        return ChinchiroOutcome::Hifumi;
    }

    if sorted[0] == sorted[1] {
        ChinchiroOutcome::Point(sorted[2])
    } else if sorted[1] == sorted[2] {
        ChinchiroOutcome::Point(sorted[0])
    } else {
        ChinchiroOutcome::NoHand
    }
}

/// Dice forced by a lucky deal: a no-hand start, keeping the reroll
/// phase open without risking hifumi.
pub const LUCKY_DICE: [u8; 3] = [1, 2, 4];

/// Opening roll for a new session.
pub fn deal<R: Rng + ?Sized>(rng: &mut R, lucky: bool) -> ChinchiroHand {
    let dice = if lucky { LUCKY_DICE } else { roll_three_d6(rng) };
    ChinchiroHand {
        dice,
        rerolls_used: 0,
    }
}

/// Replace all three dice with a fresh roll.
pub fn reroll<R: Rng + ?Sized>(hand: &mut ChinchiroHand, rng: &mut R) {
    hand.dice = roll_three_d6(rng);
    hand.rerolls_used += 1;
}
