//! Five-reel slot: longest-count matching with contiguity bonuses.
//! Resolves in a single step; there is no interactive phase.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of reels on the machine.
pub const REEL_COUNT: usize = 5;
/// Symbols are 1..=SYMBOL_MAX; symbol 1 is the jackpot symbol.
pub const SYMBOL_MAX: u8 = 5;
/// The symbol that pays the 100x five-of-a-kind jackpot.
pub const JACKPOT_SYMBOL: u8 = 1;

/// Slot spin outcomes with their payout multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotOutcome {
    FiveOfAKind { symbol: u8 },
    FourOfAKind { symbol: u8, contiguous: bool },
    ThreeOfAKind { symbol: u8, contiguous: bool },
    Miss,
}

impl SlotOutcome {
    pub fn multiplier(&self) -> f64 {
        match self {
            SlotOutcome::FiveOfAKind { symbol } => {
                if *symbol == JACKPOT_SYMBOL {
                    100.0
                } else {
                    10.0
                }
            }
            SlotOutcome::FourOfAKind { contiguous, .. } => {
                if *contiguous {
                    5.0
                } else {
                    2.0
                }
            }
            SlotOutcome::ThreeOfAKind { contiguous, .. } => {
                if *contiguous {
                    1.5
                } else {
                    1.25
                }
            }
            SlotOutcome::Miss => 0.0,
        }
    }

    pub fn label(&self) -> String {
        match self {
            SlotOutcome::FiveOfAKind { symbol } => format!("five {}s", symbol),
            SlotOutcome::FourOfAKind { symbol, contiguous } => {
                if *contiguous {
                    format!("four {}s in a row", symbol)
                } else {
                    format!("four {}s", symbol)
                }
            }
            SlotOutcome::ThreeOfAKind { symbol, contiguous } => {
                if *contiguous {
                    format!("three {}s in a row", symbol)
                } else {
                    format!("three {}s", symbol)
                }
            }
            SlotOutcome::Miss => "miss".to_string(),
        }
    }
}

/// Spin the reels. A lucky spin plants a contiguous triple of a random
/// symbol; the remaining reels may still extend it.
pub fn spin<R: Rng + ?Sized>(rng: &mut R, lucky: bool) -> [u8; REEL_COUNT] {
    let mut reels = [0u8; REEL_COUNT];
    for reel in reels.iter_mut() {
        *reel = rng.gen_range(1..=SYMBOL_MAX);
    }

    if lucky {
        let symbol = rng.gen_range(1..=SYMBOL_MAX);
        let start = rng.gen_range(0..=REEL_COUNT - 3);
        for reel in reels.iter_mut().skip(start).take(3) {
            *reel = symbol;
        }
    }

    reels
}

fn has_contiguous_run(reels: &[u8; REEL_COUNT], symbol: u8, len: usize) -> bool {
    reels
        .windows(len)
        .any(|w| w.iter().all(|&r| r == symbol))
}

/// Evaluate the spin: the symbol with the highest count anywhere on the
/// reels decides the outcome, contiguity upgrades the payout.
pub fn evaluate(reels: [u8; REEL_COUNT]) -> SlotOutcome {
    let mut counts = [0u8; SYMBOL_MAX as usize + 1];
    for &reel in &reels {
        counts[reel as usize] += 1;
    }

    // at most one symbol can reach three of five reels
    let (symbol, count) = counts
        .iter()
        .enumerate()
        .skip(1)
        .max_by_key(|(_, &c)| c)
        .map(|(s, &c)| (s as u8, c))
        .unwrap_or((0, 0));

    match count {
        5 => SlotOutcome::FiveOfAKind { symbol },
        4 => SlotOutcome::FourOfAKind {
            symbol,
            contiguous: has_contiguous_run(&reels, symbol, 4),
        },
        3 => SlotOutcome::ThreeOfAKind {
            symbol,
            contiguous: has_contiguous_run(&reels, symbol, 3),
        },
        _ => SlotOutcome::Miss,
    }
}
