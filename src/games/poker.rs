//! Five-card draw poker: hand ranking with the fixed payout table and
//! the single exchange round.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::deck::{Card, Deck};
use crate::errors::{GameError, GameResult};

/// Poker hand ranks, strongest first, with the house payout table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PokerRank {
    RoyalStraightFlush,
    StraightFlush,
    FourOfAKind,
    FullHouse,
    Flush,
    Straight,
    ThreeOfAKind,
    TwoPair,
    OnePair,
    HighCard,
}

impl PokerRank {
    pub fn multiplier(&self) -> f64 {
        match self {
            PokerRank::RoyalStraightFlush => 200.0,
            PokerRank::StraightFlush => 50.0,
            PokerRank::FourOfAKind => 25.0,
            PokerRank::FullHouse => 12.0,
            PokerRank::Flush => 8.0,
            PokerRank::Straight => 5.0,
            PokerRank::ThreeOfAKind => 3.0,
            PokerRank::TwoPair => 2.0,
            PokerRank::OnePair => 1.2,
            PokerRank::HighCard => 0.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PokerRank::RoyalStraightFlush => "royal straight flush",
            PokerRank::StraightFlush => "straight flush",
            PokerRank::FourOfAKind => "four of a kind",
            PokerRank::FullHouse => "full house",
            PokerRank::Flush => "flush",
            PokerRank::Straight => "straight",
            PokerRank::ThreeOfAKind => "three of a kind",
            PokerRank::TwoPair => "two pair",
            PokerRank::OnePair => "one pair",
            PokerRank::HighCard => "high card",
        }
    }
}

/// Cards and exchange bookkeeping for one session.
#[derive(Debug)]
pub struct PokerHand {
    pub deck: Deck,
    pub cards: Vec<Card>,
    pub draws_used: u8,
}

/// Rank a five-card hand. Order-independent; the wheel (A-2-3-4-5)
/// counts as a straight.
pub fn evaluate(cards: &[Card]) -> PokerRank {
    debug_assert_eq!(cards.len(), 5);

    let mut orders: Vec<u8> = cards.iter().map(|c| c.rank.order()).collect();
    orders.sort_unstable();

    let is_flush = cards.iter().all(|c| c.suit == cards[0].suit);
    let is_wheel = orders == [2, 3, 4, 5, 14];
    let is_straight = is_wheel || orders.windows(2).all(|w| w[1] == w[0] + 1);

    if is_straight && is_flush {
        return if orders == [10, 11, 12, 13, 14] {
            PokerRank::RoyalStraightFlush
        } else {
            PokerRank::StraightFlush
        };
    }

    let mut counts: HashMap<u8, u8> = HashMap::new();
    for order in &orders {
        *counts.entry(*order).or_insert(0) += 1;
    }
    let mut freq: Vec<u8> = counts.values().copied().collect();
    freq.sort_unstable_by(|a, b| b.cmp(a));

    if freq[0] == 4 {
        PokerRank::FourOfAKind
    } else if freq == [3, 2] {
        PokerRank::FullHouse
    } else if is_flush {
        PokerRank::Flush
    } else if is_straight {
        PokerRank::Straight
    } else if freq[0] == 3 {
        PokerRank::ThreeOfAKind
    } else if freq == [2, 2, 1] {
        PokerRank::TwoPair
    } else if freq[0] == 2 {
        PokerRank::OnePair
    } else {
        PokerRank::HighCard
    }
}

/// Deal the opening five cards. A lucky deal redraws duplicated ranks so
/// the hand starts with five distinct ranks.
pub fn deal<R: Rng + ?Sized>(rng: &mut R, lucky: bool) -> PokerHand {
    let mut deck = Deck::shuffled(rng);
    let cards = if lucky {
        let mut cards = Vec::with_capacity(5);
        let mut seen = BTreeSet::new();
        while cards.len() < 5 {
            let card = deck.draw(rng);
            if seen.insert(card.rank.order()) {
                cards.push(card);
            }
        }
        cards
    } else {
        deck.draw_n(rng, 5)
    };

    PokerHand {
        deck,
        cards,
        draws_used: 0,
    }
}

/// Exchange the cards at `discard` indices for fresh draws. Zero indices
/// is a legal no-op exchange that still consumes the round.
pub fn exchange<R: Rng + ?Sized>(
    hand: &mut PokerHand,
    rng: &mut R,
    discard: &[usize],
) -> GameResult<()> {
    let indices: BTreeSet<usize> = discard.iter().copied().collect();
    if let Some(&bad) = indices.iter().find(|&&i| i >= hand.cards.len()) {
        return Err(GameError::InvalidDiscard { index: bad });
    }

    let kept: Vec<Card> = hand
        .cards
        .iter()
        .enumerate()
        .filter(|(i, _)| !indices.contains(i))
        .map(|(_, c)| *c)
        .collect();

    let mut cards = kept;
    cards.extend(hand.deck.draw_n(rng, indices.len()));
    hand.cards = cards;
    hand.draws_used += 1;

    Ok(())
}
