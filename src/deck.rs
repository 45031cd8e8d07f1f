//! Card and dice providers for the wager games.
//!
//! Both providers are deterministic given an injected RNG so game flows
//! can be replayed exactly in tests.

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card suit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Spades,
    Hearts,
    Clubs,
    Diamonds,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Clubs, Suit::Diamonds];

    pub fn symbol(&self) -> &'static str {
        match self {
            Suit::Spades => "♠",
            Suit::Hearts => "♥",
            Suit::Clubs => "♣",
            Suit::Diamonds => "♦",
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Card rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Blackjack counting value: face cards are 10, the ace starts at 11
    /// and is reduced to 1 by the hand evaluator when it would bust.
    pub fn blackjack_value(&self) -> u8 {
        match self {
            Rank::Ace => 11,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
        }
    }

    /// Poker ordering value, ace high (2..=14).
    pub fn order(&self) -> u8 {
        match self {
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
            Rank::Ace => 14,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        }
    }
}

/// A single playing card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.suit.symbol(), self.rank.symbol())
    }
}

/// A shuffled 52-card deck that silently refills and reshuffles when
/// exhausted mid-draw. Cards already in play are not tracked across a
/// refill; the games never draw enough in one session for duplicates to
/// appear at the table.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Build a freshly shuffled deck.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self { cards: Vec::new() };
        deck.refill(rng);
        deck
    }

    fn refill<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.clear();
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                self.cards.push(Card::new(suit, rank));
            }
        }
        self.cards.shuffle(rng);
    }

    /// Draw one card, reshuffling a fresh deck first if empty.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Card {
        if self.cards.is_empty() {
            self.refill(rng);
        }
        // refill guarantees at least one card
        self.cards.pop().unwrap()
    }

    /// Draw `n` cards.
    pub fn draw_n<R: Rng + ?Sized>(&mut self, rng: &mut R, n: usize) -> Vec<Card> {
        (0..n).map(|_| self.draw(rng)).collect()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

/// Roll `count` independent uniform dice in `[1, sides]`.
pub fn roll_dice<R: Rng + ?Sized>(rng: &mut R, count: usize, sides: u8) -> Vec<u8> {
    (0..count).map(|_| rng.gen_range(1..=sides)).collect()
}

/// Three six-sided dice, the chinchiro roll.
pub fn roll_three_d6<R: Rng + ?Sized>(rng: &mut R) -> [u8; 3] {
    [
        rng.gen_range(1..=6),
        rng.gen_range(1..=6),
        rng.gen_range(1..=6),
    ]
}
