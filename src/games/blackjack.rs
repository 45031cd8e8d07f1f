//! Blackjack: hand valuation, the hit/stand player turn, and the
//! dealer's automatic resolution.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::deck::{Card, Deck, Rank};

/// The point total a hand must not exceed.
pub const BUST_LIMIT: u8 = 21;

/// Terminal blackjack outcomes with their payout multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlackjackOutcome {
    /// Natural 21 on the opening two cards.
    Natural,
    DealerBust,
    PlayerWin,
    Push,
    PlayerBust,
    DealerWin,
}

impl BlackjackOutcome {
    pub fn multiplier(&self) -> f64 {
        match self {
            BlackjackOutcome::Natural
            | BlackjackOutcome::DealerBust
            | BlackjackOutcome::PlayerWin => 2.0,
            BlackjackOutcome::Push => 1.0,
            BlackjackOutcome::PlayerBust | BlackjackOutcome::DealerWin => 0.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BlackjackOutcome::Natural => "blackjack",
            BlackjackOutcome::DealerBust => "dealer bust",
            BlackjackOutcome::PlayerWin => "player wins",
            BlackjackOutcome::Push => "push",
            BlackjackOutcome::PlayerBust => "player bust",
            BlackjackOutcome::DealerWin => "dealer wins",
        }
    }
}

/// Mutable blackjack table state for one session.
#[derive(Debug)]
pub struct BlackjackHand {
    pub deck: Deck,
    pub player: Vec<Card>,
    pub dealer: Vec<Card>,
    pub player_value: u8,
    pub dealer_value: u8,
    /// Cards the dealer drew during resolution, in draw order, so the
    /// display layer can show each step.
    pub dealer_draws: Vec<Card>,
}

/// Best value of a hand: aces count 11 and drop to 1 one at a time while
/// the total would bust.
pub fn hand_value(cards: &[Card]) -> u8 {
    let mut value: u16 = 0;
    let mut aces = 0u8;
    for card in cards {
        value += u16::from(card.rank.blackjack_value());
        if card.rank == Rank::Ace {
            aces += 1;
        }
    }
    while value > u16::from(BUST_LIMIT) && aces > 0 {
        value -= 10;
        aces -= 1;
    }
    value as u8
}

/// Deal the opening hands. A lucky deal redeals the dealer until it
/// starts from a weak total.
pub fn deal<R: Rng + ?Sized>(rng: &mut R, lucky: bool) -> BlackjackHand {
    let mut deck = Deck::shuffled(rng);
    let mut dealer = deck.draw_n(rng, 2);

    if lucky {
        while hand_value(&dealer) > 11 {
            deck = Deck::shuffled(rng);
            dealer = deck.draw_n(rng, 2);
        }
    }

    let player = deck.draw_n(rng, 2);
    let player_value = hand_value(&player);
    let dealer_value = hand_value(&dealer);

    BlackjackHand {
        deck,
        player,
        dealer,
        player_value,
        dealer_value,
        dealer_draws: Vec::new(),
    }
}

/// True when the opening two cards total 21.
pub fn is_natural(hand: &BlackjackHand) -> bool {
    hand.player.len() == 2 && hand.player_value == BUST_LIMIT
}

/// Player draws one card. Returns the terminal outcome if this busts the
/// hand, otherwise the turn continues.
pub fn hit<R: Rng + ?Sized>(hand: &mut BlackjackHand, rng: &mut R) -> Option<BlackjackOutcome> {
    let card = hand.deck.draw(rng);
    hand.player.push(card);
    hand.player_value = hand_value(&hand.player);

    if hand.player_value > BUST_LIMIT {
        Some(BlackjackOutcome::PlayerBust)
    } else {
        None
    }
}

/// Player stands: the dealer draws while below `stand_at`, then the
/// totals are compared.
pub fn stand<R: Rng + ?Sized>(
    hand: &mut BlackjackHand,
    rng: &mut R,
    stand_at: u8,
) -> BlackjackOutcome {
    while hand.dealer_value < stand_at {
        let card = hand.deck.draw(rng);
        hand.dealer.push(card);
        hand.dealer_draws.push(card);
        hand.dealer_value = hand_value(&hand.dealer);
    }

    if hand.dealer_value > BUST_LIMIT {
        BlackjackOutcome::DealerBust
    } else if hand.player_value > hand.dealer_value {
        BlackjackOutcome::PlayerWin
    } else if hand.dealer_value > hand.player_value {
        BlackjackOutcome::DealerWin
    } else {
        BlackjackOutcome::Push
    }
}
