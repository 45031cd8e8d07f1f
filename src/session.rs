//! Session state and the concurrent session store.
//!
//! A session is keyed by the interaction that started it, holds the
//! live hand state for one game, and moves through a small phase
//! machine until settlement removes it.

use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::RulesConfig;
use crate::deck::Card;
use crate::errors::{GameError, GameResult};
use crate::games::{blackjack::BlackjackHand, chinchiro::ChinchiroHand, poker::PokerHand};
use crate::games::GameOutcome;
use crate::ledger::AccountId;

/// Stable identifier for one game session, derived from the interaction
/// that opened it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub u64);

impl SessionKey {
    /// Mix an interaction id with a player id so two players replying to
    /// the same message never collide.
    pub fn derive(interaction_id: u64, player_id: u64) -> Self {
        let mut h = 0xcbf2_9ce4_8422_2325u64;
        for word in [interaction_id, player_id] {
            for byte in word.to_le_bytes() {
                h ^= u64::from(byte);
                h = h.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
        Self(h)
    }
}

impl From<u64> for SessionKey {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Which game a session is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Blackjack,
    Chinchiro,
    Poker,
    Slot,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameKind::Blackjack => "blackjack",
            GameKind::Chinchiro => "chinchiro",
            GameKind::Poker => "poker",
            GameKind::Slot => "slot",
        };
        f.write_str(name)
    }
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Blackjack: hit or stand.
    PlayerTurn,
    /// Chinchiro: reroll or keep.
    PlayerChoice,
    /// Poker: exchange cards or stand pat.
    DrawChoice,
    /// Outcome decided, settlement not yet started.
    Resolved,
    /// Settlement in flight; no player action and no expiry may touch
    /// the session until it completes or reverts.
    Settling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::PlayerTurn => "player-turn",
            Phase::PlayerChoice => "player-choice",
            Phase::DrawChoice => "draw-choice",
            Phase::Resolved => "resolved",
            Phase::Settling => "settling",
        };
        f.write_str(name)
    }
}

/// Live hand state for whichever game the session is playing.
#[derive(Debug)]
pub enum HandState {
    Blackjack(BlackjackHand),
    Chinchiro(ChinchiroHand),
    Poker(PokerHand),
    Slot { reels: [u8; 5] },
}

/// One in-flight game.
#[derive(Debug)]
pub struct GameSession {
    pub key: SessionKey,
    pub kind: GameKind,
    pub owner: AccountId,
    pub wager: u64,
    pub bonus_consumed: bool,
    pub phase: Phase,
    pub hand: HandState,
    pub outcome: Option<GameOutcome>,
    pub created_at: Instant,
    pub last_action_at: Instant,
}

impl GameSession {
    pub fn new(
        key: SessionKey,
        kind: GameKind,
        owner: AccountId,
        wager: u64,
        bonus_consumed: bool,
        phase: Phase,
        hand: HandState,
    ) -> Self {
        let now = Instant::now();
        Self {
            key,
            kind,
            owner,
            wager,
            bonus_consumed,
            phase,
            hand,
            outcome: None,
            created_at: now,
            last_action_at: now,
        }
    }

    /// Record the terminal outcome and enter the `Resolved` phase.
    pub fn resolve(&mut self, outcome: GameOutcome) {
        self.outcome = Some(outcome);
        self.phase = Phase::Resolved;
    }

    /// Refresh the idle clock after a player action.
    pub fn touch(&mut self) {
        self.last_action_at = Instant::now();
    }

    /// Snapshot of the hand for rendering, hiding what the player must
    /// not see yet.
    pub fn view(&self, rules: &RulesConfig) -> SessionView {
        match &self.hand {
            HandState::Blackjack(hand) => {
                let revealed = self.phase != Phase::PlayerTurn;
                let dealer: Vec<Card> = if revealed {
                    hand.dealer.clone()
                } else {
                    hand.dealer.iter().take(1).copied().collect()
                };
                SessionView::Blackjack {
                    player: hand.player.clone(),
                    player_value: hand.player_value,
                    dealer,
                    dealer_value: if revealed { Some(hand.dealer_value) } else { None },
                    dealer_revealed: revealed,
                    dealer_draws: hand.dealer_draws.clone(),
                }
            }
            HandState::Chinchiro(hand) => SessionView::Chinchiro {
                dice: hand.dice,
                rerolls_used: hand.rerolls_used,
                max_rerolls: rules.max_rerolls,
            },
            HandState::Poker(hand) => SessionView::Poker {
                cards: hand.cards.clone(),
                draws_used: hand.draws_used,
                max_draws: rules.max_draws,
            },
            HandState::Slot { reels } => SessionView::Slot { reels: *reels },
        }
    }
}

/// What the display layer is allowed to show for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum SessionView {
    Blackjack {
        player: Vec<Card>,
        player_value: u8,
        /// Only the up-card until the player stands or busts.
        dealer: Vec<Card>,
        dealer_value: Option<u8>,
        dealer_revealed: bool,
        dealer_draws: Vec<Card>,
    },
    Chinchiro {
        dice: [u8; 3],
        rerolls_used: u8,
        max_rerolls: u8,
    },
    Poker {
        cards: Vec<Card>,
        draws_used: u8,
        max_draws: u8,
    },
    Slot {
        reels: [u8; 5],
    },
}

/// Concurrent map of in-flight sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionKey, GameSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether a session currently exists for the key.
    pub fn contains(&self, key: SessionKey) -> bool {
        self.sessions.contains_key(&key)
    }

    /// Insert a new session; rejects a key that already has one.
    pub fn create(&self, session: GameSession) -> GameResult<()> {
        match self.sessions.entry(session.key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(GameError::SessionExists),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Run `f` with exclusive access to the session. The map shard stays
    /// locked for the duration, so `f` must not block or await.
    pub fn with_session_mut<T>(
        &self,
        key: SessionKey,
        f: impl FnOnce(&mut GameSession) -> GameResult<T>,
    ) -> GameResult<T> {
        let mut entry = self.sessions.get_mut(&key).ok_or(GameError::NoSuchSession)?;
        f(entry.value_mut())
    }

    pub fn remove(&self, key: SessionKey) -> Option<GameSession> {
        self.sessions.remove(&key).map(|(_, session)| session)
    }

    /// Re-insert a session taken out for settlement or expiry that
    /// needs to come back after a ledger failure. Refuses to overwrite
    /// a session that claimed the key in the meantime; returns whether
    /// the session went back in.
    pub fn restore(&self, session: GameSession) -> bool {
        match self.sessions.entry(session.key) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        }
    }

    /// Keys of sessions idle past `timeout`. Settling sessions are never
    /// reported; their wager is already committed to the ledger path.
    pub fn idle_keys(&self, timeout: Duration) -> Vec<SessionKey> {
        let now = Instant::now();
        self.sessions
            .iter()
            .filter(|entry| {
                entry.phase != Phase::Settling
                    && now.duration_since(entry.last_action_at) >= timeout
            })
            .map(|entry| *entry.key())
            .collect()
    }
}
