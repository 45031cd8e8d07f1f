//! Error types for the casino engine.
//!
//! Every rejection a caller can hit is a typed variant; the dispatch
//! layer maps variants onto user-facing messages through
//! [`GameError::category`] without ever leaking internals.

use crate::ledger::LedgerError;
use crate::session::Phase;

/// Root error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("wager must be a positive amount")]
    InvalidWager,

    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("no '{item_id}' item available to consume")]
    NoBonusItem { item_id: String },

    #[error("a game is already in progress for this session")]
    SessionExists,

    #[error("no active game for this session")]
    NoSuchSession,

    #[error("only the player who started the game can act on it")]
    WrongActor,

    #[error("that action is not valid in the {phase} phase")]
    InvalidActionForPhase { phase: Phase },

    #[error("no rerolls remaining (limit {max})")]
    RerollsExhausted { max: u8 },

    #[error("no card exchanges remaining (limit {max})")]
    DrawExhausted { max: u8 },

    #[error("discard index {index} is out of range")]
    InvalidDiscard { index: usize },

    #[error("settlement is already in progress for this session")]
    SettlementInProgress,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Coarse user-facing classification of a rejection. The display layer
/// picks a localized message per category instead of echoing internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Wager/balance/item problems: "you can't afford this".
    CannotAfford,
    /// Ownership problems: "this is not your game".
    NotYourGame,
    /// Phase or limit problems: "that move isn't available right now".
    InvalidMove,
    /// External-service problems: "something went wrong, try again".
    Transient,
}

impl GameError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GameError::InvalidWager
            | GameError::InsufficientBalance { .. }
            | GameError::NoBonusItem { .. } => ErrorCategory::CannotAfford,
            GameError::WrongActor => ErrorCategory::NotYourGame,
            GameError::SessionExists
            | GameError::NoSuchSession
            | GameError::InvalidActionForPhase { .. }
            | GameError::RerollsExhausted { .. }
            | GameError::DrawExhausted { .. }
            | GameError::InvalidDiscard { .. } => ErrorCategory::InvalidMove,
            GameError::SettlementInProgress | GameError::Ledger(_) => ErrorCategory::Transient,
        }
    }
}

/// Convenience result alias used across the crate.
pub type GameResult<T> = Result<T, GameError>;
