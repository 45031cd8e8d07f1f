//! Parlor is a session engine for wager-based mini games: blackjack,
//! chinchiro, five-card draw poker, and a five-reel slot machine.
//!
//! The engine owns the in-flight sessions and the game rules; player
//! balances and consumable bonus items live in external services
//! reached through the [`ledger::LedgerService`] and
//! [`ledger::InventoryService`] traits. A wager is debited when a game
//! starts, the outcome is settled through exactly one ledger adjustment,
//! and the session is removed only after the ledger confirms.
//!
//! ```no_run
//! use std::sync::Arc;
//! use parlor::{CasinoEngine, EngineConfig, GameKind, MemoryInventory, MemoryLedger, SessionKey};
//!
//! # async fn run() -> parlor::GameResult<()> {
//! let ledger = Arc::new(MemoryLedger::new());
//! ledger.set_balance("guild1_user1", 1_000);
//! let inventory = Arc::new(MemoryInventory::new());
//!
//! let engine = CasinoEngine::new(EngineConfig::default(), ledger, inventory);
//! let update = engine
//!     .begin_game(
//!         SessionKey::derive(42, 1),
//!         GameKind::Blackjack,
//!         &"guild1_user1".to_string(),
//!         100,
//!         false,
//!     )
//!     .await?;
//! # let _ = update;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod deck;
pub mod engine;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod session;
pub mod settlement;

pub use config::{ConfigError, ConfigLoader, EngineConfig, ExpiryPolicy, NegativeBalancePolicy};
pub use engine::{CasinoEngine, ExpiredSession, GameUpdate, PlayerAction};
pub use errors::{ErrorCategory, GameError, GameResult};
pub use games::GameOutcome;
pub use ledger::{
    AccountId, InventoryService, LedgerError, LedgerService, MemoryInventory, MemoryLedger,
};
pub use session::{GameKind, Phase, SessionKey, SessionView};
pub use settlement::Settled;
