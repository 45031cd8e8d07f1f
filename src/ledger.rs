//! External economy collaborators: the balance ledger and the item
//! inventory. The engine only ever talks to these through the traits so
//! game logic stays independently testable.

use async_trait::async_trait;
use dashmap::DashMap;

/// Account identifier in the external economy (e.g. `"{guild}_{user}"`).
pub type AccountId = String;

/// Failures reported by the economy services. These are surfaced rather
/// than swallowed so a failed settlement can be retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("economy service unavailable: {0}")]
    Unavailable(String),

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("balance update rejected: {0}")]
    Rejected(String),
}

/// Service of record for player currency balances.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Current balance for an account.
    async fn balance(&self, account: &str) -> Result<i64, LedgerError>;

    /// Apply a single signed delta atomically and return the new balance.
    /// Settlements carry their full payout in one call; no multi-step
    /// transaction spans the network.
    async fn adjust(&self, account: &str, delta: i64) -> Result<i64, LedgerError>;
}

/// One-shot consumable item storage.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Consume one unit of `item_id` if the account holds any.
    /// Returns `false` when nothing was consumed.
    async fn consume_one(&self, account: &str, item_id: &str) -> Result<bool, LedgerError>;
}

/// In-process ledger backed by a concurrent map. Reference implementation
/// for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    balances: DashMap<AccountId, i64>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account balance, creating the account if needed.
    pub fn set_balance(&self, account: &str, amount: i64) {
        self.balances.insert(account.to_string(), amount);
    }
}

#[async_trait]
impl LedgerService for MemoryLedger {
    async fn balance(&self, account: &str) -> Result<i64, LedgerError> {
        self.balances
            .get(account)
            .map(|b| *b)
            .ok_or_else(|| LedgerError::UnknownAccount(account.to_string()))
    }

    async fn adjust(&self, account: &str, delta: i64) -> Result<i64, LedgerError> {
        let mut entry = self
            .balances
            .get_mut(account)
            .ok_or_else(|| LedgerError::UnknownAccount(account.to_string()))?;
        *entry += delta;
        Ok(*entry)
    }
}

/// In-process inventory keyed by `(account, item)`.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    counts: DashMap<(AccountId, String), u32>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `amount` units of an item to an account.
    pub fn grant(&self, account: &str, item_id: &str, amount: u32) {
        *self
            .counts
            .entry((account.to_string(), item_id.to_string()))
            .or_insert(0) += amount;
    }

    pub fn count(&self, account: &str, item_id: &str) -> u32 {
        self.counts
            .get(&(account.to_string(), item_id.to_string()))
            .map(|c| *c)
            .unwrap_or(0)
    }
}

#[async_trait]
impl InventoryService for MemoryInventory {
    async fn consume_one(&self, account: &str, item_id: &str) -> Result<bool, LedgerError> {
        let key = (account.to_string(), item_id.to_string());
        match self.counts.get_mut(&key) {
            Some(mut count) if *count > 0 => {
                *count -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_ledger_adjusts_and_reports() {
        let ledger = MemoryLedger::new();
        ledger.set_balance("alice", 1_000);

        assert_eq!(ledger.balance("alice").await.unwrap(), 1_000);
        assert_eq!(ledger.adjust("alice", -300).await.unwrap(), 700);
        assert_eq!(ledger.adjust("alice", 50).await.unwrap(), 750);
    }

    #[tokio::test]
    async fn unknown_account_is_an_error_not_zero() {
        let ledger = MemoryLedger::new();
        assert!(matches!(
            ledger.balance("ghost").await,
            Err(LedgerError::UnknownAccount(_))
        ));
        assert!(ledger.adjust("ghost", 10).await.is_err());
    }

    #[tokio::test]
    async fn inventory_consumes_until_empty() {
        let inventory = MemoryInventory::new();
        inventory.grant("bob", "insurance_card", 2);

        assert!(inventory.consume_one("bob", "insurance_card").await.unwrap());
        assert!(inventory.consume_one("bob", "insurance_card").await.unwrap());
        assert!(!inventory.consume_one("bob", "insurance_card").await.unwrap());
        assert!(!inventory.consume_one("bob", "poker_chip").await.unwrap());
    }
}
