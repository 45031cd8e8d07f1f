//! Settlement: turning a resolved outcome into a single ledger
//! adjustment and a durable record of what happened.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::NegativeBalancePolicy;
use crate::errors::GameResult;
use crate::games::GameOutcome;
use crate::ledger::{AccountId, LedgerService};
use crate::session::{SessionKey, SessionView};

/// Gross amount the player receives for a resolved game, in the same
/// units as the wager. The wager was already debited at game start, so
/// a 1.0x multiplier (push) pays the stake back and 0.0x pays nothing.
/// Negative multipliers (hifumi) produce a further debit on top of the
/// lost stake.
///
/// A consumed bonus amplifies the multiplier only when it is positive;
/// a bonus never deepens a loss. Returns the signed payout and whether
/// the bonus actually applied.
pub fn gross_payout(
    wager: u64,
    multiplier: f64,
    bonus_consumed: bool,
    bonus_multiplier: f64,
) -> (i64, bool) {
    let bonus_applied = bonus_consumed && multiplier > 0.0;
    let effective = if bonus_applied {
        multiplier * bonus_multiplier
    } else {
        multiplier
    };
    ((wager as f64 * effective).floor() as i64, bonus_applied)
}

/// Durable record of one completed settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settled {
    pub settlement_id: String,
    pub session_key: SessionKey,
    pub account: AccountId,
    pub outcome_name: String,
    pub multiplier: f64,
    pub wager: u64,
    /// Signed amount actually applied to the ledger, after policy.
    pub payout: i64,
    pub final_balance: i64,
    pub bonus_applied: bool,
    /// Final hand snapshot with everything revealed.
    pub view: SessionView,
}

/// Applies resolved outcomes to the ledger under the configured
/// negative-balance policy.
pub struct SettlementBridge {
    ledger: Arc<dyn LedgerService>,
    policy: NegativeBalancePolicy,
    bonus_multiplier: f64,
}

impl SettlementBridge {
    pub fn new(
        ledger: Arc<dyn LedgerService>,
        policy: NegativeBalancePolicy,
        bonus_multiplier: f64,
    ) -> Self {
        Self {
            ledger,
            policy,
            bonus_multiplier,
        }
    }

    /// Settle one resolved session against the ledger. The ledger call
    /// happens exactly once; on failure the caller keeps the session so
    /// the settlement can be retried.
    pub async fn settle(
        &self,
        session_key: SessionKey,
        account: &AccountId,
        wager: u64,
        outcome: GameOutcome,
        bonus_consumed: bool,
        view: SessionView,
    ) -> GameResult<Settled> {
        let multiplier = outcome.multiplier();
        let (raw_payout, bonus_applied) =
            gross_payout(wager, multiplier, bonus_consumed, self.bonus_multiplier);

        let mut payout = if raw_payout < 0 && self.policy == NegativeBalancePolicy::ClampToBalance {
            let balance = self.ledger.balance(account).await?;
            let clamped = raw_payout.max(-balance.max(0));
            if clamped != raw_payout {
                warn!(
                    session = %session_key,
                    account = %account,
                    requested = raw_payout,
                    applied = clamped,
                    "clamped losing payout to available balance"
                );
            }
            clamped
        } else {
            raw_payout
        };

        let mut final_balance = self.ledger.adjust(account, payout).await?;

        // The clamp reads the balance in a separate call, so a debit
        // landing between the read and the write can still push the
        // balance below zero. One corrective credit restores the floor.
        if payout < 0 && self.policy == NegativeBalancePolicy::ClampToBalance && final_balance < 0 {
            let correction = -final_balance;
            final_balance = self.ledger.adjust(account, correction).await?;
            payout += correction;
            warn!(
                session = %session_key,
                account = %account,
                correction,
                "re-clamped losing payout after a concurrent debit"
            );
        }

        let record = Settled {
            settlement_id: Uuid::new_v4().to_string(),
            session_key,
            account: account.clone(),
            outcome_name: outcome.label(),
            multiplier,
            wager,
            payout,
            final_balance,
            bonus_applied,
            view,
        };

        info!(
            settlement = %record.settlement_id,
            session = %session_key,
            account = %account,
            outcome = %record.outcome_name,
            payout,
            final_balance,
            bonus_applied,
            "settled game"
        );

        Ok(record)
    }
}
