//! End-to-end flows through the engine with in-process economy services.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use parlor::{
    CasinoEngine, EngineConfig, ErrorCategory, ExpiryPolicy, GameError, GameKind, GameUpdate,
    LedgerError, LedgerService, MemoryInventory, MemoryLedger, PlayerAction, SessionKey,
    SessionView,
};

const PLAYER: &str = "guild1_player1";

fn engine(seed: u64, balance: i64) -> (CasinoEngine, Arc<MemoryLedger>, Arc<MemoryInventory>) {
    engine_with_config(EngineConfig::default(), seed, balance)
}

fn engine_with_config(
    config: EngineConfig,
    seed: u64,
    balance: i64,
) -> (CasinoEngine, Arc<MemoryLedger>, Arc<MemoryInventory>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let ledger = Arc::new(MemoryLedger::new());
    ledger.set_balance(PLAYER, balance);
    let inventory = Arc::new(MemoryInventory::new());
    let engine = CasinoEngine::with_seed(config, ledger.clone(), inventory.clone(), seed);
    (engine, ledger, inventory)
}

/// Ledger that fails a configured number of adjustments before behaving.
struct FlakyLedger {
    inner: MemoryLedger,
    failures_left: AtomicU32,
}

impl FlakyLedger {
    fn new(failures: u32) -> Self {
        Self {
            inner: MemoryLedger::new(),
            failures_left: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl LedgerService for FlakyLedger {
    async fn balance(&self, account: &str) -> Result<i64, LedgerError> {
        self.inner.balance(account).await
    }

    async fn adjust(&self, account: &str, delta: i64) -> Result<i64, LedgerError> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LedgerError::Unavailable("economy down".to_string()));
        }
        self.inner.adjust(account, delta).await
    }
}

#[tokio::test]
async fn natural_blackjack_pays_double_immediately() {
    for seed in 0..5_000u64 {
        let (engine, ledger, _) = engine(seed, 1_000);
        let update = engine
            .begin_game(SessionKey(1), GameKind::Blackjack, &PLAYER.to_string(), 100, false)
            .await
            .unwrap();

        if let GameUpdate::Settled(record) = update {
            assert_eq!(record.outcome_name, "blackjack");
            assert_eq!(record.payout, 200);
            assert_eq!(ledger.balance(PLAYER).await.unwrap(), 1_100);
            assert_eq!(engine.active_sessions(), 0);
            return;
        }
    }
    panic!("no seed in range produced an opening natural");
}

#[tokio::test]
async fn blackjack_hit_until_bust_loses_the_stake() {
    for seed in 0..2_000u64 {
        let (engine, ledger, _) = engine(seed, 1_000);
        let update = engine
            .begin_game(SessionKey(1), GameKind::Blackjack, &PLAYER.to_string(), 100, false)
            .await
            .unwrap();
        if matches!(update, GameUpdate::Settled(_)) {
            continue;
        }

        let mut hits = 0;
        loop {
            let update = engine
                .submit_action(SessionKey(1), &PLAYER.to_string(), PlayerAction::Hit)
                .await
                .unwrap();
            hits += 1;
            match update {
                GameUpdate::InProgress(_) => {
                    assert!(hits < 20, "hand cannot stay under 21 forever");
                }
                GameUpdate::Settled(record) => {
                    if record.outcome_name == "player bust" {
                        assert_eq!(record.payout, 0);
                        assert_eq!(ledger.balance(PLAYER).await.unwrap(), 900);
                        return;
                    }
                    break;
                }
            }
        }
    }
    panic!("no seed in range produced a player bust");
}

#[tokio::test]
async fn chinchiro_hifumi_debit_is_clamped_to_the_balance() {
    for seed in 0..5_000u64 {
        let (engine, ledger, _) = engine(seed, 200);
        let update = engine
            .begin_game(SessionKey(1), GameKind::Chinchiro, &PLAYER.to_string(), 100, false)
            .await
            .unwrap();

        if let GameUpdate::Settled(record) = update {
            if record.outcome_name != "hifumi" {
                continue;
            }
            // 100 already escrowed; the -200 hifumi debit is capped at
            // the remaining 100 under the default clamp policy
            assert_eq!(record.payout, -100);
            assert_eq!(record.final_balance, 0);
            assert_eq!(ledger.balance(PLAYER).await.unwrap(), 0);
            return;
        }
    }
    panic!("no seed in range produced an opening hifumi");
}

#[tokio::test]
async fn chinchiro_opening_pinzoro_pays_five_times() {
    for seed in 0..5_000u64 {
        let (engine, ledger, _) = engine(seed, 1_000);
        let update = engine
            .begin_game(SessionKey(1), GameKind::Chinchiro, &PLAYER.to_string(), 50, false)
            .await
            .unwrap();

        if let GameUpdate::Settled(record) = update {
            if record.outcome_name != "pinzoro" {
                continue;
            }
            assert_eq!(record.payout, 250);
            assert_eq!(ledger.balance(PLAYER).await.unwrap(), 1_200);
            return;
        }
    }
    panic!("no seed in range produced an opening pinzoro");
}

#[tokio::test]
async fn chinchiro_no_hand_offers_rerolls_up_to_the_limit() {
    for seed in 0..5_000u64 {
        let (engine, _, _) = engine(seed, 1_000);
        let update = engine
            .begin_game(SessionKey(1), GameKind::Chinchiro, &PLAYER.to_string(), 100, false)
            .await
            .unwrap();
        let GameUpdate::InProgress(view) = update else {
            continue;
        };
        match view {
            SessionView::Chinchiro { rerolls_used, max_rerolls, .. } => {
                assert_eq!(rerolls_used, 0);
                assert_eq!(max_rerolls, 2);
            }
            other => panic!("unexpected view {:?}", other),
        }

        // the first reroll never settles, whatever it shows; only the
        // final permitted throw resolves as it lands
        let first = engine
            .submit_action(SessionKey(1), &PLAYER.to_string(), PlayerAction::Reroll)
            .await
            .unwrap();
        assert!(matches!(first, GameUpdate::InProgress(_)));

        let second = engine
            .submit_action(SessionKey(1), &PLAYER.to_string(), PlayerAction::Reroll)
            .await
            .unwrap();
        assert!(matches!(second, GameUpdate::Settled(_)));
        assert_eq!(engine.active_sessions(), 0);
        return;
    }
    panic!("no seed in range produced an opening no-hand");
}

#[tokio::test]
async fn rerolling_into_hifumi_leaves_the_choice_open() {
    use parlor::games::{chinchiro, ChinchiroOutcome};

    for seed in 0..20_000u64 {
        let (engine, ledger, _) = engine(seed, 1_000);
        let update = engine
            .begin_game(SessionKey(1), GameKind::Chinchiro, &PLAYER.to_string(), 50, false)
            .await
            .unwrap();
        if matches!(update, GameUpdate::Settled(_)) {
            continue;
        }

        let update = engine
            .submit_action(SessionKey(1), &PLAYER.to_string(), PlayerAction::Reroll)
            .await
            .unwrap();
        let GameUpdate::InProgress(SessionView::Chinchiro { dice, .. }) = update else {
            panic!("a first reroll must never settle");
        };
        if chinchiro::evaluate(dice) != ChinchiroOutcome::Hifumi {
            continue;
        }

        // the double loss is not locked in: the session is still open
        // and the last throw can roll it away
        assert_eq!(engine.active_sessions(), 1);
        assert_eq!(ledger.balance(PLAYER).await.unwrap(), 950);
        let update = engine
            .submit_action(SessionKey(1), &PLAYER.to_string(), PlayerAction::Reroll)
            .await
            .unwrap();
        assert!(matches!(update, GameUpdate::Settled(_)));
        return;
    }
    panic!("no seed in range rerolled into hifumi");
}

#[tokio::test]
async fn rejected_duplicate_key_spares_the_bonus_item() {
    let (engine, ledger, inventory) = engine(37, 1_000);
    inventory.grant(PLAYER, "poker_chip", 1);

    engine
        .begin_game(SessionKey(1), GameKind::Poker, &PLAYER.to_string(), 100, false)
        .await
        .unwrap();

    let err = engine
        .begin_game(SessionKey(1), GameKind::Poker, &PLAYER.to_string(), 100, true)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::SessionExists));
    assert_eq!(inventory.count(PLAYER, "poker_chip"), 1);
    assert_eq!(ledger.balance(PLAYER).await.unwrap(), 900);
}

#[tokio::test]
async fn poker_exchange_round_resolves_the_hand() {
    let (engine, ledger, _) = engine(11, 1_000);
    let update = engine
        .begin_game(SessionKey(1), GameKind::Poker, &PLAYER.to_string(), 100, false)
        .await
        .unwrap();
    match update {
        GameUpdate::InProgress(SessionView::Poker { cards, draws_used, max_draws }) => {
            assert_eq!(cards.len(), 5);
            assert_eq!(draws_used, 0);
            assert_eq!(max_draws, 1);
        }
        other => panic!("unexpected update {:?}", other),
    }

    let update = engine
        .submit_action(
            SessionKey(1),
            &PLAYER.to_string(),
            PlayerAction::Draw { discard: vec![0, 2, 4] },
        )
        .await
        .unwrap();
    let GameUpdate::Settled(record) = update else {
        panic!("exchange should have used the last draw round");
    };
    assert_eq!(
        ledger.balance(PLAYER).await.unwrap(),
        1_000 - 100 + record.payout
    );

    // the record is what the display layer serializes for audit logs
    let encoded = serde_json::to_value(&record).unwrap();
    assert_eq!(encoded["wager"], 100);
    assert!(encoded["settlement_id"].is_string());
}

#[tokio::test]
async fn failed_settlement_keeps_the_session_for_retry() {
    let ledger = Arc::new(FlakyLedger::new(0));
    ledger.inner.set_balance(PLAYER, 1_000);
    let inventory = Arc::new(MemoryInventory::new());
    let engine = CasinoEngine::with_seed(
        EngineConfig::default(),
        ledger.clone(),
        inventory,
        13,
    );

    engine
        .begin_game(SessionKey(1), GameKind::Poker, &PLAYER.to_string(), 100, false)
        .await
        .unwrap();

    // next ledger adjustment (the settlement credit) fails
    ledger.failures_left.store(1, Ordering::SeqCst);
    let err = engine
        .submit_action(SessionKey(1), &PLAYER.to_string(), PlayerAction::Stand)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Transient);
    assert_eq!(engine.active_sessions(), 1);

    // the outcome is locked in; further play is rejected
    let err = engine
        .submit_action(SessionKey(1), &PLAYER.to_string(), PlayerAction::Stand)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::InvalidActionForPhase { .. }));

    let update = engine
        .retry_settlement(SessionKey(1), &PLAYER.to_string())
        .await
        .unwrap();
    assert!(matches!(update, GameUpdate::Settled(_)));
    assert_eq!(engine.active_sessions(), 0);
}

#[tokio::test]
async fn failed_wager_debit_rolls_the_session_back() {
    let ledger = Arc::new(FlakyLedger::new(0));
    ledger.inner.set_balance(PLAYER, 1_000);
    let inventory = Arc::new(MemoryInventory::new());
    let engine = CasinoEngine::with_seed(
        EngineConfig::default(),
        ledger.clone(),
        inventory,
        17,
    );

    ledger.failures_left.store(1, Ordering::SeqCst);
    let err = engine
        .begin_game(SessionKey(1), GameKind::Poker, &PLAYER.to_string(), 100, false)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Transient);
    assert_eq!(engine.active_sessions(), 0);

    // the key is free again once the ledger recovers
    engine
        .begin_game(SessionKey(1), GameKind::Poker, &PLAYER.to_string(), 100, false)
        .await
        .unwrap();
    assert_eq!(ledger.balance(PLAYER).await.unwrap(), 900);
}

#[tokio::test]
async fn bonus_item_amplifies_a_natural_and_is_consumed() {
    for seed in 0..5_000u64 {
        let mut config = EngineConfig::default();
        // keep the test about amplification, not the rigged deal
        config.bonus.lucky_deal_chance = 0.0;
        let (engine, ledger, inventory) = engine_with_config(config, seed, 1_000);
        inventory.grant(PLAYER, "insurance_card", 1);

        let update = engine
            .begin_game(SessionKey(1), GameKind::Blackjack, &PLAYER.to_string(), 100, true)
            .await
            .unwrap();
        assert_eq!(inventory.count(PLAYER, "insurance_card"), 0);

        if let GameUpdate::Settled(record) = update {
            assert!(record.bonus_applied);
            // 2.0x amplified to 3.0x
            assert_eq!(record.payout, 300);
            assert_eq!(ledger.balance(PLAYER).await.unwrap(), 1_200);
            return;
        }
    }
    panic!("no seed in range produced an opening natural");
}

#[tokio::test]
async fn guaranteed_lucky_deal_rigs_the_chinchiro_dice() {
    let mut config = EngineConfig::default();
    config.bonus.lucky_deal_chance = 1.0;
    let (engine, _, inventory) = engine_with_config(config, 19, 1_000);
    inventory.grant(PLAYER, "chinchiro_cup", 1);

    let update = engine
        .begin_game(SessionKey(1), GameKind::Chinchiro, &PLAYER.to_string(), 100, true)
        .await
        .unwrap();
    match update {
        GameUpdate::InProgress(SessionView::Chinchiro { dice, .. }) => {
            assert_eq!(dice, [1, 2, 4]);
        }
        other => panic!("unexpected update {:?}", other),
    }
}

#[tokio::test]
async fn expired_session_forfeits_the_stake_by_default() {
    let mut config = EngineConfig::default();
    config.expiry.idle_timeout_secs = 1;
    let (engine, ledger, _) = engine_with_config(config, 23, 1_000);

    engine
        .begin_game(SessionKey(1), GameKind::Poker, &PLAYER.to_string(), 100, false)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    let expired = engine.expire_idle().await;
    assert_eq!(expired.len(), 1);
    assert!(!expired[0].refunded);
    assert_eq!(engine.active_sessions(), 0);
    assert_eq!(ledger.balance(PLAYER).await.unwrap(), 900);
}

#[tokio::test]
async fn refund_policy_returns_the_wager_on_expiry() {
    let mut config = EngineConfig::default();
    config.expiry.idle_timeout_secs = 1;
    config.expiry.policy = ExpiryPolicy::Refund;
    let (engine, ledger, _) = engine_with_config(config, 29, 1_000);

    engine
        .begin_game(SessionKey(1), GameKind::Poker, &PLAYER.to_string(), 100, false)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    let expired = engine.expire_idle().await;
    assert_eq!(expired.len(), 1);
    assert!(expired[0].refunded);
    assert_eq!(ledger.balance(PLAYER).await.unwrap(), 1_000);
}

#[tokio::test]
async fn fresh_sessions_survive_the_idle_sweep() {
    let (engine, _, _) = engine(31, 1_000);
    engine
        .begin_game(SessionKey(1), GameKind::Poker, &PLAYER.to_string(), 100, false)
        .await
        .unwrap();

    let expired = engine.expire_idle().await;
    assert!(expired.is_empty());
    assert_eq!(engine.active_sessions(), 1);
}
