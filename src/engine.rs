//! The casino engine: session lifecycle, wager escrow, action dispatch,
//! and settlement orchestration.
//!
//! All game-state transitions run synchronously under the session map
//! guard; every ledger and inventory call happens outside it. The RNG
//! mutex is likewise never held across an await point.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::config::{EngineConfig, ExpiryPolicy};
use crate::errors::{GameError, GameResult};
use crate::games::{self, GameOutcome};
use crate::ledger::{AccountId, InventoryService, LedgerService};
use crate::session::{
    GameKind, GameSession, HandState, Phase, SessionKey, SessionStore, SessionView,
};
use crate::settlement::{Settled, SettlementBridge};

/// A move submitted against an in-flight session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerAction {
    /// Blackjack: draw another card.
    Hit,
    /// Accept the current hand; the game resolves as it stands.
    Stand,
    /// Chinchiro: throw all three dice again.
    Reroll,
    /// Poker: exchange the cards at these indices. Empty is a legal
    /// stand-pat exchange that still spends the round.
    Draw { discard: Vec<usize> },
}

/// Result of starting a game or submitting an action.
#[derive(Debug)]
pub enum GameUpdate {
    /// The game continues; render this and wait for the next action.
    InProgress(SessionView),
    /// The game resolved and the ledger was updated.
    Settled(Settled),
}

/// A session that was removed by the idle sweep.
#[derive(Debug, Clone)]
pub struct ExpiredSession {
    pub key: SessionKey,
    pub kind: GameKind,
    pub owner: AccountId,
    pub wager: u64,
    pub refunded: bool,
}

enum Step {
    Continue,
    Resolve,
}

/// Coordinates the session store, the game evaluators, and the economy
/// services behind a single async facade.
pub struct CasinoEngine {
    config: EngineConfig,
    store: SessionStore,
    ledger: Arc<dyn LedgerService>,
    inventory: Arc<dyn InventoryService>,
    bridge: SettlementBridge,
    rng: Mutex<StdRng>,
}

impl CasinoEngine {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn LedgerService>,
        inventory: Arc<dyn InventoryService>,
    ) -> Self {
        Self::build(config, ledger, inventory, StdRng::from_entropy())
    }

    /// Engine with a deterministic RNG, for reproducible games.
    pub fn with_seed(
        config: EngineConfig,
        ledger: Arc<dyn LedgerService>,
        inventory: Arc<dyn InventoryService>,
        seed: u64,
    ) -> Self {
        Self::build(config, ledger, inventory, StdRng::seed_from_u64(seed))
    }

    fn build(
        config: EngineConfig,
        ledger: Arc<dyn LedgerService>,
        inventory: Arc<dyn InventoryService>,
        rng: StdRng,
    ) -> Self {
        let bridge = SettlementBridge::new(
            ledger.clone(),
            config.settlement.negative_balance,
            config.bonus.payout_multiplier,
        );
        Self {
            config,
            store: SessionStore::new(),
            ledger,
            inventory,
            bridge,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }

    /// Start a game: verify funds, optionally consume a bonus item,
    /// deal, escrow the wager, and resolve immediately for games with
    /// no interactive phase.
    pub async fn begin_game(
        &self,
        key: SessionKey,
        kind: GameKind,
        owner: &AccountId,
        wager: u64,
        use_bonus: bool,
    ) -> GameResult<GameUpdate> {
        if wager == 0 {
            return Err(GameError::InvalidWager);
        }
        // Reject the key before any balance or inventory side effect;
        // create() re-checks under the map guard after the deal.
        if self.store.contains(key) {
            return Err(GameError::SessionExists);
        }

        // Chinchiro can lose double the wager on hifumi, so demand the
        // full exposure up front when the escrow rule is on.
        let required = if kind == GameKind::Chinchiro && self.config.rules.hifumi_escrow {
            2 * wager
        } else {
            wager
        };
        let available = self.ledger.balance(owner).await?;
        if available < required as i64 {
            return Err(GameError::InsufficientBalance {
                required: required as i64,
                available,
            });
        }

        let bonus_consumed = if use_bonus {
            let item_id = self.config.bonus_item(kind);
            if !self.inventory.consume_one(owner, item_id).await? {
                return Err(GameError::NoBonusItem {
                    item_id: item_id.to_string(),
                });
            }
            true
        } else {
            false
        };

        let session = {
            let mut rng = self.rng.lock().expect("rng mutex poisoned");
            let lucky = bonus_consumed && rng.gen::<f64>() < self.config.bonus.lucky_deal_chance;
            self.deal_session(&mut rng, key, kind, owner.clone(), wager, bonus_consumed, lucky)
        };
        let resolved = session.phase == Phase::Resolved;
        self.store.create(session)?;

        if let Err(err) = self.ledger.adjust(owner, -(wager as i64)).await {
            self.store.remove(key);
            if bonus_consumed {
                warn!(
                    session = %key,
                    account = %owner,
                    "wager debit failed after bonus item was consumed"
                );
            }
            return Err(err.into());
        }

        info!(
            session = %key,
            game = %kind,
            account = %owner,
            wager,
            bonus_consumed,
            "game started"
        );

        if resolved {
            return self.finish(key).await;
        }

        let view = self
            .store
            .with_session_mut(key, |session| Ok(session.view(&self.config.rules)))?;
        Ok(GameUpdate::InProgress(view))
    }

    fn deal_session(
        &self,
        rng: &mut StdRng,
        key: SessionKey,
        kind: GameKind,
        owner: AccountId,
        wager: u64,
        bonus_consumed: bool,
        lucky: bool,
    ) -> GameSession {
        let mut session = match kind {
            GameKind::Blackjack => {
                let hand = games::blackjack::deal(rng, lucky);
                let natural = games::blackjack::is_natural(&hand);
                let mut s = GameSession::new(
                    key,
                    kind,
                    owner,
                    wager,
                    bonus_consumed,
                    Phase::PlayerTurn,
                    HandState::Blackjack(hand),
                );
                if natural {
                    s.resolve(GameOutcome::Blackjack(games::BlackjackOutcome::Natural));
                }
                s
            }
            GameKind::Chinchiro => {
                let hand = games::chinchiro::deal(rng, lucky);
                let outcome = games::chinchiro::evaluate(hand.dice);
                let mut s = GameSession::new(
                    key,
                    kind,
                    owner,
                    wager,
                    bonus_consumed,
                    Phase::PlayerChoice,
                    HandState::Chinchiro(hand),
                );
                // A named hand on the opening roll ends the game on the
                // spot; only a no-hand roll earns a reroll choice.
                if outcome.is_named() {
                    s.resolve(GameOutcome::Chinchiro(outcome));
                }
                s
            }
            GameKind::Poker => {
                let hand = games::poker::deal(rng, lucky);
                GameSession::new(
                    key,
                    kind,
                    owner,
                    wager,
                    bonus_consumed,
                    Phase::DrawChoice,
                    HandState::Poker(hand),
                )
            }
            GameKind::Slot => {
                let reels = games::slot::spin(rng, lucky);
                let outcome = games::slot::evaluate(reels);
                let mut s = GameSession::new(
                    key,
                    kind,
                    owner,
                    wager,
                    bonus_consumed,
                    Phase::Resolved,
                    HandState::Slot { reels },
                );
                s.outcome = Some(GameOutcome::Slot(outcome));
                s
            }
        };
        session.touch();
        session
    }

    /// Apply a player action to an in-flight session.
    pub async fn submit_action(
        &self,
        key: SessionKey,
        actor: &AccountId,
        action: PlayerAction,
    ) -> GameResult<GameUpdate> {
        let step = self.store.with_session_mut(key, |session| {
            if &session.owner != actor {
                return Err(GameError::WrongActor);
            }
            let mut rng = self.rng.lock().expect("rng mutex poisoned");
            let step = self.advance(session, &mut rng, &action)?;
            session.touch();
            Ok(step)
        })?;

        match step {
            Step::Resolve => self.finish(key).await,
            Step::Continue => {
                let view = self
                    .store
                    .with_session_mut(key, |session| Ok(session.view(&self.config.rules)))?;
                Ok(GameUpdate::InProgress(view))
            }
        }
    }

    fn advance(
        &self,
        session: &mut GameSession,
        rng: &mut StdRng,
        action: &PlayerAction,
    ) -> GameResult<Step> {
        let rules = &self.config.rules;
        match (&mut session.hand, action) {
            (HandState::Blackjack(hand), PlayerAction::Hit) => {
                if session.phase != Phase::PlayerTurn {
                    return Err(GameError::InvalidActionForPhase {
                        phase: session.phase,
                    });
                }
                match games::blackjack::hit(hand, rng) {
                    Some(outcome) => {
                        session.resolve(GameOutcome::Blackjack(outcome));
                        Ok(Step::Resolve)
                    }
                    None => Ok(Step::Continue),
                }
            }
            (HandState::Blackjack(hand), PlayerAction::Stand) => {
                if session.phase != Phase::PlayerTurn {
                    return Err(GameError::InvalidActionForPhase {
                        phase: session.phase,
                    });
                }
                let outcome = games::blackjack::stand(hand, rng, rules.dealer_stand_at);
                session.resolve(GameOutcome::Blackjack(outcome));
                Ok(Step::Resolve)
            }
            (HandState::Chinchiro(hand), PlayerAction::Reroll) => {
                if session.phase != Phase::PlayerChoice {
                    return Err(GameError::InvalidActionForPhase {
                        phase: session.phase,
                    });
                }
                if hand.rerolls_used >= rules.max_rerolls {
                    return Err(GameError::RerollsExhausted {
                        max: rules.max_rerolls,
                    });
                }
                games::chinchiro::reroll(hand, rng);
                // A reroll never locks in its result; the player may
                // throw again or stand. Only the opening roll resolves
                // on a named hand, and only the final permitted throw
                // settles as it lands.
                if hand.rerolls_used >= rules.max_rerolls {
                    let outcome = games::chinchiro::evaluate(hand.dice);
                    session.resolve(GameOutcome::Chinchiro(outcome));
                    Ok(Step::Resolve)
                } else {
                    Ok(Step::Continue)
                }
            }
            (HandState::Chinchiro(hand), PlayerAction::Stand) => {
                if session.phase != Phase::PlayerChoice {
                    return Err(GameError::InvalidActionForPhase {
                        phase: session.phase,
                    });
                }
                let outcome = games::chinchiro::evaluate(hand.dice);
                session.resolve(GameOutcome::Chinchiro(outcome));
                Ok(Step::Resolve)
            }
            (HandState::Poker(hand), PlayerAction::Draw { discard }) => {
                if session.phase != Phase::DrawChoice {
                    return Err(GameError::InvalidActionForPhase {
                        phase: session.phase,
                    });
                }
                if hand.draws_used >= rules.max_draws {
                    return Err(GameError::DrawExhausted {
                        max: rules.max_draws,
                    });
                }
                games::poker::exchange(hand, rng, discard)?;
                if hand.draws_used >= rules.max_draws {
                    let outcome = games::poker::evaluate(&hand.cards);
                    session.resolve(GameOutcome::Poker(outcome));
                    Ok(Step::Resolve)
                } else {
                    Ok(Step::Continue)
                }
            }
            (HandState::Poker(hand), PlayerAction::Stand) => {
                if session.phase != Phase::DrawChoice {
                    return Err(GameError::InvalidActionForPhase {
                        phase: session.phase,
                    });
                }
                let outcome = games::poker::evaluate(&hand.cards);
                session.resolve(GameOutcome::Poker(outcome));
                Ok(Step::Resolve)
            }
            _ => Err(GameError::InvalidActionForPhase {
                phase: session.phase,
            }),
        }
    }

    /// Settle a resolved session. The session is removed only after the
    /// ledger confirms; a failed ledger call puts it back in `Resolved`
    /// so the settlement can be retried.
    async fn finish(&self, key: SessionKey) -> GameResult<GameUpdate> {
        let (owner, wager, outcome, bonus_consumed, view) =
            self.store.with_session_mut(key, |session| {
                match session.phase {
                    Phase::Settling => return Err(GameError::SettlementInProgress),
                    Phase::Resolved => {}
                    phase => return Err(GameError::InvalidActionForPhase { phase }),
                }
                let outcome = session.outcome.ok_or(GameError::InvalidActionForPhase {
                    phase: session.phase,
                })?;
                session.phase = Phase::Settling;
                Ok((
                    session.owner.clone(),
                    session.wager,
                    outcome,
                    session.bonus_consumed,
                    session.view(&self.config.rules),
                ))
            })?;

        match self
            .bridge
            .settle(key, &owner, wager, outcome, bonus_consumed, view)
            .await
        {
            Ok(record) => {
                self.store.remove(key);
                Ok(GameUpdate::Settled(record))
            }
            Err(err) => {
                warn!(session = %key, error = %err, "settlement failed, keeping session for retry");
                let _ = self.store.with_session_mut(key, |session| {
                    session.phase = Phase::Resolved;
                    Ok(())
                });
                Err(err)
            }
        }
    }

    /// Retry settlement for a session whose ledger call failed earlier.
    pub async fn retry_settlement(
        &self,
        key: SessionKey,
        actor: &AccountId,
    ) -> GameResult<GameUpdate> {
        self.store.with_session_mut(key, |session| {
            if &session.owner != actor {
                return Err(GameError::WrongActor);
            }
            Ok(())
        })?;
        self.finish(key).await
    }

    /// Current renderable state of a session, for re-display.
    pub fn session_view(&self, key: SessionKey) -> GameResult<SessionView> {
        self.store
            .with_session_mut(key, |session| Ok(session.view(&self.config.rules)))
    }

    /// Sweep sessions idle past the configured timeout. Settling
    /// sessions are left alone. Under the refund policy a failed ledger
    /// credit puts the session back so a later sweep can retry it.
    pub async fn expire_idle(&self) -> Vec<ExpiredSession> {
        let timeout = Duration::from_secs(self.config.expiry.idle_timeout_secs);
        let mut expired = Vec::new();

        for key in self.store.idle_keys(timeout) {
            let Some(session) = self.store.remove(key) else {
                continue;
            };
            if session.phase == Phase::Settling {
                if !self.store.restore(session) {
                    warn!(session = %key, "key reclaimed while sweeping a settling session");
                }
                continue;
            }

            let refunded = match self.config.expiry.policy {
                ExpiryPolicy::Forfeit => false,
                ExpiryPolicy::Refund => {
                    match self.ledger.adjust(&session.owner, session.wager as i64).await {
                        Ok(_) => true,
                        Err(err) => {
                            warn!(
                                session = %key,
                                error = %err,
                                "expiry refund failed, keeping session for the next sweep"
                            );
                            if !self.store.restore(session) {
                                warn!(
                                    session = %key,
                                    "key reclaimed during refund, stake forfeited"
                                );
                            }
                            continue;
                        }
                    }
                }
            };

            info!(
                session = %key,
                game = %session.kind,
                account = %session.owner,
                refunded,
                "expired idle session"
            );
            expired.push(ExpiredSession {
                key,
                kind: session.kind,
                owner: session.owner,
                wager: session.wager,
                refunded,
            });
        }

        expired
    }
}
