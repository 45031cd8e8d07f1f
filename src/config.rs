//! Engine configuration with validation, defaults, and environment
//! variable support.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::session::GameKind;

/// Configuration errors raised while loading or validating.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rules: RulesConfig,
    pub bonus: BonusConfig,
    pub settlement: SettlementConfig,
    pub expiry: ExpiryConfig,
}

/// Table rules shared by the game state machines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Dealer keeps drawing while its blackjack total is below this.
    pub dealer_stand_at: u8,
    /// Additional chinchiro rolls allowed after the opening roll.
    pub max_rerolls: u8,
    /// Poker card-exchange rounds allowed after the initial deal.
    pub max_draws: u8,
    /// Require 2x the wager on hand before a chinchiro game starts, so a
    /// hifumi double loss is always covered.
    pub hifumi_escrow: bool,
}

/// One-shot bonus item behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusConfig {
    /// Applied to the payout multiplier when a bonus item was consumed
    /// and the outcome is positive. Losses are never amplified.
    pub payout_multiplier: f64,
    /// Chance that a consumed bonus item also rigs the opening deal.
    pub lucky_deal_chance: f64,
    pub blackjack_item: String,
    pub chinchiro_item: String,
    pub poker_item: String,
    pub slot_item: String,
}

/// How a settlement may move a balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub negative_balance: NegativeBalancePolicy,
}

/// What happens when a negative payout (hifumi) exceeds the player's
/// remaining balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeBalancePolicy {
    /// Cap the debit so the balance never drops below zero.
    ClampToBalance,
    /// Apply the full debit even if the balance goes negative.
    AllowNegative,
}

/// Idle-session expiry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryConfig {
    /// Sessions with no player action for this long are expired.
    pub idle_timeout_secs: u64,
    pub policy: ExpiryPolicy,
}

/// What happens to the already-debited wager when a session expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// The stake is forfeited.
    Forfeit,
    /// The wager is credited back. Consumed bonus items are not restored.
    Refund,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules: RulesConfig::default(),
            bonus: BonusConfig::default(),
            settlement: SettlementConfig::default(),
            expiry: ExpiryConfig::default(),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            dealer_stand_at: 17,
            max_rerolls: 2,
            max_draws: 1,
            hifumi_escrow: true,
        }
    }
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            payout_multiplier: 1.5,
            lucky_deal_chance: 0.20,
            blackjack_item: "insurance_card".to_string(),
            chinchiro_item: "chinchiro_cup".to_string(),
            poker_item: "poker_chip".to_string(),
            slot_item: "risk_charm".to_string(),
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            negative_balance: NegativeBalancePolicy::ClampToBalance,
        }
    }
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 180,
            policy: ExpiryPolicy::Forfeit,
        }
    }
}

impl EngineConfig {
    /// Bonus item id consumed when `use_bonus` is set for a game kind.
    pub fn bonus_item(&self, kind: GameKind) -> &str {
        match kind {
            GameKind::Blackjack => &self.bonus.blackjack_item,
            GameKind::Chinchiro => &self.bonus.chinchiro_item,
            GameKind::Poker => &self.bonus.poker_item,
            GameKind::Slot => &self.bonus.slot_item,
        }
    }
}

/// Configuration loader with TOML file and environment variable support.
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path.
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables.
    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            EngineConfig::default()
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> Result<EngineConfig, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::LoadFailed(format!("failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(&self, config: &mut EngineConfig) -> Result<(), ConfigError> {
        if let Ok(stand_at) = env::var("PARLOR_DEALER_STAND_AT") {
            config.rules.dealer_stand_at =
                stand_at.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "PARLOR_DEALER_STAND_AT".to_string(),
                    value: stand_at,
                    reason: "expected an integer".to_string(),
                })?;
        }
        if let Ok(rerolls) = env::var("PARLOR_MAX_REROLLS") {
            config.rules.max_rerolls = rerolls.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PARLOR_MAX_REROLLS".to_string(),
                value: rerolls,
                reason: "expected an integer".to_string(),
            })?;
        }
        if let Ok(chance) = env::var("PARLOR_LUCKY_DEAL_CHANCE") {
            config.bonus.lucky_deal_chance =
                chance.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "PARLOR_LUCKY_DEAL_CHANCE".to_string(),
                    value: chance,
                    reason: "expected a float".to_string(),
                })?;
        }
        if let Ok(timeout) = env::var("PARLOR_IDLE_TIMEOUT_SECS") {
            config.expiry.idle_timeout_secs =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "PARLOR_IDLE_TIMEOUT_SECS".to_string(),
                    value: timeout,
                    reason: "expected an integer".to_string(),
                })?;
        }
        if let Ok(policy) = env::var("PARLOR_EXPIRY_POLICY") {
            config.expiry.policy = match policy.as_str() {
                "forfeit" => ExpiryPolicy::Forfeit,
                "refund" => ExpiryPolicy::Refund,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "PARLOR_EXPIRY_POLICY".to_string(),
                        value: policy,
                        reason: "expected 'forfeit' or 'refund'".to_string(),
                    })
                }
            };
        }

        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        if !(2..=21).contains(&config.rules.dealer_stand_at) {
            return Err(ConfigError::InvalidValue {
                field: "rules.dealer_stand_at".to_string(),
                value: config.rules.dealer_stand_at.to_string(),
                reason: "must be between 2 and 21".to_string(),
            });
        }

        if config.rules.max_draws == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rules.max_draws".to_string(),
                value: "0".to_string(),
                reason: "poker needs at least one exchange round".to_string(),
            });
        }

        if config.bonus.payout_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "bonus.payout_multiplier".to_string(),
                value: config.bonus.payout_multiplier.to_string(),
                reason: "a bonus must not reduce a win".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&config.bonus.lucky_deal_chance) {
            return Err(ConfigError::InvalidValue {
                field: "bonus.lucky_deal_chance".to_string(),
                value: config.bonus.lucky_deal_chance.to_string(),
                reason: "must be a probability in [0, 1]".to_string(),
            });
        }

        if config.expiry.idle_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "expiry.idle_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "timeout cannot be zero".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, config: &EngineConfig, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SaveFailed(format!("failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::SaveFailed(format!("failed to write to {}: {}", path, e)))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
