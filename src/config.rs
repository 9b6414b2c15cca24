// src/config.rs

use config::{Config, File};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("{field} must be {requirement}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
    },
}

/// Startup configuration, read once from `Settings.toml` plus `APP_`
/// environment overrides. Decimal values go in the file as strings.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub step_size: Decimal,
    pub max_volume: Decimal,
    pub sell_clearance: Decimal,
    pub buy_clearance: Decimal,
    pub liquidity_buffer: Decimal,
    pub poll_interval_secs: u64,
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
    /// Exchange lot step for outbound order quantities, if known.
    #[serde(default)]
    pub lot_step: Option<Decimal>,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
}

fn default_fee_rate() -> Decimal {
    dec!(0.002)
}

fn default_state_file() -> String {
    "stacker_state.json".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("Settings"))
            .add_source(config::Environment::with_prefix("APP"));

        let config = builder.build()?;
        Ok(config.try_deserialize::<AppConfig>()?)
    }
}

/// Runtime trading parameters. Mutable only through `configure`; any
/// accepted change stops the engine so a tick never observes a half-applied
/// configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_asset: String,
    pub quote_asset: String,
    /// Quantity bought per step, in base units.
    pub step_size: Decimal,
    /// Position quantity ceiling.
    pub max_volume: Decimal,
    pub sell_clearance: Decimal,
    pub buy_clearance: Decimal,
    pub liquidity_buffer: Decimal,
    pub poll_interval: Duration,
    pub fee_rate: Decimal,
}

impl EngineConfig {
    pub fn from_app(app: &AppConfig) -> Result<Self, ConfigError> {
        let config = Self {
            base_asset: app.base_asset.clone(),
            quote_asset: app.quote_asset.clone(),
            step_size: app.step_size,
            max_volume: app.max_volume,
            sell_clearance: app.sell_clearance,
            buy_clearance: app.buy_clearance,
            liquidity_buffer: app.liquidity_buffer,
            poll_interval: Duration::from_secs(app.poll_interval_secs),
            fee_rate: app.fee_rate,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn symbol(&self) -> String {
        format!("{}{}", self.base_asset, self.quote_asset)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive("step_size", self.step_size)?;
        positive("max_volume", self.max_volume)?;
        not_negative("fee_rate", self.fee_rate)?;
        not_negative("sell_clearance", self.sell_clearance)?;
        not_negative("buy_clearance", self.buy_clearance)?;
        not_negative("liquidity_buffer", self.liquidity_buffer)?;
        if self.poll_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "poll_interval_secs",
                requirement: "strictly positive",
            });
        }
        Ok(())
    }

    /// Applies every in-range override and reports field-by-field what
    /// changed and what was rejected. Out-of-range values never clobber a
    /// working configuration.
    pub fn apply(&mut self, overrides: &ConfigOverrides) -> OverrideOutcome {
        let mut outcome = OverrideOutcome::default();

        if let Some(buy) = overrides.buy {
            if buy >= Decimal::ZERO {
                self.buy_clearance = buy;
                outcome.applied.push("buy");
            } else {
                outcome.rejected.push("buy");
            }
        }
        if let Some(sell) = overrides.sell {
            if sell >= Decimal::ZERO {
                self.sell_clearance = sell;
                outcome.applied.push("sell");
            } else {
                outcome.rejected.push("sell");
            }
        }
        if let Some(buffer) = overrides.buffer {
            if buffer >= Decimal::ZERO {
                self.liquidity_buffer = buffer;
                outcome.applied.push("buffer");
            } else {
                outcome.rejected.push("buffer");
            }
        }
        if let Some(limit) = overrides.limit {
            if limit > Decimal::ZERO {
                self.max_volume = limit;
                outcome.applied.push("limit");
            } else {
                outcome.rejected.push("limit");
            }
        }
        if let Some(step) = overrides.step {
            if step > Decimal::ZERO {
                self.step_size = step;
                outcome.applied.push("step");
            } else {
                outcome.rejected.push("step");
            }
        }
        if let Some(interval) = overrides.interval {
            match interval_duration(interval) {
                Some(duration) => {
                    self.poll_interval = duration;
                    outcome.applied.push("interval");
                }
                None => outcome.rejected.push("interval"),
            }
        }

        outcome
    }
}

fn positive(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            requirement: "strictly positive",
        })
    }
}

fn not_negative(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            requirement: "zero or positive",
        })
    }
}

fn interval_duration(seconds: Decimal) -> Option<Duration> {
    if seconds <= Decimal::ZERO {
        return None;
    }
    (seconds * dec!(1000)).to_u64().map(Duration::from_millis)
}

/// Recognized `set` fields, already numeric. Absent fields stay untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub buy: Option<Decimal>,
    pub sell: Option<Decimal>,
    pub limit: Option<Decimal>,
    pub step: Option<Decimal>,
    /// Poll interval in seconds.
    pub interval: Option<Decimal>,
    pub buffer: Option<Decimal>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which override fields were applied and which failed validation.
#[derive(Debug, Default, PartialEq)]
pub struct OverrideOutcome {
    pub applied: Vec<&'static str>,
    pub rejected: Vec<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EngineConfig {
        EngineConfig {
            base_asset: "USDT".to_string(),
            quote_asset: "EUR".to_string(),
            step_size: dec!(20),
            max_volume: dec!(500),
            sell_clearance: dec!(0.02),
            buy_clearance: dec!(0.02),
            liquidity_buffer: Decimal::ZERO,
            poll_interval: Duration::from_secs(10),
            fee_rate: dec!(0.002),
        }
    }

    #[test]
    fn valid_overrides_apply() {
        let mut config = test_config();
        let outcome = config.apply(&ConfigOverrides {
            buy: Some(dec!(0.5)),
            sell: Some(dec!(1.5)),
            limit: Some(dec!(1000)),
            ..Default::default()
        });

        assert_eq!(outcome.applied, vec!["buy", "sell", "limit"]);
        assert!(outcome.rejected.is_empty());
        assert_eq!(config.buy_clearance, dec!(0.5));
        assert_eq!(config.sell_clearance, dec!(1.5));
        assert_eq!(config.max_volume, dec!(1000));
    }

    #[test]
    fn out_of_range_fields_are_rejected_individually() {
        let mut config = test_config();
        let outcome = config.apply(&ConfigOverrides {
            step: Some(dec!(-5)),
            sell: Some(dec!(0)),
            interval: Some(dec!(0)),
            ..Default::default()
        });

        assert_eq!(outcome.applied, vec!["sell"]);
        assert_eq!(outcome.rejected, vec!["step", "interval"]);
        assert_eq!(config.step_size, dec!(20));
        assert_eq!(config.sell_clearance, Decimal::ZERO);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn interval_accepts_fractional_seconds() {
        let mut config = test_config();
        let outcome = config.apply(&ConfigOverrides {
            interval: Some(dec!(2.5)),
            ..Default::default()
        });

        assert_eq!(outcome.applied, vec!["interval"]);
        assert_eq!(config.poll_interval, Duration::from_millis(2500));
    }

    #[test]
    fn zero_clearances_are_valid_at_startup() {
        let mut config = test_config();
        config.sell_clearance = Decimal::ZERO;
        config.buy_clearance = Decimal::ZERO;
        assert!(config.validate().is_ok());

        config.step_size = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_overrides_change_nothing() {
        let mut config = test_config();
        let before = format!("{config:?}");
        let outcome = config.apply(&ConfigOverrides::default());

        assert!(outcome.applied.is_empty());
        assert!(outcome.rejected.is_empty());
        assert_eq!(format!("{config:?}"), before);
    }
}
