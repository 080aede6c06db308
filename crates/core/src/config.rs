//! Configuration structures for the barmatch system.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration for a simulated exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Instrument configuration.
    pub instrument: InstrumentConfig,
    /// Fee configuration.
    pub fees: FeeConfig,
    /// Backtest configuration.
    pub backtest: BacktestConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing sections and fields take
    /// their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.instrument.symbol.trim().is_empty() {
            return Err(Error::config("instrument.symbol must not be empty"));
        }
        if !self.fees.market_fee_rate.is_finite() {
            return Err(Error::config("fees.market_fee_rate must be finite"));
        }
        if !self.fees.limit_fee_rate.is_finite() {
            return Err(Error::config("fees.limit_fee_rate must be finite"));
        }
        if !(self.backtest.initial_capital.is_finite() && self.backtest.initial_capital > 0.0) {
            return Err(Error::config("backtest.initial_capital must be positive"));
        }
        Ok(())
    }
}

/// Instrument-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Trading symbol (e.g., "BTCUSDT").
    pub symbol: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
        }
    }
}

/// Fee rates, as fractions of executed notional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Rate charged on market executions (including triggered stops).
    pub market_fee_rate: f64,
    /// Rate charged on limit executions (negative = rebate).
    pub limit_fee_rate: f64,
}

/// Backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Initial capital for return and drawdown figures.
    pub initial_capital: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10000.0,
        }
    }
}
