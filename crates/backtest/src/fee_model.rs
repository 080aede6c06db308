//! Fee model for backtesting.
//!
//! Charges a rate proportional to executed notional, by order type.

use barmatch_core::config::FeeConfig;
use barmatch_core::{Error, OrderKind, Result};

use crate::position::Position;

/// Fee rates per order type.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeeSchedule {
    /// Rate for market executions.
    market_rate: f64,
    /// Rate for limit executions (negative = rebate).
    limit_rate: f64,
}

impl FeeSchedule {
    /// Create a fee schedule. Rates must be finite.
    pub fn new(market_rate: f64, limit_rate: f64) -> Result<Self> {
        if !market_rate.is_finite() || !limit_rate.is_finite() {
            return Err(Error::config(format!(
                "fee rates must be finite (market {}, limit {})",
                market_rate, limit_rate
            )));
        }
        Ok(Self {
            market_rate,
            limit_rate,
        })
    }

    /// No fees.
    pub fn free() -> Self {
        Self::default()
    }

    pub fn from_config(config: &FeeConfig) -> Result<Self> {
        Self::new(config.market_fee_rate, config.limit_fee_rate)
    }

    /// Rate charged for an execution of the given order type.
    ///
    /// Stops execute as market orders once triggered.
    pub fn rate(&self, kind: OrderKind) -> f64 {
        match kind {
            OrderKind::Market | OrderKind::Stop => self.market_rate,
            OrderKind::Limit => self.limit_rate,
        }
    }

    /// Fee for the position produced by an execution.
    pub fn fee(&self, kind: OrderKind, position: &Position) -> f64 {
        self.rate(kind) * position.notional()
    }
}
