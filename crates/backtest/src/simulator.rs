//! Backtest simulator.
//!
//! Replays a bar sequence through an [`Exchange`], letting a strategy place
//! orders as each bar arrives.

use barmatch_core::{Bar, Config, Result};
use serde::Serialize;
use tracing::info;

use crate::exchange::{Exchange, ExchangeSummary, SettlementRecord};
use crate::metrics::{BacktestMetrics, EquityPoint, MetricsCalculator};
use crate::order::Order;

/// Decides which orders to place on each bar.
pub trait Strategy {
    /// Called with each bar before it is matched. Orders returned here are
    /// admitted immediately but cannot execute before the following bar.
    fn on_bar(&mut self, bar: &Bar, exchange: &Exchange) -> Vec<Order>;
}

impl<F> Strategy for F
where
    F: FnMut(&Bar, &Exchange) -> Vec<Order>,
{
    fn on_bar(&mut self, bar: &Bar, exchange: &Exchange) -> Vec<Order> {
        self(bar, exchange)
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub summary: ExchangeSummary,
    pub metrics: BacktestMetrics,
    pub settlements: Vec<SettlementRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Backtest simulator state.
pub struct BacktestSimulator {
    config: Config,
    exchange: Exchange,
    metrics_calculator: MetricsCalculator,
}

impl BacktestSimulator {
    /// Create a new backtest simulator.
    pub fn new(config: Config) -> Result<Self> {
        let exchange = Exchange::from_config(&config)?;
        let metrics_calculator = MetricsCalculator::new(config.backtest.initial_capital);

        Ok(Self {
            config,
            exchange,
            metrics_calculator,
        })
    }

    /// Replay `bars` in order.
    pub fn run<S>(&mut self, bars: &[Bar], strategy: &mut S) -> Result<BacktestReport>
    where
        S: Strategy + ?Sized,
    {
        info!(
            symbol = %self.exchange.symbol(),
            bars = bars.len(),
            start = ?bars.first().and_then(Bar::datetime),
            "replay started"
        );

        for bar in bars {
            let orders = strategy.on_bar(bar, &self.exchange);
            if !orders.is_empty() {
                self.exchange.place_many(orders)?;
            }
            self.exchange.solve(bar)?;
        }

        let report = self.report();
        info!(
            symbol = %self.exchange.symbol(),
            settlements = report.metrics.total_settlements,
            net_pnl = report.metrics.net_pnl,
            pending_orders = report.summary.pending_orders,
            "replay finished"
        );
        Ok(report)
    }

    /// Report on everything replayed so far.
    pub fn report(&self) -> BacktestReport {
        let settlements = self.exchange.settlements().to_vec();
        BacktestReport {
            summary: self.exchange.result(),
            metrics: self
                .metrics_calculator
                .calculate(&settlements, self.exchange.total_fees()),
            equity_curve: self.metrics_calculator.build_equity_curve(&settlements),
            settlements,
        }
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut Exchange {
        &mut self.exchange
    }

    /// Reset the simulator.
    pub fn reset(&mut self) -> Result<()> {
        self.exchange = Exchange::from_config(&self.config)?;
        Ok(())
    }
}
