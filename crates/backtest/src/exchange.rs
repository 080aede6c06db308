//! Simulated exchange for one instrument.
//!
//! Wires the order book and the position ledger together, collects fees
//! and keeps the settlement history.

use std::collections::BTreeMap;

use barmatch_core::{Bar, Config, OrderId, Result, TimestampMs};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fee_model::FeeSchedule;
use crate::order::Order;
use crate::order_book::{Execution, OrderBook};
use crate::position::{Position, PositionLedger, SolvedTradingResult};

/// A non-empty settlement and the bar it happened on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Bar timestamp.
    pub ts_ms: TimestampMs,
    /// Settlement outcome.
    #[serde(flatten)]
    pub result: SolvedTradingResult,
}

/// Everything that happened while solving one bar.
#[derive(Debug, Clone)]
pub struct BarReport {
    /// Bar timestamp.
    pub ts_ms: TimestampMs,
    /// Executions in admission order.
    pub executions: Vec<Execution>,
    /// Fees charged on this bar's executions.
    pub fees: f64,
    /// Settlement performed after the executions were netted.
    pub settlement: SolvedTradingResult,
}

/// Running totals of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSummary {
    pub symbol: String,
    /// Sum of settlement P&L.
    pub realized_pnl: f64,
    /// Sum of fees charged.
    pub total_fees: f64,
    /// Realized P&L after fees.
    pub net_pnl: f64,
    /// Open long remainder.
    pub long: Position,
    /// Open short remainder.
    pub short: Position,
    /// Orders still waiting in the book.
    pub pending_orders: usize,
    /// Number of bars solved.
    pub bars_processed: u64,
}

/// Simulated exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    symbol: String,
    fees: FeeSchedule,
    order_book: OrderBook,
    ledger: PositionLedger,
    /// Fee charged per executed order.
    fee_history: BTreeMap<OrderId, f64>,
    settlements: Vec<SettlementRecord>,
    realized_pnl: f64,
    total_fees: f64,
    bars_processed: u64,
}

impl Exchange {
    /// Create an exchange with the given fee schedule.
    pub fn new(symbol: impl Into<String>, fees: FeeSchedule) -> Self {
        Self {
            symbol: symbol.into(),
            fees,
            order_book: OrderBook::new(),
            ledger: PositionLedger::new(),
            fee_history: BTreeMap::new(),
            settlements: Vec::new(),
            realized_pnl: 0.0,
            total_fees: 0.0,
            bars_processed: 0,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let fees = FeeSchedule::from_config(&config.fees)?;
        Ok(Self::new(config.instrument.symbol.clone(), fees))
    }

    /// Submit an order. It becomes eligible from the bar after the next solve.
    pub fn place(&mut self, order: impl Into<Order>) -> Result<OrderId> {
        self.order_book.admit(order)
    }

    /// Submit several orders; none are placed if any is invalid.
    pub fn place_many(&mut self, orders: impl IntoIterator<Item = Order>) -> Result<Vec<OrderId>> {
        self.order_book.admit_many(orders)
    }

    pub fn cancel(&mut self, id: OrderId) -> Option<Order> {
        self.order_book.cancel(id)
    }

    /// Match pending orders against a bar, charge fees, net the fills and settle.
    pub fn solve(&mut self, bar: &Bar) -> Result<BarReport> {
        bar.validate()?;

        let executions = self.order_book.step(bar.high, bar.low);

        let mut fees = 0.0;
        for execution in &executions {
            let fee = self.fees.fee(execution.order.kind(), &execution.position);
            self.fee_history.insert(execution.order_id, fee);
            fees += fee;
        }

        for execution in &executions {
            self.ledger.add(execution.position);
        }
        let settlement = self.ledger.settle();

        self.total_fees += fees;
        if !settlement.is_empty() {
            self.realized_pnl += settlement.pnl;
            self.settlements.push(SettlementRecord {
                ts_ms: bar.ts_ms,
                result: settlement,
            });
        }
        self.bars_processed += 1;

        if !executions.is_empty() {
            debug!(
                symbol = %self.symbol,
                ts_ms = bar.ts_ms,
                executions = executions.len(),
                fees,
                pnl = settlement.pnl,
                "bar solved"
            );
        }

        Ok(BarReport {
            ts_ms: bar.ts_ms,
            executions,
            fees,
            settlement,
        })
    }

    /// Snapshot of the running totals.
    pub fn result(&self) -> ExchangeSummary {
        ExchangeSummary {
            symbol: self.symbol.clone(),
            realized_pnl: self.realized_pnl,
            total_fees: self.total_fees,
            net_pnl: self.realized_pnl - self.total_fees,
            long: *self.ledger.long(),
            short: *self.ledger.short(),
            pending_orders: self.order_book.len(),
            bars_processed: self.bars_processed,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn order_book(&self) -> &OrderBook {
        &self.order_book
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn fee_history(&self) -> &BTreeMap<OrderId, f64> {
        &self.fee_history
    }

    pub fn settlements(&self) -> &[SettlementRecord] {
        &self.settlements
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn total_fees(&self) -> f64 {
        self.total_fees
    }
}
