//! Bar-driven matching engine for the barmatch backtester.
//!
//! This crate provides:
//! - Market, limit and stop orders with take-profit/stop-loss attachments
//! - An order book that matches pending orders against OHLC bars
//! - Long/short position netting and P&L settlement
//! - Fee accounting and bar replay with performance metrics

pub mod exchange;
pub mod fee_model;
pub mod logging;
pub mod metrics;
pub mod order;
pub mod order_book;
pub mod position;
pub mod simulator;

pub use exchange::{BarReport, Exchange, ExchangeSummary, SettlementRecord};
pub use fee_model::FeeSchedule;
pub use logging::init_logging;
pub use metrics::{BacktestMetrics, EquityPoint, MetricsCalculator};
pub use order::{
    Fillable, FillableOrder, LimitOrder, MarketOrder, Order, OrderTerms, StopOrder, Triggerable,
    TriggerableOrder,
};
pub use order_book::{Execution, OrderBook};
pub use position::{Position, PositionLedger, SolvedTradingResult};
pub use simulator::{BacktestReport, BacktestSimulator, Strategy};
