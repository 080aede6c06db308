//! PyO3 bindings for the barmatch engine.
//!
//! Exposes the simulated exchange to Python:
//! - Market, limit and stop order placement with take-profit / stop-loss
//! - Bar-by-bar solving
//! - Position and settlement snapshots

use std::collections::BTreeMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use barmatch_backtest::{
    ExchangeSummary as RustExchangeSummary, Exchange as RustExchange, FeeSchedule, LimitOrder,
    MarketOrder, Order, Position as RustPosition, SolvedTradingResult as RustSolvedTradingResult,
    StopOrder,
};
use barmatch_core::{Bar as RustBar, Config as RustConfig, Error as RustError, OrderId, Side};

fn to_py_err(err: RustError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn parse_side(side: &str) -> PyResult<Side> {
    side.parse::<Side>().map_err(to_py_err)
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// One OHLC bar.
#[pyclass]
#[derive(Clone)]
pub struct Bar {
    #[pyo3(get, set)]
    pub ts_ms: i64,
    #[pyo3(get, set)]
    pub open: f64,
    #[pyo3(get, set)]
    pub high: f64,
    #[pyo3(get, set)]
    pub low: f64,
    #[pyo3(get, set)]
    pub close: f64,
}

#[pymethods]
impl Bar {
    #[new]
    fn new(ts_ms: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Bar {
            ts_ms,
            open,
            high,
            low,
            close,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Bar(ts_ms={}, open={}, high={}, low={}, close={})",
            self.ts_ms, self.open, self.high, self.low, self.close
        )
    }
}

impl From<Bar> for RustBar {
    fn from(b: Bar) -> Self {
        RustBar::new(b.ts_ms, b.open, b.high, b.low, b.close)
    }
}

/// Accumulated position on one side.
#[pyclass]
#[derive(Clone)]
pub struct Position {
    #[pyo3(get)]
    pub size: f64,
    #[pyo3(get)]
    pub price: f64,
    #[pyo3(get)]
    pub side: String,
}

#[pymethods]
impl Position {
    #[getter]
    fn is_empty(&self) -> bool {
        self.size == 0.0
    }

    fn __repr__(&self) -> String {
        format!(
            "Position(size={}, price={}, side={})",
            self.size, self.price, self.side
        )
    }
}

impl From<RustPosition> for Position {
    fn from(p: RustPosition) -> Self {
        Position {
            size: p.size(),
            price: p.price(),
            side: p.side().to_string(),
        }
    }
}

/// Outcome of offsetting long against short.
#[pyclass]
#[derive(Clone)]
pub struct SolvedTradingResult {
    #[pyo3(get)]
    pub size: f64,
    #[pyo3(get)]
    pub long_price: f64,
    #[pyo3(get)]
    pub short_price: f64,
    #[pyo3(get)]
    pub pnl: f64,
}

#[pymethods]
impl SolvedTradingResult {
    fn __repr__(&self) -> String {
        format!(
            "SolvedTradingResult(size={}, long_price={}, short_price={}, pnl={})",
            self.size, self.long_price, self.short_price, self.pnl
        )
    }
}

impl From<RustSolvedTradingResult> for SolvedTradingResult {
    fn from(r: RustSolvedTradingResult) -> Self {
        SolvedTradingResult {
            size: r.size,
            long_price: r.long_price,
            short_price: r.short_price,
            pnl: r.pnl,
        }
    }
}

/// Running totals of an exchange.
#[pyclass]
#[derive(Clone)]
pub struct ExchangeSummary {
    #[pyo3(get)]
    pub symbol: String,
    #[pyo3(get)]
    pub realized_pnl: f64,
    #[pyo3(get)]
    pub total_fees: f64,
    #[pyo3(get)]
    pub net_pnl: f64,
    #[pyo3(get)]
    pub long: Position,
    #[pyo3(get)]
    pub short: Position,
    #[pyo3(get)]
    pub pending_orders: usize,
    #[pyo3(get)]
    pub bars_processed: u64,
}

impl From<RustExchangeSummary> for ExchangeSummary {
    fn from(s: RustExchangeSummary) -> Self {
        ExchangeSummary {
            symbol: s.symbol,
            realized_pnl: s.realized_pnl,
            total_fees: s.total_fees,
            net_pnl: s.net_pnl,
            long: s.long.into(),
            short: s.short.into(),
            pending_orders: s.pending_orders,
            bars_processed: s.bars_processed,
        }
    }
}

// ============================================================================
// Python-exposed Engine Classes
// ============================================================================

/// Simulated exchange for one instrument.
#[pyclass(name = "Exchange")]
pub struct PyExchange {
    inner: RustExchange,
}

impl PyExchange {
    fn place_order(&mut self, order: impl Into<Order>) -> PyResult<u64> {
        self.inner
            .place(order)
            .map(OrderId::value)
            .map_err(to_py_err)
    }
}

#[pymethods]
impl PyExchange {
    #[new]
    #[pyo3(signature = (symbol, market_fee_rate=0.0, limit_fee_rate=0.0))]
    fn new(symbol: String, market_fee_rate: f64, limit_fee_rate: f64) -> PyResult<Self> {
        let fees = FeeSchedule::new(market_fee_rate, limit_fee_rate).map_err(to_py_err)?;
        Ok(PyExchange {
            inner: RustExchange::new(symbol, fees),
        })
    }

    /// Create from a JSON config document.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = RustConfig::from_json_str(json).map_err(to_py_err)?;
        Ok(PyExchange {
            inner: RustExchange::from_config(&config).map_err(to_py_err)?,
        })
    }

    /// Place a market order. Returns its identifier.
    #[pyo3(signature = (size, price, side, take_profit=None, stop_loss=None))]
    fn place_market(
        &mut self,
        size: f64,
        price: f64,
        side: &str,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> PyResult<u64> {
        let mut order = MarketOrder::new(size, price, parse_side(side)?).map_err(to_py_err)?;
        if let Some(tp) = take_profit {
            order = order.with_take_profit(tp);
        }
        if let Some(sl) = stop_loss {
            order = order.with_stop_loss(sl);
        }
        self.place_order(order)
    }

    /// Place a limit order. Returns its identifier.
    #[pyo3(signature = (size, price, side, take_profit=None, stop_loss=None))]
    fn place_limit(
        &mut self,
        size: f64,
        price: f64,
        side: &str,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> PyResult<u64> {
        let mut order = LimitOrder::new(size, price, parse_side(side)?).map_err(to_py_err)?;
        if let Some(tp) = take_profit {
            order = order.with_take_profit(tp);
        }
        if let Some(sl) = stop_loss {
            order = order.with_stop_loss(sl);
        }
        self.place_order(order)
    }

    /// Place a stop order. Returns its identifier.
    #[pyo3(signature = (size, price, side, take_profit=None, stop_loss=None))]
    fn place_stop(
        &mut self,
        size: f64,
        price: f64,
        side: &str,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> PyResult<u64> {
        let mut order = StopOrder::new(size, price, parse_side(side)?).map_err(to_py_err)?;
        if let Some(tp) = take_profit {
            order = order.with_take_profit(tp);
        }
        if let Some(sl) = stop_loss {
            order = order.with_stop_loss(sl);
        }
        self.place_order(order)
    }

    /// Cancel a pending order. Returns whether it was pending.
    fn cancel(&mut self, order_id: u64) -> bool {
        self.inner.cancel(OrderId::new(order_id)).is_some()
    }

    /// Match pending orders against a bar and settle.
    fn solve(&mut self, bar: Bar) -> PyResult<SolvedTradingResult> {
        let report = self.inner.solve(&bar.into()).map_err(to_py_err)?;
        Ok(report.settlement.into())
    }

    /// Get the running totals.
    fn summary(&self) -> ExchangeSummary {
        self.inner.result().into()
    }

    /// Get the open (long, short) positions.
    fn positions(&self) -> (Position, Position) {
        let ledger = self.inner.ledger();
        ((*ledger.long()).into(), (*ledger.short()).into())
    }

    /// Fee charged per executed order identifier.
    fn fee_history(&self) -> BTreeMap<u64, f64> {
        self.inner
            .fee_history()
            .iter()
            .map(|(id, fee)| (id.value(), *fee))
            .collect()
    }

    /// Get number of pending orders.
    fn pending_order_count(&self) -> usize {
        self.inner.order_book().len()
    }
}

/// Install the tracing subscriber.
#[pyfunction]
fn init_logging() -> PyResult<()> {
    barmatch_backtest::init_logging().map_err(to_py_err)
}

// ============================================================================
// Module Definition
// ============================================================================

/// barmatch - bar-driven order matching and position netting for Python.
#[pymodule]
fn barmatch(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<Bar>()?;
    m.add_class::<Position>()?;
    m.add_class::<SolvedTradingResult>()?;
    m.add_class::<ExchangeSummary>()?;

    // Engine classes
    m.add_class::<PyExchange>()?;

    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    Ok(())
}
