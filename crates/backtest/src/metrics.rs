//! Backtest performance metrics.
//!
//! Calculates performance metrics from the settlement history.

use serde::{Deserialize, Serialize};

use crate::exchange::SettlementRecord;

/// Backtest performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Number of non-empty settlements.
    pub total_settlements: u32,
    /// Settlements with positive P&L.
    pub winning_settlements: u32,
    /// Settlements with zero or negative P&L.
    pub losing_settlements: u32,
    /// Win rate (0-1).
    pub win_rate: f64,
    /// Realized P&L before fees.
    pub gross_pnl: f64,
    /// Realized P&L after fees.
    pub net_pnl: f64,
    /// Total fees paid.
    pub total_fees: f64,
    /// Average winning settlement P&L.
    pub avg_win: f64,
    /// Average losing settlement P&L.
    pub avg_loss: f64,
    /// Profit factor (gross wins / gross losses).
    pub profit_factor: f64,
    /// Maximum drawdown (absolute).
    pub max_drawdown: f64,
    /// Maximum drawdown percentage.
    pub max_drawdown_pct: f64,
    /// Sharpe ratio of per-settlement returns (not annualized).
    pub sharpe_ratio: f64,
    /// Total return percentage.
    pub total_return_pct: f64,
    /// Largest winning settlement.
    pub largest_win: f64,
    /// Largest losing settlement.
    pub largest_loss: f64,
    /// Consecutive wins (max).
    pub max_consecutive_wins: u32,
    /// Consecutive losses (max).
    pub max_consecutive_losses: u32,
}

/// Equity curve point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts_ms: i64,
    pub equity: f64,
    pub drawdown: f64,
    pub drawdown_pct: f64,
}

/// Metrics calculator.
pub struct MetricsCalculator {
    initial_capital: f64,
}

impl MetricsCalculator {
    /// Create a new metrics calculator.
    pub fn new(initial_capital: f64) -> Self {
        Self { initial_capital }
    }

    /// Calculate metrics from settlements and the fees paid over the run.
    pub fn calculate(&self, settlements: &[SettlementRecord], total_fees: f64) -> BacktestMetrics {
        let mut metrics = BacktestMetrics {
            total_fees,
            net_pnl: -total_fees,
            total_return_pct: (-total_fees / self.initial_capital) * 100.0,
            ..Default::default()
        };
        if settlements.is_empty() {
            return metrics;
        }

        metrics.total_settlements = settlements.len() as u32;

        let mut gross_wins = 0.0;
        let mut gross_losses = 0.0;
        let mut current_wins = 0u32;
        let mut current_losses = 0u32;

        for record in settlements {
            let pnl = record.result.pnl;
            metrics.gross_pnl += pnl;

            if pnl > 0.0 {
                metrics.winning_settlements += 1;
                gross_wins += pnl;
                metrics.largest_win = metrics.largest_win.max(pnl);

                current_wins += 1;
                current_losses = 0;
                metrics.max_consecutive_wins = metrics.max_consecutive_wins.max(current_wins);
            } else {
                metrics.losing_settlements += 1;
                gross_losses += pnl.abs();
                metrics.largest_loss = metrics.largest_loss.min(pnl);

                current_losses += 1;
                current_wins = 0;
                metrics.max_consecutive_losses =
                    metrics.max_consecutive_losses.max(current_losses);
            }
        }

        metrics.net_pnl = metrics.gross_pnl - total_fees;
        metrics.win_rate = metrics.winning_settlements as f64 / metrics.total_settlements as f64;

        metrics.avg_win = if metrics.winning_settlements > 0 {
            gross_wins / metrics.winning_settlements as f64
        } else {
            0.0
        };

        metrics.avg_loss = if metrics.losing_settlements > 0 {
            -gross_losses / metrics.losing_settlements as f64
        } else {
            0.0
        };

        metrics.profit_factor = if gross_losses > 0.0 {
            gross_wins / gross_losses
        } else if gross_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        metrics.total_return_pct = (metrics.net_pnl / self.initial_capital) * 100.0;

        for point in self.build_equity_curve(settlements) {
            if point.drawdown > metrics.max_drawdown {
                metrics.max_drawdown = point.drawdown;
                metrics.max_drawdown_pct = point.drawdown_pct;
            }
        }

        let returns: Vec<f64> = settlements
            .iter()
            .map(|r| r.result.pnl / self.initial_capital)
            .collect();
        metrics.sharpe_ratio = self.calculate_sharpe(&returns);

        metrics
    }

    /// Build the realized equity curve: initial capital, then one point per settlement.
    pub fn build_equity_curve(&self, settlements: &[SettlementRecord]) -> Vec<EquityPoint> {
        let mut curve = Vec::with_capacity(settlements.len() + 1);

        curve.push(EquityPoint {
            ts_ms: settlements.first().map(|r| r.ts_ms).unwrap_or(0),
            equity: self.initial_capital,
            drawdown: 0.0,
            drawdown_pct: 0.0,
        });

        let mut equity = self.initial_capital;
        let mut peak = self.initial_capital;

        for record in settlements {
            equity += record.result.pnl;
            peak = peak.max(equity);

            let drawdown = peak - equity;
            let drawdown_pct = if peak > 0.0 {
                (drawdown / peak) * 100.0
            } else {
                0.0
            };

            curve.push(EquityPoint {
                ts_ms: record.ts_ms,
                equity,
                drawdown,
                drawdown_pct,
            });
        }

        curve
    }

    fn calculate_sharpe(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        if std_dev > 0.0 {
            mean / std_dev
        } else {
            0.0
        }
    }
}
