//! Position netting for backtesting.
//!
//! Same-side fills accumulate into one weighted-average position per side;
//! settlement offsets the overlap between the long and the short side and
//! realizes its P&L.

use barmatch_core::{Error, Price, Result, Side, Size};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single-sided holding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    size: Size,
    price: Price,
    side: Side,
}

impl Position {
    /// Create a position from a fill. Size must be positive.
    pub fn new(size: Size, price: Price, side: Side) -> Result<Self> {
        if !(size > 0.0) {
            return Err(Error::NonPositiveSize(size));
        }
        if !price.is_finite() {
            return Err(Error::invalid_price(format!("position price {}", price)));
        }
        Ok(Self { size, price, side })
    }

    /// An empty shell (size 0, price 0).
    pub fn empty(side: Side) -> Self {
        Self {
            size: 0.0,
            price: 0.0,
            side,
        }
    }

    /// Unchecked constructor for values already validated by an order.
    pub(crate) fn filled(size: Size, price: Price, side: Side) -> Self {
        Self { size, price, side }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Average entry price (0 when flat).
    pub fn price(&self) -> Price {
        self.price
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0.0
    }

    /// Size times average price.
    pub fn notional(&self) -> f64 {
        self.size * self.price
    }

    /// Combine two same-side positions using the size-weighted average price.
    pub fn combine(&self, other: &Position) -> Result<Position> {
        if self.side != other.side {
            return Err(Error::MismatchedSideCombination {
                left: self.side,
                right: other.side,
            });
        }
        Ok(self.merge(other))
    }

    /// Weighted-average merge. Callers guarantee both sides match.
    fn merge(&self, other: &Position) -> Position {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }

        let size = self.size + other.size;
        let price = if size == 0.0 {
            0.0
        } else {
            (self.size * self.price + other.size * other.price) / size
        };
        Self {
            size,
            price,
            side: self.side,
        }
    }

    /// Remove `qty` from the position. The average price is kept unless the
    /// position becomes flat.
    fn reduce(&self, qty: Size) -> Position {
        let size = self.size - qty;
        if size <= 0.0 {
            Position::empty(self.side)
        } else {
            Self {
                size,
                price: self.price,
                side: self.side,
            }
        }
    }
}

/// Outcome of one settlement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SolvedTradingResult {
    /// Quantity offset between the two sides.
    pub size: Size,
    /// Long average price before settlement.
    pub long_price: Price,
    /// Short average price before settlement.
    pub short_price: Price,
    /// Realized profit.
    pub pnl: f64,
}

impl SolvedTradingResult {
    /// Nothing offset.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0.0
    }
}

/// Running long and short positions for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionLedger {
    long: Position,
    short: Position,
}

impl PositionLedger {
    /// Create a flat ledger.
    pub fn new() -> Self {
        Self {
            long: Position::empty(Side::Long),
            short: Position::empty(Side::Short),
        }
    }

    /// Seed a ledger with existing positions.
    pub fn with_positions(long: Position, short: Position) -> Result<Self> {
        if long.side != Side::Long {
            return Err(Error::MismatchedSideCombination {
                left: Side::Long,
                right: long.side,
            });
        }
        if short.side != Side::Short {
            return Err(Error::MismatchedSideCombination {
                left: Side::Short,
                right: short.side,
            });
        }
        Ok(Self { long, short })
    }

    pub fn long(&self) -> &Position {
        &self.long
    }

    pub fn short(&self) -> &Position {
        &self.short
    }

    /// Long size minus short size.
    pub fn net_size(&self) -> Size {
        self.long.size - self.short.size
    }

    pub fn is_flat(&self) -> bool {
        self.long.is_empty() && self.short.is_empty()
    }

    /// Accumulate a fill into the running position of its side.
    pub fn add(&mut self, position: Position) {
        let slot = match position.side {
            Side::Long => &mut self.long,
            Side::Short => &mut self.short,
        };
        *slot = slot.merge(&position);
    }

    /// Offset the overlapping quantity of both sides and realize its P&L.
    pub fn settle(&mut self) -> SolvedTradingResult {
        if self.long.is_empty() || self.short.is_empty() {
            return SolvedTradingResult::zero();
        }

        let offset = self.long.size.min(self.short.size);
        let result = SolvedTradingResult {
            size: offset,
            long_price: self.long.price,
            short_price: self.short.price,
            pnl: offset * (self.short.price - self.long.price),
        };

        if self.long.size == self.short.size {
            self.long = Position::empty(Side::Long);
            self.short = Position::empty(Side::Short);
        } else if self.long.size > self.short.size {
            self.long = self.long.reduce(offset);
            self.short = Position::empty(Side::Short);
        } else {
            self.short = self.short.reduce(offset);
            self.long = Position::empty(Side::Long);
        }

        debug!(
            size = result.size,
            long_price = result.long_price,
            short_price = result.short_price,
            pnl = result.pnl,
            "settled offsetting positions"
        );

        result
    }
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pos(size: f64, price: f64, side: Side) -> Position {
        Position::new(size, price, side).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_size() {
        assert!(matches!(
            Position::new(0.0, 100.0, Side::Long),
            Err(Error::NonPositiveSize(_))
        ));
        assert!(matches!(
            Position::new(-1.0, 100.0, Side::Long),
            Err(Error::NonPositiveSize(_))
        ));
    }

    #[test]
    fn test_combine_with_empty_is_identity() {
        let p = pos(3.0, 0.1, Side::Long);
        let combined = p.combine(&Position::empty(Side::Long)).unwrap();
        assert_eq!(combined, p);
    }

    #[test]
    fn test_combine_mismatched_sides() {
        let err = pos(1.0, 100.0, Side::Long)
            .combine(&pos(1.0, 100.0, Side::Short))
            .unwrap_err();
        assert!(matches!(err, Error::MismatchedSideCombination { .. }));
    }

    #[test]
    fn test_ledger_with_positions() {
        let ledger =
            PositionLedger::with_positions(pos(1.0, 100.0, Side::Long), pos(2.0, 200.0, Side::Short))
                .unwrap();
        assert_eq!(ledger.long().size(), 1.0);
        assert_eq!(ledger.long().price(), 100.0);
        assert_eq!(ledger.short().size(), 2.0);
        assert_eq!(ledger.short().price(), 200.0);

        let swapped =
            PositionLedger::with_positions(pos(2.0, 200.0, Side::Short), pos(1.0, 100.0, Side::Long));
        assert!(swapped.is_err());
    }

    #[test]
    fn test_add_simple() {
        let mut ledger = PositionLedger::new();
        ledger.add(pos(3.0, 300.0, Side::Long));

        assert_eq!(ledger.long().size(), 3.0);
        assert_eq!(ledger.long().price(), 300.0);
        assert_eq!(ledger.short().size(), 0.0);
        assert_eq!(ledger.short().price(), 0.0);
    }

    #[test]
    fn test_add_weighted_average() {
        let mut ledger = PositionLedger::new();
        ledger.add(pos(1.0, 100.0, Side::Long));
        ledger.add(pos(2.0, 200.0, Side::Short));
        ledger.add(pos(3.0, 300.0, Side::Long));
        ledger.add(pos(4.0, 400.0, Side::Short));

        assert_eq!(ledger.long().size(), 4.0);
        assert_relative_eq!(ledger.long().price(), 250.0);
        assert_eq!(ledger.short().size(), 6.0);
        assert_relative_eq!(ledger.short().price(), (2.0 * 200.0 + 4.0 * 400.0) / 6.0);
        assert_eq!(ledger.net_size(), -2.0);
    }

    #[test]
    fn test_add_merges_into_seeded_side() {
        let seed = pos(2.0, 100.0, Side::Long);
        let mut ledger = PositionLedger::with_positions(seed, Position::empty(Side::Short)).unwrap();
        ledger.add(pos(2.0, 200.0, Side::Long));
        ledger.add(Position::empty(Side::Short));

        assert_eq!(ledger.long().size(), 4.0);
        assert_relative_eq!(ledger.long().price(), 150.0);
        assert!(ledger.short().is_empty());
        assert_eq!(ledger.short().side(), Side::Short);
    }

    #[test]
    fn test_settle_remaining_short() {
        let mut ledger = PositionLedger::new();
        ledger.add(pos(1.0, 100.0, Side::Long));
        ledger.add(pos(2.0, 200.0, Side::Short));
        ledger.add(pos(3.0, 300.0, Side::Long));
        ledger.add(pos(4.0, 400.0, Side::Short));

        let short_avg = (2.0 * 200.0 + 4.0 * 400.0) / 6.0;
        let result = ledger.settle();

        assert_eq!(result.size, 4.0);
        assert_relative_eq!(result.long_price, 250.0);
        assert_relative_eq!(result.short_price, short_avg);
        assert_relative_eq!(result.pnl, 4.0 * (short_avg - 250.0));

        assert_eq!(ledger.long().size(), 0.0);
        assert_eq!(ledger.long().price(), 0.0);
        assert_eq!(ledger.short().size(), 2.0);
        assert_relative_eq!(ledger.short().price(), short_avg);
    }

    #[test]
    fn test_settle_remaining_long() {
        let mut ledger = PositionLedger::new();
        ledger.add(pos(1.0, 100.0, Side::Short));
        ledger.add(pos(2.0, 200.0, Side::Long));
        ledger.add(pos(3.0, 300.0, Side::Long));
        ledger.add(pos(4.0, 400.0, Side::Long));

        let long_avg = (2.0 * 200.0 + 3.0 * 300.0 + 4.0 * 400.0) / 9.0;
        let result = ledger.settle();

        assert_eq!(ledger.long().size(), 8.0);
        assert_relative_eq!(ledger.long().price(), long_avg);
        assert!(ledger.short().is_empty());
        assert_eq!(ledger.short().price(), 0.0);

        assert_eq!(result.size, 1.0);
        assert_relative_eq!(result.long_price, long_avg);
        assert_eq!(result.short_price, 100.0);
        assert_relative_eq!(result.pnl, 100.0 - long_avg);
    }

    #[test]
    fn test_settle_equal_sizes() {
        let mut ledger = PositionLedger::new();
        ledger.add(pos(2.0, 100.0, Side::Long));
        ledger.add(pos(2.0, 110.0, Side::Short));

        let result = ledger.settle();

        assert_eq!(result.size, 2.0);
        assert_relative_eq!(result.pnl, 20.0);
        assert!(ledger.is_flat());
        assert_eq!(ledger.long().price(), 0.0);
        assert_eq!(ledger.short().price(), 0.0);
    }

    #[test]
    fn test_settle_one_sided_is_noop() {
        let mut ledger = PositionLedger::new();
        for (size, price) in [(1.0, 100.0), (2.0, 200.0), (3.0, 300.0), (4.0, 400.0)] {
            ledger.add(pos(size, price, Side::Short));
        }

        let result = ledger.settle();

        assert_eq!(result, SolvedTradingResult::zero());
        assert!(ledger.long().is_empty());
        assert_eq!(ledger.short().size(), 10.0);
        assert_relative_eq!(ledger.short().price(), 3000.0 / 10.0);
    }

    #[test]
    fn test_settle_twice_is_idempotent() {
        let mut ledger = PositionLedger::new();
        ledger.add(pos(5.0, 100.0, Side::Long));
        ledger.add(pos(2.0, 90.0, Side::Short));

        let first = ledger.settle();
        let second = ledger.settle();

        assert_relative_eq!(first.pnl, -20.0);
        assert!(second.is_empty());
        assert_eq!(ledger.long().size(), 3.0);
        assert_eq!(ledger.long().price(), 100.0);
    }
}
