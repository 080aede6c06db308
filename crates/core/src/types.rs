//! Core data types for the barmatch system.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Price type.
pub type Price = f64;

/// Size/quantity type.
pub type Size = f64;

/// Trading side of an order or a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// The side that closes this one.
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            _ => Err(Error::InvalidSide(s.to_string())),
        }
    }
}

/// Identifier of an order, minted by the order book that admitted it.
///
/// Identifiers increase monotonically within one book, so ordering by
/// identifier is ordering by admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(u64);

impl OrderId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for OrderId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Order type, used for fee lookup and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Executes at its stated price on the first eligible bar.
    Market,
    /// Executes when the bar range reaches its price.
    Limit,
    /// Becomes a market order when the bar range breaches its price.
    Stop,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderKind::Market => "market",
            OrderKind::Limit => "limit",
            OrderKind::Stop => "stop",
        };
        f.write_str(label)
    }
}

/// OHLC price bar for one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar timestamp (ms).
    pub ts_ms: TimestampMs,
    /// Open price.
    pub open: Price,
    /// High price.
    pub high: Price,
    /// Low price.
    pub low: Price,
    /// Close price.
    pub close: Price,
}

impl Bar {
    pub fn new(ts_ms: TimestampMs, open: Price, high: Price, low: Price, close: Price) -> Self {
        Self {
            ts_ms,
            open,
            high,
            low,
            close,
        }
    }

    /// Bar timestamp as a UTC datetime, if representable.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts_ms)
    }

    /// Check that the bar describes a usable price range.
    pub fn validate(&self) -> Result<()> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(Error::data(format!(
                "bar at {} has non-finite prices",
                self.ts_ms
            )));
        }
        if self.high < self.low {
            return Err(Error::data(format!(
                "bar at {}: high {} below low {}",
                self.ts_ms, self.high, self.low
            )));
        }
        for (name, px) in [("open", self.open), ("close", self.close)] {
            if px < self.low || px > self.high {
                return Err(Error::data(format!(
                    "bar at {}: {} {} outside [{}, {}]",
                    self.ts_ms, name, px, self.low, self.high
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parse() {
        assert_eq!("long".parse::<Side>().unwrap(), Side::Long);
        assert_eq!(" Short ".parse::<Side>().unwrap(), Side::Short);
        assert!(matches!("buy".parse::<Side>(), Err(Error::InvalidSide(_))));
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Long.opposite(), Side::Short);
        assert_eq!(Side::Short.opposite(), Side::Long);
    }

    #[test]
    fn test_side_serde_lowercase() {
        let json = serde_json::to_string(&Side::Short).unwrap();
        assert_eq!(json, "\"short\"");
    }

    #[test]
    fn test_order_id_ordering() {
        assert!(OrderId::new(1) < OrderId::new(2));
        assert_eq!(OrderId::from(7).to_string(), "#7");
    }

    #[test]
    fn test_bar_validate() {
        assert!(Bar::new(0, 100.0, 150.0, 50.0, 120.0).validate().is_ok());
        assert!(Bar::new(0, 100.0, 50.0, 150.0, 100.0).validate().is_err());
        assert!(Bar::new(0, 160.0, 150.0, 50.0, 100.0).validate().is_err());
        assert!(Bar::new(0, f64::NAN, 150.0, 50.0, 100.0).validate().is_err());
    }

    #[test]
    fn test_bar_datetime() {
        // 2024-01-01 00:01:00 UTC
        let bar = Bar::new(1_704_067_260_000, 1.0, 1.0, 1.0, 1.0);
        let dt = bar.datetime().unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T00:01:00+00:00");
    }
}
