//! Order variants and their matching capabilities.
//!
//! Market and limit orders are [`Fillable`]: they can execute against a bar
//! and spawn take-profit / stop-loss follow-ups. Stop orders are
//! [`Triggerable`]: once the bar breaches their price they turn into a
//! market order.

use barmatch_core::{Error, OrderId, OrderKind, Price, Result, Side, Size};
use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Quantities and prices shared by every order variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderTerms {
    size: Size,
    price: Price,
    side: Side,
    take_profit_price: Option<Price>,
    stop_loss_price: Option<Price>,
}

impl OrderTerms {
    fn new(size: Size, price: Price, side: Side) -> Result<Self> {
        let terms = Self {
            size,
            price,
            side,
            take_profit_price: None,
            stop_loss_price: None,
        };
        terms.validate()?;
        Ok(terms)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Fill price for market and limit orders, trigger price for stops.
    pub fn price(&self) -> Price {
        self.price
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn take_profit_price(&self) -> Option<Price> {
        self.take_profit_price
    }

    pub fn stop_loss_price(&self) -> Option<Price> {
        self.stop_loss_price
    }

    /// Size must be positive and every price finite.
    pub fn validate(&self) -> Result<()> {
        if !(self.size > 0.0) {
            return Err(Error::NonPositiveSize(self.size));
        }
        if !self.price.is_finite() {
            return Err(Error::invalid_price(format!("order price {}", self.price)));
        }
        if let Some(tp) = self.take_profit_price {
            if !tp.is_finite() {
                return Err(Error::invalid_price(format!("take-profit price {}", tp)));
            }
        }
        if let Some(sl) = self.stop_loss_price {
            if !sl.is_finite() {
                return Err(Error::invalid_price(format!("stop-loss price {}", sl)));
            }
        }
        Ok(())
    }

    /// Terms of an order that closes this one at `price`.
    fn closing(&self, price: Price) -> Self {
        Self {
            size: self.size,
            price,
            side: self.side.opposite(),
            take_profit_price: None,
            stop_loss_price: None,
        }
    }
}

macro_rules! order_variant {
    ($name:ident, $kind:expr) => {
        impl $name {
            /// Create an order. Size must be positive and price finite.
            pub fn new(size: Size, price: Price, side: Side) -> Result<Self> {
                Ok(Self::from_terms(OrderTerms::new(size, price, side)?))
            }

            fn from_terms(terms: OrderTerms) -> Self {
                Self {
                    terms,
                    age: 0,
                    origin: None,
                }
            }

            pub fn with_take_profit(mut self, price: Price) -> Self {
                self.terms.take_profit_price = Some(price);
                self
            }

            pub fn with_stop_loss(mut self, price: Price) -> Self {
                self.terms.stop_loss_price = Some(price);
                self
            }

            #[cfg(test)]
            pub(crate) fn with_age(mut self, age: u32) -> Self {
                self.age = age;
                self
            }

            pub(crate) fn with_origin(mut self, origin: OrderId) -> Self {
                self.origin = Some(origin);
                self
            }

            pub fn terms(&self) -> &OrderTerms {
                &self.terms
            }

            /// Steps survived since admission.
            pub fn age(&self) -> u32 {
                self.age
            }

            /// The order this one was derived from, if the engine created it.
            pub fn origin(&self) -> Option<OrderId> {
                self.origin
            }

            pub fn kind(&self) -> OrderKind {
                $kind
            }

            pub(crate) fn tick(&mut self) {
                self.age += 1;
            }
        }
    };
}

/// Executes at its stated price on the first eligible bar.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    terms: OrderTerms,
    age: u32,
    origin: Option<OrderId>,
}

/// Executes once the bar range reaches its price.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitOrder {
    terms: OrderTerms,
    age: u32,
    origin: Option<OrderId>,
}

/// Converts into a market order once the bar range breaches its price.
#[derive(Debug, Clone, PartialEq)]
pub struct StopOrder {
    terms: OrderTerms,
    age: u32,
    origin: Option<OrderId>,
}

order_variant!(MarketOrder, OrderKind::Market);
order_variant!(LimitOrder, OrderKind::Limit);
order_variant!(StopOrder, OrderKind::Stop);

/// Orders that can execute against a bar.
pub trait Fillable {
    fn terms(&self) -> &OrderTerms;

    /// Whether the order executes within the bar's range.
    fn check_fill(&self, high: Price, low: Price) -> bool;

    /// The position produced by executing the order.
    fn to_position(&self) -> Position {
        let terms = self.terms();
        Position::filled(terms.size, terms.price, terms.side)
    }

    /// Closing limit order at the take-profit price, if one is set.
    fn to_take_profit(&self) -> Option<LimitOrder> {
        let terms = self.terms();
        terms
            .take_profit_price
            .map(|price| LimitOrder::from_terms(terms.closing(price)))
    }

    /// Closing stop order at the stop-loss price, if one is set.
    fn to_stop_loss(&self) -> Option<StopOrder> {
        let terms = self.terms();
        terms
            .stop_loss_price
            .map(|price| StopOrder::from_terms(terms.closing(price)))
    }
}

/// Orders that must be activated before they can execute.
pub trait Triggerable {
    /// Whether the bar's range activates the order.
    fn check_trigger(&self, high: Price, low: Price) -> bool;

    /// The fillable order this one becomes once triggered. Age carries over.
    fn to_fillable(&self) -> MarketOrder;
}

impl Fillable for MarketOrder {
    fn terms(&self) -> &OrderTerms {
        &self.terms
    }

    // No slippage: always executes at its stated price.
    fn check_fill(&self, _high: Price, _low: Price) -> bool {
        true
    }
}

impl Fillable for LimitOrder {
    fn terms(&self) -> &OrderTerms {
        &self.terms
    }

    fn check_fill(&self, high: Price, low: Price) -> bool {
        match self.terms.side {
            Side::Long => low <= self.terms.price,
            Side::Short => self.terms.price <= high,
        }
    }
}

impl Triggerable for StopOrder {
    fn check_trigger(&self, high: Price, low: Price) -> bool {
        match self.terms.side {
            Side::Long => high >= self.terms.price,
            Side::Short => low <= self.terms.price,
        }
    }

    fn to_fillable(&self) -> MarketOrder {
        MarketOrder {
            terms: self.terms,
            age: self.age,
            origin: self.origin,
        }
    }
}

/// Any order a caller can submit.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Market(MarketOrder),
    Limit(LimitOrder),
    Stop(StopOrder),
}

impl Order {
    pub fn kind(&self) -> OrderKind {
        match self {
            Order::Market(o) => o.kind(),
            Order::Limit(o) => o.kind(),
            Order::Stop(o) => o.kind(),
        }
    }

    pub fn terms(&self) -> &OrderTerms {
        match self {
            Order::Market(o) => &o.terms,
            Order::Limit(o) => &o.terms,
            Order::Stop(o) => &o.terms,
        }
    }

    pub fn age(&self) -> u32 {
        match self {
            Order::Market(o) => o.age,
            Order::Limit(o) => o.age,
            Order::Stop(o) => o.age,
        }
    }

    pub fn origin(&self) -> Option<OrderId> {
        match self {
            Order::Market(o) => o.origin,
            Order::Limit(o) => o.origin,
            Order::Stop(o) => o.origin,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.terms().validate()
    }

    /// The same order as if it had just been submitted.
    pub(crate) fn into_fresh(self) -> Self {
        match self {
            Order::Market(o) => Order::Market(MarketOrder::from_terms(o.terms)),
            Order::Limit(o) => Order::Limit(LimitOrder::from_terms(o.terms)),
            Order::Stop(o) => Order::Stop(StopOrder::from_terms(o.terms)),
        }
    }
}

impl From<MarketOrder> for Order {
    fn from(order: MarketOrder) -> Self {
        Order::Market(order)
    }
}

impl From<LimitOrder> for Order {
    fn from(order: LimitOrder) -> Self {
        Order::Limit(order)
    }
}

impl From<StopOrder> for Order {
    fn from(order: StopOrder) -> Self {
        Order::Stop(order)
    }
}

/// Orders held in the book's fillable partition.
#[derive(Debug, Clone, PartialEq)]
pub enum FillableOrder {
    Market(MarketOrder),
    Limit(LimitOrder),
}

impl FillableOrder {
    pub fn kind(&self) -> OrderKind {
        match self {
            FillableOrder::Market(o) => o.kind(),
            FillableOrder::Limit(o) => o.kind(),
        }
    }

    pub fn age(&self) -> u32 {
        match self {
            FillableOrder::Market(o) => o.age,
            FillableOrder::Limit(o) => o.age,
        }
    }

    pub fn origin(&self) -> Option<OrderId> {
        match self {
            FillableOrder::Market(o) => o.origin,
            FillableOrder::Limit(o) => o.origin,
        }
    }

    pub(crate) fn tick(&mut self) {
        match self {
            FillableOrder::Market(o) => o.tick(),
            FillableOrder::Limit(o) => o.tick(),
        }
    }
}

impl Fillable for FillableOrder {
    fn terms(&self) -> &OrderTerms {
        match self {
            FillableOrder::Market(o) => &o.terms,
            FillableOrder::Limit(o) => &o.terms,
        }
    }

    fn check_fill(&self, high: Price, low: Price) -> bool {
        match self {
            FillableOrder::Market(o) => o.check_fill(high, low),
            FillableOrder::Limit(o) => o.check_fill(high, low),
        }
    }
}

impl TryFrom<Order> for FillableOrder {
    type Error = Order;

    fn try_from(order: Order) -> std::result::Result<Self, Order> {
        match order {
            Order::Market(o) => Ok(FillableOrder::Market(o)),
            Order::Limit(o) => Ok(FillableOrder::Limit(o)),
            other => Err(other),
        }
    }
}

impl From<FillableOrder> for Order {
    fn from(order: FillableOrder) -> Self {
        match order {
            FillableOrder::Market(o) => Order::Market(o),
            FillableOrder::Limit(o) => Order::Limit(o),
        }
    }
}

/// Orders held in the book's triggerable partition.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerableOrder {
    Stop(StopOrder),
}

impl TriggerableOrder {
    pub fn kind(&self) -> OrderKind {
        match self {
            TriggerableOrder::Stop(o) => o.kind(),
        }
    }

    pub fn terms(&self) -> &OrderTerms {
        match self {
            TriggerableOrder::Stop(o) => &o.terms,
        }
    }

    pub fn age(&self) -> u32 {
        match self {
            TriggerableOrder::Stop(o) => o.age,
        }
    }

    pub fn origin(&self) -> Option<OrderId> {
        match self {
            TriggerableOrder::Stop(o) => o.origin,
        }
    }

    pub(crate) fn tick(&mut self) {
        match self {
            TriggerableOrder::Stop(o) => o.tick(),
        }
    }
}

impl Triggerable for TriggerableOrder {
    fn check_trigger(&self, high: Price, low: Price) -> bool {
        match self {
            TriggerableOrder::Stop(o) => o.check_trigger(high, low),
        }
    }

    fn to_fillable(&self) -> MarketOrder {
        match self {
            TriggerableOrder::Stop(o) => o.to_fillable(),
        }
    }
}

impl TryFrom<Order> for TriggerableOrder {
    type Error = Order;

    fn try_from(order: Order) -> std::result::Result<Self, Order> {
        match order {
            Order::Stop(o) => Ok(TriggerableOrder::Stop(o)),
            other => Err(other),
        }
    }
}

impl From<TriggerableOrder> for Order {
    fn from(order: TriggerableOrder) -> Self {
        match order {
            TriggerableOrder::Stop(o) => Order::Stop(o),
        }
    }
}
