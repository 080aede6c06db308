//! Order book for bar-by-bar matching.
//!
//! Pending orders live in two partitions: fillable (market, limit) and
//! triggerable (stop). Each call to [`OrderBook::step`] simulates one bar.
//! Orders admitted since the previous step are skipped for one step so an
//! order can never match against the bar it was decided on.

use std::collections::BTreeMap;

use barmatch_core::{Error, OrderId, Price, Result};
use tracing::{debug, trace};

use crate::order::{Fillable, FillableOrder, Order, Triggerable, TriggerableOrder};
use crate::position::Position;

/// An executed order and the position it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Identifier the order was held under.
    pub order_id: OrderId,
    /// The executed order.
    pub order: FillableOrder,
    /// Resulting position.
    pub position: Position,
}

/// Pending orders of one instrument.
#[derive(Debug, Clone)]
pub struct OrderBook {
    fillable: BTreeMap<OrderId, FillableOrder>,
    triggerable: BTreeMap<OrderId, TriggerableOrder>,
    next_id: u64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            fillable: BTreeMap::new(),
            triggerable: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn mint_id(&mut self) -> OrderId {
        let id = OrderId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Validate an order and file it under its partition.
    ///
    /// Admitted orders always start at age zero, so none can execute on the
    /// step that follows their admission.
    pub fn admit(&mut self, order: impl Into<Order>) -> Result<OrderId> {
        let order = order.into();
        order.validate()?;
        self.insert(order)
    }

    /// Admit several orders. Nothing is admitted unless every order is valid.
    pub fn admit_many(&mut self, orders: impl IntoIterator<Item = Order>) -> Result<Vec<OrderId>> {
        let orders: Vec<Order> = orders.into_iter().collect();
        for order in &orders {
            order.validate()?;
        }
        orders.into_iter().map(|order| self.insert(order)).collect()
    }

    fn insert(&mut self, order: Order) -> Result<OrderId> {
        let order = match FillableOrder::try_from(order.into_fresh()) {
            Ok(fillable) => {
                let id = self.mint_id();
                self.fillable.insert(id, fillable);
                return Ok(id);
            }
            Err(order) => order,
        };
        match TriggerableOrder::try_from(order) {
            Ok(triggerable) => {
                let id = self.mint_id();
                self.triggerable.insert(id, triggerable);
                Ok(id)
            }
            Err(order) => Err(Error::unclassifiable(format!(
                "{} order is neither fillable nor triggerable",
                order.kind()
            ))),
        }
    }

    /// Remove a pending order.
    pub fn cancel(&mut self, id: OrderId) -> Option<Order> {
        if let Some(order) = self.fillable.remove(&id) {
            return Some(order.into());
        }
        self.triggerable.remove(&id).map(Order::from)
    }

    /// Simulate one bar with the given range.
    ///
    /// Returns the executions in admission order of the executed orders.
    pub fn step(&mut self, high: Price, low: Price) -> Vec<Execution> {
        self.process_triggers(high, low);
        let executions = self.process_fills(high, low);

        for order in self.fillable.values_mut() {
            order.tick();
        }
        for order in self.triggerable.values_mut() {
            order.tick();
        }

        trace!(
            executed = executions.len(),
            fillable = self.fillable.len(),
            triggerable = self.triggerable.len(),
            "order book step"
        );

        executions
    }

    /// Convert triggered stops into market orders under fresh identifiers.
    fn process_triggers(&mut self, high: Price, low: Price) {
        let triggered: Vec<OrderId> = self
            .triggerable
            .iter()
            .filter(|(_, order)| order.age() > 0 && order.check_trigger(high, low))
            .map(|(id, _)| *id)
            .collect();

        for stop_id in triggered {
            if let Some(order) = self.triggerable.remove(&stop_id) {
                let market = order.to_fillable().with_origin(stop_id);
                let id = self.mint_id();
                debug!(%stop_id, market_id = %id, price = market.terms().price(), "stop triggered");
                self.fillable.insert(id, FillableOrder::Market(market));
            }
        }
    }

    /// Execute contracted orders and file their take-profit / stop-loss follow-ups.
    fn process_fills(&mut self, high: Price, low: Price) -> Vec<Execution> {
        let contracted: Vec<OrderId> = self
            .fillable
            .iter()
            .filter(|(_, order)| order.age() > 0 && order.check_fill(high, low))
            .map(|(id, _)| *id)
            .collect();

        let mut executions = Vec::with_capacity(contracted.len());
        for order_id in contracted {
            let Some(order) = self.fillable.remove(&order_id) else {
                continue;
            };
            let position = order.to_position();
            debug!(
                %order_id,
                kind = %order.kind(),
                side = %position.side(),
                size = position.size(),
                price = position.price(),
                "order filled"
            );

            if let Some(tp) = order.to_take_profit() {
                let id = self.mint_id();
                trace!(parent = %order_id, tp_id = %id, price = tp.terms().price(), "take-profit spawned");
                self.fillable
                    .insert(id, FillableOrder::Limit(tp.with_origin(order_id)));
            }
            if let Some(sl) = order.to_stop_loss() {
                let id = self.mint_id();
                trace!(parent = %order_id, sl_id = %id, price = sl.terms().price(), "stop-loss spawned");
                self.triggerable
                    .insert(id, TriggerableOrder::Stop(sl.with_origin(order_id)));
            }

            executions.push(Execution {
                order_id,
                order,
                position,
            });
        }
        executions
    }

    /// Look up a pending order.
    pub fn get(&self, id: OrderId) -> Option<Order> {
        self.fillable
            .get(&id)
            .cloned()
            .map(Order::from)
            .or_else(|| self.triggerable.get(&id).cloned().map(Order::from))
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.fillable.contains_key(&id) || self.triggerable.contains_key(&id)
    }

    /// Fillable orders in admission order.
    pub fn fillable(&self) -> impl Iterator<Item = (&OrderId, &FillableOrder)> {
        self.fillable.iter()
    }

    /// Triggerable orders in admission order.
    pub fn triggerable(&self) -> impl Iterator<Item = (&OrderId, &TriggerableOrder)> {
        self.triggerable.iter()
    }

    pub fn fillable_len(&self) -> usize {
        self.fillable.len()
    }

    pub fn triggerable_len(&self) -> usize {
        self.triggerable.len()
    }

    /// Total pending orders.
    pub fn len(&self) -> usize {
        self.fillable.len() + self.triggerable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
impl OrderBook {
    /// Admit an order that has already waited out its first step.
    pub(crate) fn admit_aged(&mut self, order: impl Into<Order>) -> Result<OrderId> {
        let id = self.admit(order)?;
        if let Some(order) = self.fillable.get_mut(&id) {
            order.tick();
        }
        if let Some(order) = self.triggerable.get_mut(&id) {
            order.tick();
        }
        Ok(id)
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{LimitOrder, MarketOrder, StopOrder};
    use barmatch_core::{OrderKind, Side};

    fn market(side: Side) -> MarketOrder {
        MarketOrder::new(1.0, 100.0, side).unwrap()
    }

    fn bracketed_market(side: Side) -> MarketOrder {
        market(side).with_take_profit(200.0).with_stop_loss(50.0)
    }

    #[test]
    fn test_admit_partitions_by_capability() {
        let mut book = OrderBook::new();
        let mo = book.admit(bracketed_market(Side::Long)).unwrap();
        let lo = book
            .admit(LimitOrder::new(1.0, 100.0, Side::Short).unwrap())
            .unwrap();
        let so = book
            .admit(StopOrder::new(1.0, 100.0, Side::Long).unwrap())
            .unwrap();

        assert_eq!(book.fillable_len(), 2);
        assert_eq!(book.triggerable_len(), 1);
        assert!(book.fillable().any(|(id, _)| *id == mo));
        assert!(book.fillable().any(|(id, _)| *id == lo));
        assert!(book.triggerable().any(|(id, _)| *id == so));
        assert!(!book.triggerable().any(|(id, _)| *id == mo));
        assert!(!book.fillable().any(|(id, _)| *id == so));
        assert!(mo < lo && lo < so);
    }

    #[test]
    fn test_admit_many_is_all_or_nothing() {
        let mut book = OrderBook::new();
        let bad: Order = LimitOrder::new(1.0, 100.0, Side::Long)
            .unwrap()
            .with_stop_loss(f64::NAN)
            .into();
        let result = book.admit_many(vec![market(Side::Long).into(), bad]);

        assert!(matches!(result, Err(Error::InvalidPrice(_))));
        assert!(book.is_empty());
    }

    #[test]
    fn test_new_orders_wait_one_step() {
        let mut book = OrderBook::new();
        book.admit(bracketed_market(Side::Long)).unwrap();

        let first = book.step(150.0, 50.0);
        assert!(first.is_empty());
        assert_eq!(book.fillable_len(), 1);

        let second = book.step(150.0, 50.0);
        assert_eq!(second.len(), 1);
        let position = second[0].position;
        assert_eq!(position.size(), 1.0);
        assert_eq!(position.price(), 100.0);
        assert_eq!(position.side(), Side::Long);

        // Follow-ups are fresh and have already aged once.
        assert_eq!(book.fillable_len(), 1);
        assert_eq!(book.triggerable_len(), 1);
        let (_, tp) = book.fillable().next().unwrap();
        let (_, sl) = book.triggerable().next().unwrap();
        assert_eq!(tp.kind(), OrderKind::Limit);
        assert_eq!(sl.kind(), OrderKind::Stop);
        assert_eq!(tp.age(), 1);
        assert_eq!(sl.age(), 1);
    }

    #[test]
    fn test_spawned_orders_link_to_parent() {
        let mut book = OrderBook::new();
        let parent = book.admit_aged(bracketed_market(Side::Long)).unwrap();

        let executions = book.step(150.0, 60.0);
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].order_id, parent);

        // The step ages every survivor, so spawned orders sit at exactly one.
        let (_, tp) = book.fillable().next().unwrap();
        assert_eq!(tp.age(), 1);
        assert_eq!(tp.origin(), Some(parent));
        assert_eq!(tp.terms().side(), Side::Short);
        assert_eq!(tp.terms().price(), 200.0);
        let (_, sl) = book.triggerable().next().unwrap();
        assert_eq!(sl.origin(), Some(parent));
        assert_eq!(sl.terms().price(), 50.0);
    }

    #[test]
    fn test_solve_without_targets_empties_book() {
        let mut book = OrderBook::new();
        book.admit_aged(market(Side::Long)).unwrap();

        let executions = book.step(150.0, 50.0);

        assert_eq!(executions.len(), 1);
        assert!(book.is_empty());
    }

    #[test]
    fn test_solve_keeps_admission_order() {
        let mut book = OrderBook::new();
        book.admit_aged(market(Side::Long)).unwrap();
        book.admit_aged(
            LimitOrder::new(1.0, 100.0, Side::Short)
                .unwrap()
                .with_take_profit(200.0)
                .with_stop_loss(50.0),
        )
        .unwrap();

        let executions = book.step(150.0, 50.0);

        assert_eq!(executions.len(), 2);
        assert_eq!(executions[0].position.side(), Side::Long);
        assert_eq!(executions[1].position.side(), Side::Short);
        assert_eq!(book.fillable_len(), 1);
        assert_eq!(book.triggerable_len(), 1);
    }

    #[test]
    fn test_unreached_limit_stays_and_ages() {
        let mut book = OrderBook::new();
        let id = book
            .admit_aged(LimitOrder::new(1.0, 90.0, Side::Long).unwrap())
            .unwrap();

        assert!(book.step(110.0, 95.0).is_empty());
        assert_eq!(book.get(id).unwrap().age(), 2);

        let executions = book.step(110.0, 89.0);
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].position.price(), 90.0);
    }

    #[test]
    fn test_triggered_stops_convert_and_fill_same_step() {
        let mut book = OrderBook::new();
        let long_stop = book
            .admit_aged(
                StopOrder::new(1.0, 100.0, Side::Long)
                    .unwrap()
                    .with_take_profit(200.0)
                    .with_stop_loss(50.0),
            )
            .unwrap();
        book.admit_aged(StopOrder::new(1.0, 100.0, Side::Short).unwrap())
            .unwrap();

        let executions = book.step(150.0, 50.0);

        // Converted market orders keep their age, so they execute at once.
        assert_eq!(executions.len(), 2);
        assert!(executions
            .iter()
            .all(|e| e.order.kind() == OrderKind::Market));
        assert_eq!(executions[0].order.origin(), Some(long_stop));
        assert_ne!(executions[0].order_id, long_stop);
        assert!(!book.contains(long_stop));

        // Only the long stop carried targets.
        assert_eq!(book.fillable_len(), 1);
        assert_eq!(book.triggerable_len(), 1);
    }

    #[test]
    fn test_admit_discards_carried_age() {
        let mut book = OrderBook::new();
        let id = book.admit(market(Side::Long).with_age(5)).unwrap();

        assert_eq!(book.get(id).unwrap().age(), 0);
        assert!(book.step(150.0, 50.0).is_empty());
        assert_eq!(book.step(150.0, 50.0).len(), 1);
    }

    #[test]
    fn test_fresh_stop_is_not_evaluated() {
        let mut book = OrderBook::new();
        let id = book
            .admit(StopOrder::new(1.0, 100.0, Side::Long).unwrap())
            .unwrap();

        assert!(book.step(150.0, 50.0).is_empty());
        assert!(book.contains(id));
        assert_eq!(book.triggerable_len(), 1);
    }

    #[test]
    fn test_untriggered_stop_stays() {
        let mut book = OrderBook::new();
        let id = book
            .admit_aged(StopOrder::new(1.0, 150.0, Side::Long).unwrap())
            .unwrap();

        assert!(book.step(149.0, 100.0).is_empty());
        assert_eq!(book.triggerable_len(), 1);
        assert_eq!(book.get(id).unwrap().age(), 2);
    }

    #[test]
    fn test_take_profit_then_stop_loss_lifecycle() {
        let mut book = OrderBook::new();
        book.admit(bracketed_market(Side::Long)).unwrap();
        book.step(120.0, 90.0);
        let entry = book.step(120.0, 90.0);
        assert_eq!(entry.len(), 1);

        // Range reaches neither target.
        assert!(book.step(150.0, 60.0).is_empty());

        // Stop-loss breached: the converted market order sells at 50.
        let exit = book.step(110.0, 40.0);
        assert_eq!(exit.len(), 1);
        assert_eq!(exit[0].position.side(), Side::Short);
        assert_eq!(exit[0].position.price(), 50.0);

        // The take-profit stays pending; no OCO link between the two.
        assert_eq!(book.fillable_len(), 1);
        assert_eq!(book.triggerable_len(), 0);
    }

    #[test]
    fn test_cancel() {
        let mut book = OrderBook::new();
        let lo = book
            .admit(LimitOrder::new(1.0, 90.0, Side::Long).unwrap())
            .unwrap();
        let so = book
            .admit(StopOrder::new(1.0, 110.0, Side::Long).unwrap())
            .unwrap();

        assert_eq!(book.cancel(lo).unwrap().kind(), OrderKind::Limit);
        assert_eq!(book.cancel(so).unwrap().kind(), OrderKind::Stop);
        assert!(book.cancel(so).is_none());
        assert!(book.is_empty());
    }
}
