//! OrderBook - BTreeMap-based price-time priority book structure
//!
//! This module contains only the book data structure (price levels, the
//! by-id live-order index, the recent-trade window). The matching logic
//! lives in the engine module; locking is provided by the enclosing
//! `InstrumentBook`.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashMap;

use crate::models::{Order, OrderStatus, Side, Trade};

/// How many executed trades the per-book window retains.
const RECENT_TRADE_WINDOW: usize = 100;

/// FIFO of resting order ids sharing one price, with a cached aggregate
/// of their remaining quantities.
///
/// Created lazily when the first order arrives at the price; the book
/// deletes it once it empties. The cache invariant - `total_quantity`
/// equals the sum of members' remaining - is maintained by the book on
/// every fill and removal.
#[derive(Debug)]
pub struct PriceLevel {
    price: u64,
    orders: VecDeque<String>,
    total_quantity: u64,
}

impl PriceLevel {
    pub fn new(price: u64) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_quantity: 0,
        }
    }

    pub fn push_back(&mut self, order_id: String, remaining: u64) {
        self.orders.push_back(order_id);
        self.total_quantity += remaining;
    }

    /// Head of the FIFO (oldest order at this price).
    pub fn front(&self) -> Option<&str> {
        self.orders.front().map(String::as_str)
    }

    /// Remove one order by id, giving back the remaining quantity it held.
    /// Linear scan; the book's id index keeps this off the hot path.
    pub fn remove(&mut self, order_id: &str, remaining: u64) -> bool {
        if let Some(pos) = self.orders.iter().position(|id| id == order_id) {
            self.orders.remove(pos);
            self.total_quantity -= remaining;
            return true;
        }
        false
    }

    /// Account for a partial execution against a member.
    pub fn reduce(&mut self, qty: u64) {
        debug_assert!(qty <= self.total_quantity);
        self.total_quantity -= qty;
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn total_quantity(&self) -> u64 {
        self.total_quantity
    }
}

/// The book structure for one instrument.
///
/// # Key design
/// - Asks are stored with natural keys (ascending, lowest price = best ask)
/// - Bids use negated keys `u64::MAX - price` (so highest price comes first)
///
/// Both sides therefore take `first_key_value()` for their best level.
/// `live` owns every resting order; price levels hold ids only.
#[derive(Debug, Default)]
pub struct OrderBook {
    pub(crate) bids: BTreeMap<u64, PriceLevel>,
    pub(crate) asks: BTreeMap<u64, PriceLevel>,
    pub(crate) live: FxHashMap<String, Order>,
    recent_trades: VecDeque<Trade>,
}

/// Bid-side map key: negated so the highest price sorts first.
#[inline]
pub(crate) fn bid_key(price: u64) -> u64 {
    u64::MAX - price
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rest an order in its side map, creating the level lazily, and index it.
    pub fn rest_order(&mut self, order: Order) {
        debug_assert!(order.remaining > 0);
        debug_assert!(!order.status.is_terminal());
        let level = match order.side {
            Side::Buy => self
                .bids
                .entry(bid_key(order.price))
                .or_insert_with(|| PriceLevel::new(order.price)),
            Side::Sell => self
                .asks
                .entry(order.price)
                .or_insert_with(|| PriceLevel::new(order.price)),
        };
        level.push_back(order.id.clone(), order.remaining);
        self.live.insert(order.id.clone(), order);
    }

    /// Remove an order from its level and the id index, deleting the level
    /// if it empties. Returns the owned order, or None for unknown ids.
    pub fn remove_order(&mut self, order_id: &str) -> Option<Order> {
        let order = self.live.remove(order_id)?;
        let (side_map, key) = match order.side {
            Side::Buy => (&mut self.bids, bid_key(order.price)),
            Side::Sell => (&mut self.asks, order.price),
        };
        if let Some(level) = side_map.get_mut(&key) {
            level.remove(order_id, order.remaining);
            if level.is_empty() {
                side_map.remove(&key);
            }
        }
        Some(order)
    }

    /// Highest resting buy price, or 0 when the side is empty.
    #[inline]
    pub fn best_bid(&self) -> u64 {
        self.bids
            .first_key_value()
            .map(|(k, _)| u64::MAX - k)
            .unwrap_or(0)
    }

    /// Lowest resting sell price, or 0 when the side is empty.
    #[inline]
    pub fn best_ask(&self) -> u64 {
        self.asks.first_key_value().map(|(k, _)| *k).unwrap_or(0)
    }

    /// Top-N levels of each side as (price, aggregate qty), best first.
    pub fn depth(&self, top_n: usize) -> (Vec<(u64, u64)>, Vec<(u64, u64)>) {
        let bids = self
            .bids
            .values()
            .take(top_n)
            .map(|l| (l.price(), l.total_quantity()))
            .collect();
        let asks = self
            .asks
            .values()
            .take(top_n)
            .map(|l| (l.price(), l.total_quantity()))
            .collect();
        (bids, asks)
    }

    pub fn record_trade(&mut self, trade: Trade) {
        if self.recent_trades.len() >= RECENT_TRADE_WINDOW {
            self.recent_trades.pop_front();
        }
        self.recent_trades.push_back(trade);
    }

    pub fn recent_trades(&self) -> Vec<Trade> {
        self.recent_trades.iter().cloned().collect()
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.live.get(order_id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Remove and expire every pending order submitted at or before `cutoff_us`.
    /// Returns the expired orders for event emission outside the book lock.
    pub fn expire_older_than(&mut self, cutoff_us: i64) -> Vec<Order> {
        let stale: Vec<String> = self
            .live
            .values()
            .filter(|o| {
                matches!(o.status, OrderStatus::New | OrderStatus::PartiallyFilled)
                    && o.submit_ts_us <= cutoff_us
            })
            .map(|o| o.id.clone())
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for id in stale {
            if let Some(mut order) = self.remove_order(&id) {
                order.expire();
                expired.push(order);
            }
        }
        expired
    }

    /// All resting orders, bids first (best price, then FIFO), then asks.
    pub fn all_orders(&self) -> Vec<&Order> {
        self.bids
            .values()
            .chain(self.asks.values())
            .flat_map(|level| level.orders.iter())
            .filter_map(|id| self.live.get(id))
            .collect()
    }
}
