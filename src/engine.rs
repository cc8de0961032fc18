//! Matching Engine - order matching and trade generation
//!
//! The engine handles:
//! 1. Matching incoming orders against the opposite side of the book
//! 2. Generating trades at the resting (maker) price
//! 3. Updating order status and resting any remainder
//!
//! Locking and event emission are the enclosing `InstrumentBook`'s job;
//! everything here runs on an exclusively borrowed book structure.

use crate::models::{Order, OrderType, Side, TimeInForce, Trade};
use crate::orderbook::OrderBook;

/// Result of processing one incoming order.
pub struct SubmitOutcome {
    /// Incoming order post-state (also rested in the book when non-terminal
    /// and non-IOC with remaining quantity).
    pub order: Order,
    pub trades: Vec<Trade>,
    /// Post-state snapshots of every resting order the matching touched,
    /// in match order. One event row is emitted per entry.
    pub touched: Vec<Order>,
}

impl SubmitOutcome {
    pub fn executed_qty(&self) -> u64 {
        self.trades.iter().map(|t| t.quantity).sum()
    }
}

/// Does the best opposite price cross the incoming limit?
/// Market orders carry an effectively infinite limit.
fn crosses(incoming: &Order, best_opp: u64) -> bool {
    if incoming.order_type == OrderType::Market {
        return true;
    }
    match incoming.side {
        Side::Buy => best_opp <= incoming.price,
        Side::Sell => best_opp >= incoming.price,
    }
}

/// Matching engine that processes orders and generates trades
pub struct MatchingEngine;

impl MatchingEngine {
    /// Process an order: match against the book, rest any remainder.
    ///
    /// # Flow
    /// 1. While the best opposite level crosses, fill against its FIFO head
    /// 2. Stamp the trade context into both sides of every execution
    /// 3. Rest the remainder unless the order is IOC
    pub fn process_order(book: &mut OrderBook, mut incoming: Order) -> SubmitOutcome {
        let mut trades: Vec<Trade> = Vec::new();
        let mut touched: Vec<Order> = Vec::new();

        while incoming.remaining > 0 {
            // Best opposite level; both sides sort best-first.
            let (key, best_price) = match incoming.side {
                Side::Buy => match book.asks.first_key_value() {
                    Some((k, level)) => (*k, level.price()),
                    None => break,
                },
                Side::Sell => match book.bids.first_key_value() {
                    Some((k, level)) => (*k, level.price()),
                    None => break,
                },
            };
            if !crosses(&incoming, best_price) {
                break;
            }

            // Drain the level head-first.
            loop {
                let head_id = {
                    let level = match incoming.side {
                        Side::Buy => book.asks.get(&key),
                        Side::Sell => book.bids.get(&key),
                    };
                    match level.and_then(|l| l.front()) {
                        Some(id) => id.to_string(),
                        None => break,
                    }
                };

                let resting = book
                    .live
                    .get_mut(&head_id)
                    .expect("level member present in live index");
                let match_qty = incoming.remaining.min(resting.remaining);

                // Buyer/seller assignment by side; the incoming order is
                // always the aggressor.
                let trade = match incoming.side {
                    Side::Buy => Trade::new(
                        incoming.id.clone(),
                        resting.id.clone(),
                        best_price,
                        match_qty,
                        incoming.trader_id.clone(),
                        resting.trader_id.clone(),
                        Side::Buy,
                        incoming.instrument_id,
                    ),
                    Side::Sell => Trade::new(
                        resting.id.clone(),
                        incoming.id.clone(),
                        best_price,
                        match_qty,
                        resting.trader_id.clone(),
                        incoming.trader_id.clone(),
                        Side::Sell,
                        incoming.instrument_id,
                    ),
                };

                incoming.fill_with_trade_context(
                    match_qty,
                    &trade.id,
                    &trade.buyer_id,
                    &trade.seller_id,
                );
                resting.fill_with_trade_context(
                    match_qty,
                    &trade.id,
                    &trade.buyer_id,
                    &trade.seller_id,
                );
                let resting_filled = resting.is_filled();

                let level = match incoming.side {
                    Side::Buy => book.asks.get_mut(&key),
                    Side::Sell => book.bids.get_mut(&key),
                };
                level
                    .expect("level present while draining")
                    .reduce(match_qty);

                if resting_filled {
                    // Deletes the level too once it empties.
                    let done = book
                        .remove_order(&head_id)
                        .expect("filled resting order removable");
                    touched.push(done);
                } else {
                    touched.push(book.live.get(&head_id).cloned().expect("partial rests"));
                }
                trades.push(trade);

                if incoming.remaining == 0 {
                    break;
                }
            }
        }

        // IOC never rests; everything else keeps its remainder at its
        // (possibly synthesized) limit price.
        if incoming.remaining > 0 && incoming.tif != TimeInForce::Ioc {
            book.rest_order(incoming.clone());
        }

        for trade in &trades {
            book.record_trade(trade.clone());
        }

        SubmitOutcome {
            order: incoming,
            trades,
            touched,
        }
    }

    /// Cancel by id: remove from the book and mark CANCELLED.
    ///
    /// Unknown ids are a silent noop (the order may already be filled,
    /// expired, or never existed); terminal orders are never in the book.
    pub fn cancel_order(book: &mut OrderBook, order_id: &str, ts_us: i64) -> Option<Order> {
        let mut order = book.remove_order(order_id)?;
        order.cancel(ts_us);
        Some(order)
    }
}
