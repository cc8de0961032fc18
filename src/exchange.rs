//! Exchange - concurrent ownership of one book per instrument
//!
//! `InstrumentBook` wraps the book structure in a mutex and keeps volume
//! counters in lock-free atomics so observers (display, depth endpoint)
//! never contend with producers that are only reading totals. Matching,
//! cancellation, and expiry are totally ordered by the book lock; event
//! rows are emitted after the lock is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::engine::MatchingEngine;
use crate::instruments::InstrumentCatalog;
use crate::models::{now_us, Order, Side, Trade};
use crate::orderbook::OrderBook;
use crate::sink::EventSink;

/// Orders still pending (NEW or PARTIAL) after this many seconds expire.
pub const ORDER_EXPIRY_SECS: u64 = 5;

/// Cadence of the expiry sweep.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Top-of-book snapshot for observers, best levels first.
#[derive(Debug, Clone)]
pub struct DepthSnapshot {
    pub bids: Vec<(u64, u64)>,
    pub asks: Vec<(u64, u64)>,
}

/// One instrument's book plus its concurrency envelope.
pub struct InstrumentBook {
    instrument_id: u32,
    inner: Mutex<OrderBook>,
    sink: Arc<EventSink>,
    expiry_horizon: Duration,
    total_volume: AtomicU64,
    buy_volume: AtomicU64,
    sell_volume: AtomicU64,
    trade_count: AtomicU64,
}

impl InstrumentBook {
    pub fn new(instrument_id: u32, sink: Arc<EventSink>, expiry_horizon: Duration) -> Self {
        Self {
            instrument_id,
            inner: Mutex::new(OrderBook::new()),
            sink,
            expiry_horizon,
            total_volume: AtomicU64::new(0),
            buy_volume: AtomicU64::new(0),
            sell_volume: AtomicU64::new(0),
            trade_count: AtomicU64::new(0),
        }
    }

    pub fn instrument_id(&self) -> u32 {
        self.instrument_id
    }

    /// Match an incoming order, returning its post-state.
    ///
    /// Emits, after the lock is released: one row per affected resting
    /// order (post-state), then one TRADE_MATCH row per execution. The
    /// caller owns the incoming order's own event rows.
    pub fn submit(&self, order: Order) -> Order {
        debug_assert_eq!(order.instrument_id, self.instrument_id);
        let outcome = {
            let mut book = self.inner.lock().expect("book lock");
            MatchingEngine::process_order(&mut book, order)
        };

        let executed = outcome.executed_qty();
        if executed > 0 {
            self.total_volume.fetch_add(executed, Ordering::Relaxed);
            match outcome.order.side {
                Side::Buy => self.buy_volume.fetch_add(executed, Ordering::Relaxed),
                Side::Sell => self.sell_volume.fetch_add(executed, Ordering::Relaxed),
            };
            self.trade_count
                .fetch_add(outcome.trades.len() as u64, Ordering::Relaxed);
        }

        for resting in &outcome.touched {
            self.sink.log_order(resting);
        }
        for trade in &outcome.trades {
            self.sink.log_trade(trade);
        }
        outcome.order
    }

    /// Cancel by id. Unknown ids and terminal orders are silent noops;
    /// a successful cancel emits one CANCELLED row.
    pub fn cancel(&self, order_id: &str) -> Option<Order> {
        let cancelled = {
            let mut book = self.inner.lock().expect("book lock");
            MatchingEngine::cancel_order(&mut book, order_id, now_us())
        };
        if let Some(order) = &cancelled {
            self.sink.log_order(order);
        }
        cancelled
    }

    /// One expiry sweep: remove every order pending longer than the
    /// horizon, then emit EXPIRED rows outside the lock.
    pub fn expire_pending(&self) -> usize {
        let cutoff = now_us() - self.expiry_horizon.as_micros() as i64;
        let expired = {
            let mut book = self.inner.lock().expect("book lock");
            book.expire_older_than(cutoff)
        };
        for order in &expired {
            self.sink.log_order(order);
        }
        if !expired.is_empty() {
            tracing::debug!(
                instrument_id = self.instrument_id,
                count = expired.len(),
                "expired pending orders"
            );
        }
        expired.len()
    }

    pub fn best_bid(&self) -> u64 {
        self.inner.lock().expect("book lock").best_bid()
    }

    pub fn best_ask(&self) -> u64 {
        self.inner.lock().expect("book lock").best_ask()
    }

    pub fn recent_trades(&self) -> Vec<Trade> {
        self.inner.lock().expect("book lock").recent_trades()
    }

    pub fn depth_snapshot(&self, top_n: usize) -> DepthSnapshot {
        let book = self.inner.lock().expect("book lock");
        let (bids, asks) = book.depth(top_n);
        DepthSnapshot { bids, asks }
    }

    pub fn order_status(&self, order_id: &str) -> Option<Order> {
        self.inner.lock().expect("book lock").order(order_id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().expect("book lock").live_count()
    }

    // Volume counters: lock-free reads, fine to observe slightly stale.

    pub fn total_volume(&self) -> u64 {
        self.total_volume.load(Ordering::Relaxed)
    }

    pub fn buy_volume(&self) -> u64 {
        self.buy_volume.load(Ordering::Relaxed)
    }

    pub fn sell_volume(&self) -> u64 {
        self.sell_volume.load(Ordering::Relaxed)
    }

    pub fn trade_count(&self) -> u64 {
        self.trade_count.load(Ordering::Relaxed)
    }
}

/// All books, one per catalog instrument.
pub struct Exchange {
    books: HashMap<u32, Arc<InstrumentBook>>,
}

impl Exchange {
    pub fn new(
        catalog: &InstrumentCatalog,
        sink: Arc<EventSink>,
        expiry_horizon: Duration,
    ) -> Self {
        let books = catalog
            .instruments()
            .iter()
            .map(|inst| {
                (
                    inst.id,
                    Arc::new(InstrumentBook::new(inst.id, sink.clone(), expiry_horizon)),
                )
            })
            .collect();
        Self { books }
    }

    pub fn book(&self, instrument_id: u32) -> Option<Arc<InstrumentBook>> {
        self.books.get(&instrument_id).cloned()
    }

    pub fn books(&self) -> impl Iterator<Item = &Arc<InstrumentBook>> {
        self.books.values()
    }

    pub fn instrument_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.books.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// One expiry worker per book: sleep a second, sweep, until stopped.
    /// The caller joins the returned handles during orderly shutdown.
    pub fn spawn_expiry_workers(&self, stop: Arc<AtomicBool>) -> Vec<JoinHandle<()>> {
        self.books
            .values()
            .map(|book| {
                let book = book.clone();
                let stop = stop.clone();
                thread::Builder::new()
                    .name(format!("expiry-{}", book.instrument_id()))
                    .spawn(move || {
                        while !stop.load(Ordering::Relaxed) {
                            thread::sleep(EXPIRY_SWEEP_INTERVAL);
                            book.expire_pending();
                        }
                    })
                    .expect("spawn expiry worker")
            })
            .collect()
    }
}
