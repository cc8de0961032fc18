//! Simulated retail order flow.
//!
//! Twenty autonomous producers per instrument, each drawing think-time,
//! side, type, quantity, and price from uniform distributions around the
//! instrument's seed price. Producers submit straight to their book and
//! ship their own event rows.

use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::EngineError;
use crate::exchange::{Exchange, InstrumentBook};
use crate::instruments::InstrumentCatalog;
use crate::models::{
    price_to_ticks, ticks_to_price, Order, OrderStatus, OrderType, Side, TimeInForce,
};
use crate::sink::EventSink;

/// Hard cap on simulated trader ids (0..9999); hitting it is fatal at
/// construction time.
pub const MAX_TRADERS: usize = 10_000;

const THINK_TIME_MS: std::ops::RangeInclusive<u64> = 100..=2000;
const QUANTITY_RANGE: std::ops::RangeInclusive<u64> = 1..=100;
const PRICE_BAND: std::ops::RangeInclusive<f64> = 0.95..=1.05;

/// Submit an order and emit its event rows: one NEW row at placement,
/// plus the post-state row when matching advanced it.
pub fn place_and_log(book: &InstrumentBook, sink: &EventSink, order: Order) -> Order {
    sink.log_order(&order);
    let placed = book.submit(order);
    if placed.status != OrderStatus::New {
        sink.log_order(&placed);
    }
    placed
}

/// Process-wide trader-id allocation, deterministic per construction order.
pub struct TraderIdAllocator {
    next: AtomicUsize,
}

impl TraderIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
        }
    }

    pub fn allocate(&self) -> Result<String, EngineError> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        if id >= MAX_TRADERS {
            return Err(EngineError::TraderLimit { max: MAX_TRADERS });
        }
        Ok(id.to_string())
    }
}

impl Default for TraderIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProducerPool {
    workers: Vec<JoinHandle<()>>,
}

impl ProducerPool {
    /// Spawn `per_instrument` producers for every catalog instrument.
    pub fn spawn(
        exchange: &Exchange,
        catalog: &InstrumentCatalog,
        sink: Arc<EventSink>,
        stop: Arc<AtomicBool>,
        per_instrument: usize,
    ) -> Result<Self, EngineError> {
        let allocator = TraderIdAllocator::new();
        let mut workers = Vec::with_capacity(catalog.instruments().len() * per_instrument);

        for instrument in catalog.instruments() {
            let book = exchange
                .book(instrument.id)
                .ok_or(EngineError::UnknownInstrument(instrument.id))?;
            for _ in 0..per_instrument {
                let trader_id = allocator.allocate()?;
                let book = book.clone();
                let sink = sink.clone();
                let stop = stop.clone();
                let seed_price = instrument.seed_price;
                let handle = thread::Builder::new()
                    .name(format!("producer-{}", trader_id))
                    .spawn(move || run_producer(book, sink, stop, trader_id, seed_price))
                    .expect("spawn producer");
                workers.push(handle);
            }
        }

        tracing::info!(count = workers.len(), "producer pool started");
        Ok(Self { workers })
    }

    /// Drain every producer to completion.
    pub fn join(self) {
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

fn run_producer(
    book: Arc<InstrumentBook>,
    sink: Arc<EventSink>,
    stop: Arc<AtomicBool>,
    trader_id: String,
    seed_price: u64,
) {
    let mut rng = rand::thread_rng();
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(rng.gen_range(THINK_TIME_MS)));
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let side = if rng.gen_range(0..=1) == 0 {
            Side::Buy
        } else {
            Side::Sell
        };
        // Parity of a fresh uniform draw decides the type
        let order_type = if rng.gen_range(QUANTITY_RANGE) % 2 == 0 {
            OrderType::Limit
        } else {
            OrderType::Market
        };
        let quantity = rng.gen_range(QUANTITY_RANGE);
        let price = price_to_ticks(ticks_to_price(seed_price) * rng.gen_range(PRICE_BAND));

        let order = Order::new(
            order_type,
            side,
            price,
            quantity,
            TimeInForce::Gtc,
            trader_id.clone(),
            book.instrument_id(),
        );
        place_and_log(&book, &sink, order);
    }
}
