//! Wash-trading producer: mirrored BUY/SELL bursts.
//!
//! One dedicated producer (trader id 2500) submits pairs of opposing
//! LIMIT orders at an identical price and quantity so each pair crosses
//! against itself. Optional at startup.

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::exchange::InstrumentBook;
use crate::models::{price_to_ticks, ticks_to_price, Order, OrderType, Side, TimeInForce};
use crate::producers::place_and_log;
use crate::sink::EventSink;

pub const WASH_TRADER_ID: &str = "2500";
pub const WASH_QUANTITY: u64 = 10_000;
pub const WASH_BURST_PAIRS: usize = 5;
const WASH_INTERVAL: Duration = Duration::from_millis(300);
const WASH_PAUSE: Duration = Duration::from_millis(4_000);

/// Pair price: seed times a tight uniform band, rounded to two decimals
/// by the tick representation.
fn wash_price(seed_price: u64, rng: &mut impl Rng) -> u64 {
    price_to_ticks(ticks_to_price(seed_price) * rng.gen_range(0.999..=1.001))
}

pub struct WashProducer {
    handle: JoinHandle<()>,
}

impl WashProducer {
    pub fn spawn(
        book: Arc<InstrumentBook>,
        seed_price: u64,
        sink: Arc<EventSink>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let handle = thread::Builder::new()
            .name("wash-producer".to_string())
            .spawn(move || run(book, seed_price, sink, stop))
            .expect("spawn wash producer");
        Self { handle }
    }

    pub fn join(self) {
        let _ = self.handle.join();
    }
}

fn run(book: Arc<InstrumentBook>, seed_price: u64, sink: Arc<EventSink>, stop: Arc<AtomicBool>) {
    let mut rng = rand::thread_rng();
    tracing::info!(
        instrument_id = book.instrument_id(),
        trader_id = WASH_TRADER_ID,
        "wash producer started"
    );

    while !stop.load(Ordering::Relaxed) {
        for _ in 0..WASH_BURST_PAIRS {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            // Both legs of the pair share this exact price and quantity
            let price = wash_price(seed_price, &mut rng);

            let buy = Order::new(
                OrderType::Limit,
                Side::Buy,
                price,
                WASH_QUANTITY,
                TimeInForce::Gtc,
                WASH_TRADER_ID,
                book.instrument_id(),
            );
            place_and_log(&book, &sink, buy);
            thread::sleep(WASH_INTERVAL);

            if stop.load(Ordering::Relaxed) {
                return;
            }
            let sell = Order::new(
                OrderType::Limit,
                Side::Sell,
                price,
                WASH_QUANTITY,
                TimeInForce::Gtc,
                WASH_TRADER_ID,
                book.instrument_id(),
            );
            place_and_log(&book, &sink, sell);
            thread::sleep(WASH_INTERVAL);
        }
        thread::sleep(WASH_PAUSE);
    }
}
