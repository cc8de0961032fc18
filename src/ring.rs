//! Ring coordinator: four participants trading in a directed cycle.
//!
//! Participants 2500 -> 2600 -> 2700 -> 2800 -> 2500 pass quantity around
//! an 8-step rotation on instrument 1. A BUY step anchors a fresh ring
//! price; the SELL that follows reuses it, so each pair crosses at an
//! identical price. Workers rendezvous on a shared condition variable and
//! only act when the step table points at them. Optional at startup.

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::exchange::InstrumentBook;
use crate::models::{price_to_ticks, ticks_to_price, Order, OrderType, Side, TimeInForce};
use crate::producers::place_and_log;
use crate::sink::EventSink;

pub const RING_PARTICIPANTS: [&str; 4] = ["2500", "2600", "2700", "2800"];
pub const CIRCULAR_QUANTITY: u64 = 5_000;
const CIRCULAR_STEP: Duration = Duration::from_millis(500);
const CIRCULAR_PAUSE: Duration = Duration::from_millis(3_000);
/// How long a waiting worker blocks before re-checking the stop flag.
const WAIT_SLICE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
struct StepSpec {
    member: usize,
    side: Side,
    sets_price: bool,
}

/// The 8-step rotation. Every BUY anchors the price its paired SELL reuses.
const CYCLE: [StepSpec; 8] = [
    StepSpec { member: 0, side: Side::Buy, sets_price: true },
    StepSpec { member: 1, side: Side::Sell, sets_price: false },
    StepSpec { member: 1, side: Side::Buy, sets_price: true },
    StepSpec { member: 2, side: Side::Sell, sets_price: false },
    StepSpec { member: 2, side: Side::Buy, sets_price: true },
    StepSpec { member: 3, side: Side::Sell, sets_price: false },
    StepSpec { member: 3, side: Side::Buy, sets_price: true },
    StepSpec { member: 0, side: Side::Sell, sets_price: false },
];

struct RingState {
    step: usize,
    price: u64,
    /// Set while a participant is between submit and the end of its step
    /// sleep; the next participant may not act until it clears. This is
    /// what paces the rotation at the step interval.
    in_flight: bool,
}

/// Anchor price: seed times a tight uniform band, two-decimal exact.
fn anchor_price(seed_price: u64, rng: &mut impl Rng) -> u64 {
    price_to_ticks(ticks_to_price(seed_price) * rng.gen_range(0.998..=1.002))
}

pub struct RingCoordinator {
    workers: Vec<JoinHandle<()>>,
}

impl RingCoordinator {
    pub fn spawn(
        book: Arc<InstrumentBook>,
        seed_price: u64,
        sink: Arc<EventSink>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let shared = Arc::new((
            Mutex::new(RingState {
                step: 0,
                price: seed_price,
                in_flight: false,
            }),
            Condvar::new(),
        ));

        let workers = (0..RING_PARTICIPANTS.len())
            .map(|idx| {
                let book = book.clone();
                let sink = sink.clone();
                let stop = stop.clone();
                let shared = shared.clone();
                thread::Builder::new()
                    .name(format!("ring-{}", RING_PARTICIPANTS[idx]))
                    .spawn(move || run_member(idx, book, seed_price, sink, stop, shared))
                    .expect("spawn ring worker")
            })
            .collect();

        tracing::info!(instrument_id = book.instrument_id(), "ring coordinator started");
        Self { workers }
    }

    pub fn join(self) {
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

fn run_member(
    idx: usize,
    book: Arc<InstrumentBook>,
    seed_price: u64,
    sink: Arc<EventSink>,
    stop: Arc<AtomicBool>,
    shared: Arc<(Mutex<RingState>, Condvar)>,
) {
    let (state_lock, cv) = &*shared;
    let mut rng = rand::thread_rng();

    loop {
        // Block until the step table points at this member and the previous
        // participant has finished its step sleep.
        let (side, price, rotation_done) = {
            let mut state = state_lock.lock().expect("ring lock");
            loop {
                if stop.load(Ordering::Relaxed) {
                    cv.notify_all();
                    return;
                }
                if !state.in_flight && CYCLE[state.step % CYCLE.len()].member == idx {
                    break;
                }
                let (guard, _) = cv
                    .wait_timeout(state, WAIT_SLICE)
                    .expect("ring condvar wait");
                state = guard;
            }

            let spec = CYCLE[state.step % CYCLE.len()];
            if spec.sets_price {
                state.price = anchor_price(seed_price, &mut rng);
            }
            let price = state.price;
            state.step += 1;
            state.in_flight = true;
            (spec.side, price, state.step % CYCLE.len() == 0)
        };

        let order = Order::new(
            OrderType::Limit,
            side,
            price,
            CIRCULAR_QUANTITY,
            TimeInForce::Gtc,
            RING_PARTICIPANTS[idx],
            book.instrument_id(),
        );
        place_and_log(&book, &sink, order);

        thread::sleep(if rotation_done {
            CIRCULAR_PAUSE
        } else {
            CIRCULAR_STEP
        });

        state_lock.lock().expect("ring lock").in_flight = false;
        cv.notify_all();
    }
}
