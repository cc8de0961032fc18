//! End-to-end scenarios driven through the concurrent book API, with the
//! event stream captured off a real TCP listener where the scenario calls
//! for it.

use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use matchbook::exchange::{Exchange, InstrumentBook};
use matchbook::instruments::catalog;
use matchbook::models::{Order, OrderStatus, OrderType, Side, TimeInForce};
use matchbook::producers::place_and_log;
use matchbook::sink::EventSink;

/// Listener that accepts one sink connection and accumulates its lines.
fn start_capture() -> (u16, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = lines.clone();
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(line) => sink_lines.lock().unwrap().push(line),
                Err(_) => break,
            }
        }
    });
    (port, lines)
}

fn wait_for_lines(lines: &Arc<Mutex<Vec<String>>>, count: usize) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        {
            let captured = lines.lock().unwrap();
            if captured.len() >= count {
                return captured.clone();
            }
        }
        assert!(Instant::now() < deadline, "timed out waiting for {count} event rows");
        thread::sleep(Duration::from_millis(20));
    }
}

fn tag_value<'a>(line: &'a str, tag: &str) -> &'a str {
    let needle = format!("{tag}=");
    let start = line.find(&needle).unwrap_or_else(|| panic!("{tag} missing in {line}")) + needle.len();
    let rest = &line[start..];
    let end = rest.find([',', ' ']).unwrap_or(rest.len());
    &rest[..end]
}

fn dropping_sink() -> Arc<EventSink> {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    Arc::new(EventSink::connect("127.0.0.1", port))
}

fn limit(side: Side, price: u64, qty: u64, trader: &str) -> Order {
    Order::new(OrderType::Limit, side, price, qty, TimeInForce::Gtc, trader, 1)
}

fn ioc(side: Side, price: u64, qty: u64, trader: &str) -> Order {
    Order::new(OrderType::Limit, side, price, qty, TimeInForce::Ioc, trader, 1)
}

#[test]
fn simple_cross_emits_full_event_sequence() {
    let (port, lines) = start_capture();
    let sink = Arc::new(EventSink::connect("127.0.0.1", port));
    let book = InstrumentBook::new(1, sink.clone(), Duration::from_secs(60));

    // Trader A rests a buy, trader B crosses with the mirror sell.
    let a = place_and_log(&book, &sink, limit(Side::Buy, 1_000, 100, "A"));
    let b = place_and_log(&book, &sink, limit(Side::Sell, 1_000, 100, "B"));

    assert_eq!(a.status, OrderStatus::New);
    assert_eq!(b.status, OrderStatus::Filled);

    let trades = book.recent_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, 1_000);
    assert_eq!(trades[0].quantity, 100);
    assert_eq!(trades[0].aggressor_side, Side::Sell);

    // Book is empty again
    assert_eq!(book.best_bid(), 0);
    assert_eq!(book.best_ask(), 0);
    assert_eq!(book.live_count(), 0);

    let captured = wait_for_lines(&lines, 5);
    let events: Vec<&str> = captured
        .iter()
        .map(|l| tag_value(l, "order_status_event"))
        .collect();
    assert_eq!(
        events,
        vec![
            "ORDER_NEW",    // A at placement
            "ORDER_NEW",    // B at placement
            "ORDER_FILLED", // A, emitted by the book as the touched resting order
            "TRADE_MATCH",
            "ORDER_FILLED", // B post-state, emitted by the caller
        ]
    );

    // Both FILLED rows reference the trade the TRADE_MATCH row announces
    let trade_id = tag_value(&captured[3], "trade_id").to_string();
    assert!(trade_id.starts_with("TRD-1-"));
    assert_eq!(tag_value(&captured[2], "trade_id"), trade_id);
    assert_eq!(tag_value(&captured[4], "trade_id"), trade_id);
    assert_eq!(tag_value(&captured[3], "aggressor_side"), "SELL");
    assert_eq!(tag_value(&captured[3], "user_id"), "A"); // buyer
}

#[test]
fn partial_fill_leaves_residual_resting() {
    let sink = dropping_sink();
    let book = InstrumentBook::new(1, sink.clone(), Duration::from_secs(60));

    let buy = place_and_log(&book, &sink, limit(Side::Buy, 1_000, 100, "A"));
    let sell = place_and_log(&book, &sink, limit(Side::Sell, 1_000, 40, "B"));

    assert_eq!(sell.status, OrderStatus::Filled);
    let residual = book.order_status(&buy.id).unwrap();
    assert_eq!(residual.status, OrderStatus::PartiallyFilled);
    assert_eq!(residual.remaining, 60);

    assert_eq!(book.best_bid(), 1_000);
    assert_eq!(book.best_ask(), 0);

    let trades = book.recent_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, 40);
}

#[test]
fn non_crossing_orders_rest_on_both_sides() {
    let sink = dropping_sink();
    let book = InstrumentBook::new(1, sink.clone(), Duration::from_secs(60));

    place_and_log(&book, &sink, limit(Side::Buy, 950, 50, "A"));
    place_and_log(&book, &sink, limit(Side::Sell, 1_000, 50, "B"));

    assert!(book.recent_trades().is_empty());
    assert_eq!(book.best_bid(), 950);
    assert_eq!(book.best_ask(), 1_000);
}

#[test]
fn ioc_that_cannot_match_leaves_no_trace() {
    let (port, lines) = start_capture();
    let sink = Arc::new(EventSink::connect("127.0.0.1", port));
    let book = InstrumentBook::new(1, sink.clone(), Duration::from_secs(60));

    let resting = place_and_log(&book, &sink, limit(Side::Sell, 1_000, 50, "A"));
    let taker = place_and_log(&book, &sink, ioc(Side::Buy, 900, 50, "B"));

    assert_eq!(taker.status, OrderStatus::New);
    assert!(book.recent_trades().is_empty());

    // Book unchanged: the resting sell alone
    assert_eq!(book.live_count(), 1);
    assert!(book.order_status(&resting.id).is_some());
    assert_eq!(book.best_bid(), 0);
    assert_eq!(book.best_ask(), 1_000);

    // Exactly one row for the IOC order: its ORDER_NEW at placement
    let captured = wait_for_lines(&lines, 2);
    assert_eq!(captured.len(), 2);
    let ioc_rows: Vec<&String> = captured
        .iter()
        .filter(|l| tag_value(l, "user_id") == "B")
        .collect();
    assert_eq!(ioc_rows.len(), 1);
    assert_eq!(tag_value(ioc_rows[0], "order_status_event"), "ORDER_NEW");
}

#[test]
fn time_priority_fills_oldest_first() {
    let sink = dropping_sink();
    let book = InstrumentBook::new(1, sink.clone(), Duration::from_secs(60));

    let a = place_and_log(&book, &sink, limit(Side::Buy, 1_000, 50, "A"));
    let b = place_and_log(&book, &sink, limit(Side::Buy, 1_000, 50, "B"));
    let taker = place_and_log(&book, &sink, limit(Side::Sell, 1_000, 50, "C"));

    assert_eq!(taker.status, OrderStatus::Filled);
    // A, submitted first, filled; B rests untouched
    assert!(book.order_status(&a.id).is_none());
    let b_state = book.order_status(&b.id).unwrap();
    assert_eq!(b_state.status, OrderStatus::New);
    assert_eq!(b_state.remaining, 50);

    let trades = book.recent_trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].buy_order_id, a.id);
    assert_eq!(trades[0].buyer_id, "A");
}

#[test]
fn expiry_removes_stale_order_with_one_event() {
    let (port, lines) = start_capture();
    let sink = Arc::new(EventSink::connect("127.0.0.1", port));
    // Shortened horizon keeps the test fast; the binary runs with 5 s.
    let book = InstrumentBook::new(1, sink.clone(), Duration::from_secs(1));

    let placed = place_and_log(&book, &sink, limit(Side::Buy, 100, 10, "A"));
    thread::sleep(Duration::from_millis(1_200));
    assert_eq!(book.expire_pending(), 1);

    assert_eq!(book.live_count(), 0);
    assert_eq!(book.best_bid(), 0);

    let captured = wait_for_lines(&lines, 2);
    assert_eq!(captured.len(), 2);
    assert_eq!(tag_value(&captured[1], "order_status_event"), "ORDER_EXPIRED");
    assert_eq!(tag_value(&captured[1], "order_id"), placed.id);

    // A later sweep emits nothing further
    assert_eq!(book.expire_pending(), 0);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(lines.lock().unwrap().len(), 2);
}

#[test]
fn expiry_worker_sweeps_through_exchange() {
    let sink = dropping_sink();
    let exchange = Exchange::new(catalog(), sink.clone(), Duration::from_secs(1));
    let stop = Arc::new(AtomicBool::new(false));
    let workers = exchange.spawn_expiry_workers(stop.clone());

    let book = exchange.book(2).unwrap();
    place_and_log(
        &book,
        &sink,
        Order::new(OrderType::Limit, Side::Buy, 100, 10, TimeInForce::Gtc, "A", 2),
    );
    assert_eq!(book.live_count(), 1);

    thread::sleep(Duration::from_millis(2_500));
    assert_eq!(book.live_count(), 0);

    stop.store(true, Ordering::Relaxed);
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn volume_identity_holds_across_mixed_flow() {
    let sink = dropping_sink();
    let book = InstrumentBook::new(1, sink.clone(), Duration::from_secs(60));

    place_and_log(&book, &sink, limit(Side::Buy, 1_000, 30, "A"));
    place_and_log(&book, &sink, limit(Side::Sell, 1_000, 10, "B"));
    place_and_log(&book, &sink, limit(Side::Sell, 990, 50, "C"));
    place_and_log(&book, &sink, ioc(Side::Buy, 990, 5, "D"));

    assert_eq!(book.buy_volume() + book.sell_volume(), book.total_volume());
    let traded: u64 = book.recent_trades().iter().map(|t| t.quantity).sum();
    assert_eq!(traded, book.total_volume());
    assert_eq!(book.trade_count(), book.recent_trades().len() as u64);
}

#[test]
fn cancelled_order_stops_matching_and_logs_once() {
    let (port, lines) = start_capture();
    let sink = Arc::new(EventSink::connect("127.0.0.1", port));
    let book = InstrumentBook::new(1, sink.clone(), Duration::from_secs(60));

    let buy = place_and_log(&book, &sink, limit(Side::Buy, 1_000, 100, "A"));
    place_and_log(&book, &sink, limit(Side::Sell, 1_000, 40, "B"));

    let cancelled = book.cancel(&buy.id).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.remaining, 60);
    assert!(cancelled.cancel_ts_us > 0);

    // Cancelling again is a silent noop, structurally and on the wire
    assert!(book.cancel(&buy.id).is_none());

    let sell = place_and_log(&book, &sink, limit(Side::Sell, 1_000, 10, "C"));
    assert_eq!(sell.status, OrderStatus::New);
    assert_eq!(book.recent_trades().len(), 1);

    // Rows: NEW(A), NEW(B), PARTIAL(A), TRADE, FILLED(B), CANCELLED(A), NEW(C)
    let captured = wait_for_lines(&lines, 7);
    assert_eq!(captured.len(), 7);
    let cancelled_rows: Vec<&String> = captured
        .iter()
        .filter(|l| tag_value(l, "order_status_event") == "ORDER_CANCELLED")
        .collect();
    assert_eq!(cancelled_rows.len(), 1);
    // The cancel row still carries the stamped trade context
    assert!(tag_value(cancelled_rows[0], "trade_id").starts_with("TRD-1-"));
}
