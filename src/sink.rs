//! EventSink - line-protocol event shipper
//!
//! Streams order and trade events to a QuestDB ILP endpoint over one
//! persistent TCP connection. One row per `log_order` / `log_trade` call,
//! newline-framed, no response read.
//!
//! Delivery policy: the mutex guards the socket for exactly the duration
//! of one send. A failed send reconnects once and retries that single
//! record; if that also fails the record is dropped and the sink keeps
//! going. An absent endpoint at startup is a warning, not an error -
//! later sends lazily reconnect.

use std::fmt::Write as _;
use std::io::Write as _;
use std::net::TcpStream;
use std::sync::Mutex;

use crate::models::{market_phase, now_us, Order, Side, Trade, NA};

/// Measurement (table) name every record is written under.
const MEASUREMENT: &str = "trade_logs";

/// Replace ILP tag-special characters (space, comma, equals) with underscore.
pub fn sanitize_tag(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == ' ' || c == ',' || c == '=' { '_' } else { c })
        .collect()
}

fn ilp_bool(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "f"
    }
}

/// Build the ILP row for one order lifecycle event.
///
/// Tags ride the order's embedded trade context: sentinel `NA` until the
/// order first matches, the most recent trade's ids afterwards. The
/// designated (trailing) timestamp is the submit time in nanoseconds.
pub fn order_line(order: &Order, match_engine_ts_us: i64) -> String {
    let mut line = String::with_capacity(320);
    let _ = write!(
        line,
        "{m},order_id={oid},instrument_id={iid},order_type={otype},side={side},\
         order_status_event={event},user_id={uid},trade_id={tid},buyer_user_id={buyer},\
         seller_user_id={seller},aggressor_side={aggr},market_phase={phase},\
         device_id_hash={device} \
         price={price:.2},quantity={qty}i,filled_quantity={filled}i,\
         remaining_quantity={rem}i,is_short_sell={short},\
         order_submit_timestamp={submit}i,order_cancel_timestamp={cancel}i,\
         match_engine_timestamp={me}i {ts}\n",
        m = MEASUREMENT,
        oid = sanitize_tag(&order.id),
        iid = order.instrument_id,
        otype = order.order_type.as_str(),
        side = order.side.as_str(),
        event = order.status.event_label(),
        uid = sanitize_tag(&order.trader_id),
        tid = sanitize_tag(&order.trade_ctx.trade_id),
        buyer = sanitize_tag(&order.trade_ctx.buyer_id),
        seller = sanitize_tag(&order.trade_ctx.seller_id),
        aggr = NA,
        phase = order.market_phase().as_str(),
        device = order.device_hash(),
        price = crate::models::ticks_to_price(order.price),
        qty = order.quantity,
        filled = order.filled_qty(),
        rem = order.remaining,
        short = ilp_bool(order.is_short_sell),
        submit = order.submit_ts_us,
        cancel = order.cancel_ts_us,
        me = match_engine_ts_us,
        ts = order.submit_ts_us * 1_000,
    );
    line
}

/// Build the TRADE_MATCH row for one execution.
///
/// `order_id` is the buy-side order id, `user_id` the buyer, `side` the
/// aggressor side, and the device fingerprint belongs to the aggressor's
/// trader. The designated timestamp is the execution time.
pub fn trade_line(trade: &Trade, match_engine_ts_us: i64) -> String {
    let aggressor = trade.aggressor_side.as_str();
    let mut line = String::with_capacity(320);
    let _ = write!(
        line,
        "{m},order_id={oid},instrument_id={iid},order_type=MATCH,side={side},\
         order_status_event=TRADE_MATCH,user_id={uid},trade_id={tid},buyer_user_id={buyer},\
         seller_user_id={seller},aggressor_side={aggr},market_phase={phase},\
         device_id_hash={device} \
         price={price:.2},quantity={qty}i,filled_quantity={qty}i,\
         remaining_quantity=0i,is_short_sell=f,\
         order_submit_timestamp={exec}i,order_cancel_timestamp=0i,\
         match_engine_timestamp={me}i {ts}\n",
        m = MEASUREMENT,
        oid = sanitize_tag(&trade.buy_order_id),
        iid = trade.instrument_id,
        side = aggressor,
        uid = sanitize_tag(&trade.buyer_id),
        tid = sanitize_tag(&trade.id),
        buyer = sanitize_tag(&trade.buyer_id),
        seller = sanitize_tag(&trade.seller_id),
        aggr = aggressor,
        phase = market_phase(trade.exec_ts_us).as_str(),
        device = crate::models::device_hash(trade.aggressor_trader_id()),
        price = crate::models::ticks_to_price(trade.price),
        qty = trade.quantity,
        exec = trade.exec_ts_us,
        me = match_engine_ts_us,
        ts = trade.exec_ts_us * 1_000,
    );
    line
}

pub struct EventSink {
    host: String,
    port: u16,
    conn: Mutex<Option<TcpStream>>,
}

impl EventSink {
    /// Connect-on-startup. An unreachable endpoint degrades to a warning;
    /// the sink then attempts a lazy reconnect on each send.
    pub fn connect(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let conn = match TcpStream::connect((host.as_str(), port)) {
            Ok(stream) => {
                tracing::info!(%host, port, "event sink connected");
                Some(stream)
            }
            Err(err) => {
                tracing::warn!(
                    %host,
                    port,
                    %err,
                    "event sink unreachable; events will be dropped until it comes up"
                );
                None
            }
        };
        Self {
            host,
            port,
            conn: Mutex::new(conn),
        }
    }

    pub fn log_order(&self, order: &Order) {
        self.send_line(&order_line(order, now_us()));
    }

    pub fn log_trade(&self, trade: &Trade) {
        self.send_line(&trade_line(trade, now_us()));
    }

    fn open(&self) -> Option<TcpStream> {
        TcpStream::connect((self.host.as_str(), self.port)).ok()
    }

    /// One send under the socket mutex. On failure: reconnect once, retry
    /// the single record, otherwise drop it.
    fn send_line(&self, line: &str) {
        let mut guard = self.conn.lock().expect("sink mutex");
        if guard.is_none() {
            *guard = self.open();
        }
        match guard.as_mut() {
            Some(stream) => {
                if stream.write_all(line.as_bytes()).is_ok() {
                    return;
                }
            }
            None => return,
        }
        *guard = self.open();
        if let Some(stream) = guard.as_mut() {
            if stream.write_all(line.as_bytes()).is_err() {
                *guard = None;
            }
        }
    }
}
