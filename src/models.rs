// models.rs - Core order and trade types

use chrono::{FixedOffset, TimeZone, Timelike, Utc};
use rand::Rng;

/// Prices are carried as integer ticks of 1/100 (two implied decimals).
/// Floating point appears only at the boundary: order construction from
/// seed-price multipliers, the event-sink `price` field, and depth JSON.
pub fn price_to_ticks(price: f64) -> u64 {
    (price * 100.0).round() as u64
}

pub fn ticks_to_price(ticks: u64) -> f64 {
    ticks as f64 / 100.0
}

/// Order side: Buy or Sell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,  // Limit order: must specify price
    Market, // Market order: crosses unconditionally, rests at its synthesized limit
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
        }
    }
}

/// Time-in-force. Only GTC and IOC are exercised by the matching core;
/// FOK and DAY exist for boundary completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
    Day,
}

/// Order status - every order must reach one of the terminal states.
///
/// Transitions are monotonic:
/// NEW -> {PARTIAL, FILLED, CANCELLED, EXPIRED}
/// PARTIAL -> {FILLED, CANCELLED, EXPIRED}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }

    /// Event label written to the `order_status_event` tag.
    pub fn event_label(&self) -> &'static str {
        match self {
            OrderStatus::New => "ORDER_NEW",
            OrderStatus::PartiallyFilled => "ORDER_PARTIAL",
            OrderStatus::Filled => "ORDER_FILLED",
            OrderStatus::Cancelled => "ORDER_CANCELLED",
            OrderStatus::Expired => "ORDER_EXPIRED",
        }
    }
}

/// Market phase classified from the wall clock at UTC+05:30.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketPhase {
    PreOpen,
    Open,
    Closed,
}

impl MarketPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketPhase::PreOpen => "PRE_OPEN",
            MarketPhase::Open => "OPEN",
            MarketPhase::Closed => "CLOSED",
        }
    }
}

/// Exchange-local clock offset: UTC+05:30.
const MARKET_TZ_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Classify a microsecond epoch timestamp:
/// [09:00, 09:15) = PRE_OPEN, [09:15, 15:30) = OPEN, else CLOSED.
pub fn market_phase(ts_us: i64) -> MarketPhase {
    let tz = FixedOffset::east_opt(MARKET_TZ_OFFSET_SECS).expect("valid fixed offset");
    let local = match tz.timestamp_micros(ts_us) {
        chrono::LocalResult::Single(dt) => dt,
        _ => return MarketPhase::Closed,
    };
    let minute_of_day = local.hour() * 60 + local.minute();
    match minute_of_day {
        m if (9 * 60..9 * 60 + 15).contains(&m) => MarketPhase::PreOpen,
        m if (9 * 60 + 15..15 * 60 + 30).contains(&m) => MarketPhase::Open,
        _ => MarketPhase::Closed,
    }
}

/// FNV-1a 32-bit over the UTF-8 bytes of `input`.
pub fn fnv1a_32(input: &str) -> u32 {
    const FNV_OFFSET: u32 = 0x811C_9DC5;
    const FNV_PRIME: u32 = 16_777_619;
    let mut hash = FNV_OFFSET;
    for byte in input.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Device fingerprint: FNV-1a of the trader id, uppercase 8-hex.
pub fn device_hash(trader_id: &str) -> String {
    format!("{:08X}", fnv1a_32(trader_id))
}

fn random_10_digits() -> u64 {
    rand::thread_rng().gen_range(1_000_000_000u64..=9_999_999_999)
}

pub fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

/// Sentinel carried in trade-context tags until an order first matches.
pub const NA: &str = "NA";

/// Context of the most recent trade an order participated in.
///
/// Stamped into both sides at execution so that every subsequent event
/// row for either order (PARTIAL, FILLED, CANCELLED-after-partial,
/// EXPIRED-after-partial) carries real ids instead of the sentinel.
#[derive(Debug, Clone)]
pub struct TradeContext {
    pub trade_id: String,
    pub buyer_id: String,
    pub seller_id: String,
}

impl Default for TradeContext {
    fn default() -> Self {
        Self {
            trade_id: NA.to_string(),
            buyer_id: NA.to_string(),
            seller_id: NA.to_string(),
        }
    }
}

// ============================================================
// ORDER
// ============================================================

/// One order: immutable identity plus mutable lifecycle state.
#[derive(Debug, Clone)]
pub struct Order {
    /// `<instrumentId>-<10-digit-random>-<traderId>`
    pub id: String,
    pub order_type: OrderType,
    pub side: Side,
    /// Price in ticks of 1/100.
    pub price: u64,
    pub quantity: u64,
    pub remaining: u64,
    pub tif: TimeInForce,
    pub trader_id: String,
    pub instrument_id: u32,
    pub status: OrderStatus,
    /// Microseconds since epoch, stamped at construction.
    pub submit_ts_us: i64,
    /// Zero until cancelled.
    pub cancel_ts_us: i64,
    pub is_short_sell: bool,
    pub trade_ctx: TradeContext,
}

impl Order {
    pub fn new(
        order_type: OrderType,
        side: Side,
        price: u64,
        quantity: u64,
        tif: TimeInForce,
        trader_id: impl Into<String>,
        instrument_id: u32,
    ) -> Self {
        debug_assert!(quantity > 0, "zero-quantity orders are rejected at the boundary");
        let trader_id = trader_id.into();
        Self {
            id: format!("{}-{}-{}", instrument_id, random_10_digits(), trader_id),
            order_type,
            side,
            price,
            quantity,
            remaining: quantity,
            tif,
            trader_id,
            instrument_id,
            status: OrderStatus::New,
            submit_ts_us: now_us(),
            cancel_ts_us: 0,
            is_short_sell: false,
            trade_ctx: TradeContext::default(),
        }
    }

    #[inline]
    pub fn filled_qty(&self) -> u64 {
        self.quantity - self.remaining
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.remaining == 0
    }

    /// Decrement remaining quantity and advance the status machine.
    pub fn fill(&mut self, qty: u64) {
        debug_assert!(qty <= self.remaining);
        self.remaining -= qty;
        self.status = if self.remaining == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// Fill and stamp the trade context so later event rows carry real ids.
    pub fn fill_with_trade_context(
        &mut self,
        qty: u64,
        trade_id: &str,
        buyer_id: &str,
        seller_id: &str,
    ) {
        self.fill(qty);
        self.trade_ctx = TradeContext {
            trade_id: trade_id.to_string(),
            buyer_id: buyer_id.to_string(),
            seller_id: seller_id.to_string(),
        };
    }

    /// Cancel unless already terminal. Returns whether the state changed.
    pub fn cancel(&mut self, ts_us: i64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = OrderStatus::Cancelled;
        self.cancel_ts_us = ts_us;
        true
    }

    /// Expire unless already terminal. Returns whether the state changed.
    pub fn expire(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = OrderStatus::Expired;
        true
    }

    pub fn market_phase(&self) -> MarketPhase {
        market_phase(self.submit_ts_us)
    }

    pub fn device_hash(&self) -> String {
        device_hash(&self.trader_id)
    }
}

// ============================================================
// TRADE
// ============================================================

/// Immutable record of one matched execution.
#[derive(Debug, Clone)]
pub struct Trade {
    /// `TRD-<instrumentId>-<10-digit-random>`
    pub id: String,
    pub buy_order_id: String,
    pub sell_order_id: String,
    /// Execution price in ticks of 1/100.
    pub price: u64,
    pub quantity: u64,
    pub exec_ts_us: i64,
    pub buyer_id: String,
    pub seller_id: String,
    /// Side of the incoming order that crossed the spread.
    pub aggressor_side: Side,
    pub instrument_id: u32,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buy_order_id: impl Into<String>,
        sell_order_id: impl Into<String>,
        price: u64,
        quantity: u64,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        aggressor_side: Side,
        instrument_id: u32,
    ) -> Self {
        Self {
            id: format!("TRD-{}-{}", instrument_id, random_10_digits()),
            buy_order_id: buy_order_id.into(),
            sell_order_id: sell_order_id.into(),
            price,
            quantity,
            exec_ts_us: now_us(),
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            aggressor_side,
            instrument_id,
        }
    }

    /// Trader id of the side that crossed the spread.
    pub fn aggressor_trader_id(&self) -> &str {
        match self.aggressor_side {
            Side::Buy => &self.buyer_id,
            Side::Sell => &self.seller_id,
        }
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ist_ts(h: u32, m: u32, s: u32) -> i64 {
        FixedOffset::east_opt(19800)
            .unwrap()
            .with_ymd_and_hms(2026, 1, 5, h, m, s)
            .unwrap()
            .timestamp_micros()
    }

    #[test]
    fn test_price_tick_round_trip() {
        assert_eq!(price_to_ticks(1577.0), 157_700);
        assert_eq!(price_to_ticks(373.55), 37_355);
        assert_eq!(ticks_to_price(37_355), 373.55);
        // Round-to-nearest at sub-tick precision
        assert_eq!(price_to_ticks(10.004), 1_000);
        assert_eq!(price_to_ticks(10.006), 1_001);
    }

    #[test]
    fn test_order_id_format() {
        let order = Order::new(
            OrderType::Limit,
            Side::Buy,
            100_000,
            10,
            TimeInForce::Gtc,
            "42",
            3,
        );
        let parts: Vec<&str> = order.id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "3");
        assert_eq!(parts[1].len(), 10);
        assert_eq!(parts[2], "42");
    }

    #[test]
    fn test_trade_id_format() {
        let trade = Trade::new("b", "s", 100, 5, "1", "2", Side::Buy, 7);
        assert!(trade.id.starts_with("TRD-7-"));
        assert_eq!(trade.id.split('-').count(), 3);
        assert_eq!(trade.id.split('-').nth(2).unwrap().len(), 10);
    }

    #[test]
    fn test_fill_status_machine() {
        let mut order = Order::new(
            OrderType::Limit,
            Side::Buy,
            1000,
            100,
            TimeInForce::Gtc,
            "1",
            1,
        );
        assert_eq!(order.status, OrderStatus::New);

        order.fill(40);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining, 60);
        assert_eq!(order.filled_qty(), 40);

        order.fill(60);
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.is_filled());
    }

    #[test]
    fn test_cancel_is_noop_on_terminal() {
        let mut order = Order::new(
            OrderType::Limit,
            Side::Sell,
            1000,
            10,
            TimeInForce::Gtc,
            "1",
            1,
        );
        order.fill(10);
        assert!(!order.cancel(123));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.cancel_ts_us, 0);

        let mut order = Order::new(
            OrderType::Limit,
            Side::Sell,
            1000,
            10,
            TimeInForce::Gtc,
            "1",
            1,
        );
        assert!(order.cancel(123));
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.cancel_ts_us, 123);
        // Absorbing: a second cancel changes nothing
        assert!(!order.cancel(456));
        assert_eq!(order.cancel_ts_us, 123);
    }

    #[test]
    fn test_expire_only_from_pending() {
        let mut order = Order::new(
            OrderType::Limit,
            Side::Buy,
            1000,
            10,
            TimeInForce::Gtc,
            "1",
            1,
        );
        order.fill(4);
        assert!(order.expire());
        assert_eq!(order.status, OrderStatus::Expired);

        let mut filled = Order::new(
            OrderType::Limit,
            Side::Buy,
            1000,
            10,
            TimeInForce::Gtc,
            "1",
            1,
        );
        filled.fill(10);
        assert!(!filled.expire());
        assert_eq!(filled.status, OrderStatus::Filled);
    }

    #[test]
    fn test_trade_context_stamped_on_fill() {
        let mut order = Order::new(
            OrderType::Limit,
            Side::Buy,
            1000,
            10,
            TimeInForce::Gtc,
            "9",
            1,
        );
        assert_eq!(order.trade_ctx.trade_id, NA);

        order.fill_with_trade_context(4, "TRD-1-1234567890", "9", "12");
        assert_eq!(order.trade_ctx.trade_id, "TRD-1-1234567890");
        assert_eq!(order.trade_ctx.buyer_id, "9");
        assert_eq!(order.trade_ctx.seller_id, "12");
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a_32(""), 0x811C_9DC5);
        assert_eq!(fnv1a_32("a"), 0xE40C_292C);
        assert_eq!(fnv1a_32("foobar"), 0xBF9C_F968);
    }

    #[test]
    fn test_device_hash_format() {
        let hash = device_hash("2500");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash.to_uppercase());
        // Deterministic per trader
        assert_eq!(device_hash("2500"), hash);
    }

    #[test]
    fn test_market_phase_windows() {
        assert_eq!(market_phase(ist_ts(9, 0, 0)), MarketPhase::PreOpen);
        assert_eq!(market_phase(ist_ts(9, 14, 59)), MarketPhase::PreOpen);
        assert_eq!(market_phase(ist_ts(9, 15, 0)), MarketPhase::Open);
        assert_eq!(market_phase(ist_ts(15, 29, 59)), MarketPhase::Open);
        assert_eq!(market_phase(ist_ts(15, 30, 0)), MarketPhase::Closed);
        assert_eq!(market_phase(ist_ts(3, 0, 0)), MarketPhase::Closed);
        assert_eq!(market_phase(ist_ts(8, 59, 59)), MarketPhase::Closed);
    }

    #[test]
    fn test_aggressor_trader_id() {
        let trade = Trade::new("b", "s", 100, 5, "buyer", "seller", Side::Sell, 1);
        assert_eq!(trade.aggressor_trader_id(), "seller");
        let trade = Trade::new("b", "s", 100, 5, "buyer", "seller", Side::Buy, 1);
        assert_eq!(trade.aggressor_trader_id(), "buyer");
    }
}
