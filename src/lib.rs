//! matchbook - multi-instrument matching engine with simulated order flow
//!
//! Per-instrument price-time-priority limit order books fed by a pool of
//! autonomous producers, with every lifecycle transition and execution
//! streamed to a time-series store over the InfluxDB line protocol.
//!
//! # Modules
//!
//! - [`models`] - Order and Trade types, derivations (market phase, device hash)
//! - [`instruments`] - Immutable instrument reference catalog
//! - [`orderbook`] - BTreeMap-based book structure and price levels
//! - [`engine`] - Matching engine logic
//! - [`exchange`] - Concurrent per-instrument books, expiry workers, volume counters
//! - [`sink`] - Line-protocol event shipper
//! - [`producers`] - Simulated retail flow
//! - [`wash`] / [`ring`] - Coordinated trading patterns
//! - [`depth`] - Read-only depth HTTP endpoint
//! - [`config`] / [`logging`] - Runtime configuration and tracing setup
//! - [`users`] - Persistent user-id allocation

pub mod config;
pub mod depth;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod instruments;
pub mod logging;
pub mod models;
pub mod orderbook;
pub mod producers;
pub mod ring;
pub mod sink;
pub mod users;
pub mod wash;

// Convenient re-exports at crate root
pub use engine::MatchingEngine;
pub use error::EngineError;
pub use exchange::{Exchange, InstrumentBook, ORDER_EXPIRY_SECS};
pub use instruments::{catalog, Instrument, InstrumentCatalog};
pub use models::{Order, OrderStatus, OrderType, Side, TimeInForce, Trade};
pub use orderbook::{OrderBook, PriceLevel};
pub use sink::EventSink;
