//! Depth HTTP endpoint - read-only book snapshots for observers.
//!
//! Loopback-only axum server with two routes:
//! - `GET /book/{id}`  top-5 levels of one instrument (JSON `null` when unknown)
//! - `GET /books`      object keyed by instrument id
//!
//! Snapshots come from `InstrumentBook::depth_snapshot`, the same source
//! the terminal display reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::exchange::{DepthSnapshot, Exchange};
use crate::models::ticks_to_price;

/// Levels returned per side.
pub const DEPTH_LEVELS: usize = 5;

#[derive(Debug, Serialize)]
pub struct BidLevel {
    pub price: f64,
    pub qty_buyers: u64,
}

#[derive(Debug, Serialize)]
pub struct AskLevel {
    pub price: f64,
    pub qty_sellers: u64,
}

#[derive(Debug, Serialize)]
pub struct BookDepth {
    pub bids: Vec<BidLevel>,
    pub asks: Vec<AskLevel>,
}

impl From<DepthSnapshot> for BookDepth {
    fn from(snapshot: DepthSnapshot) -> Self {
        Self {
            bids: snapshot
                .bids
                .into_iter()
                .map(|(price, qty)| BidLevel {
                    price: ticks_to_price(price),
                    qty_buyers: qty,
                })
                .collect(),
            asks: snapshot
                .asks
                .into_iter()
                .map(|(price, qty)| AskLevel {
                    price: ticks_to_price(price),
                    qty_sellers: qty,
                })
                .collect(),
        }
    }
}

fn book_json(exchange: &Exchange, instrument_id: u32) -> Value {
    match exchange.book(instrument_id) {
        Some(book) => serde_json::to_value(BookDepth::from(book.depth_snapshot(DEPTH_LEVELS)))
            .unwrap_or(Value::Null),
        None => Value::Null,
    }
}

async fn get_book(State(exchange): State<Arc<Exchange>>, Path(id): Path<u32>) -> Json<Value> {
    Json(book_json(&exchange, id))
}

async fn get_books(State(exchange): State<Arc<Exchange>>) -> Json<Value> {
    let mut map = Map::new();
    for id in exchange.instrument_ids() {
        map.insert(id.to_string(), book_json(&exchange, id));
    }
    Json(Value::Object(map))
}

pub fn router(exchange: Arc<Exchange>) -> Router {
    Router::new()
        .route("/book/{id}", get(get_book))
        .route("/books", get(get_books))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(exchange)
}

/// Serve on an already-bound listener until the stop flag flips.
///
/// The listener is bound by the caller so a busy port fails startup
/// instead of dying silently in a worker thread.
pub async fn serve(
    listener: std::net::TcpListener,
    exchange: Arc<Exchange>,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;
    tracing::info!(addr = %listener.local_addr()?, "depth server listening");

    axum::serve(listener, router(exchange))
        .with_graceful_shutdown(async move {
            while !stop.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await?;

    tracing::info!("depth server stopped");
    Ok(())
}
