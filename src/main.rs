use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use matchbook::config::AppConfig;
use matchbook::depth;
use matchbook::exchange::{Exchange, ORDER_EXPIRY_SECS};
use matchbook::instruments::catalog;
use matchbook::logging::init_logging;
use matchbook::producers::ProducerPool;
use matchbook::ring::RingCoordinator;
use matchbook::sink::EventSink;
use matchbook::users::UserIdGenerator;
use matchbook::wash::WashProducer;

/// Written at startup, removed at graceful shutdown, so run scripts can
/// always find and kill a stale engine process.
const PID_FILE: &str = "/tmp/matching_engine.pid";
const USER_ID_FILE: &str = "user_id_counter.dat";

fn write_pid_file() -> std::io::Result<()> {
    std::fs::write(PID_FILE, format!("{}\n", std::process::id()))
}

fn remove_pid_file() {
    let _ = std::fs::remove_file(PID_FILE);
}

/// SIGTERM / SIGINT / SIGHUP all initiate the same orderly stop.
async fn watch_signals(stop: Arc<AtomicBool>) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut int = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut hup = signal(SignalKind::hangup()).expect("install SIGHUP handler");

    tokio::select! {
        _ = term.recv() => tracing::info!("SIGTERM received"),
        _ = int.recv() => tracing::info!("SIGINT received"),
        _ = hup.recv() => tracing::info!("SIGHUP received"),
    }
    stop.store(true, Ordering::Relaxed);
}

fn main() -> Result<()> {
    let env = std::env::var("MB_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = AppConfig::load_or_default(&env)?;
    let _log_guard = init_logging(&config);
    tracing::info!(%env, "matchbook starting");

    write_pid_file().context("write pid file")?;

    let stop = Arc::new(AtomicBool::new(false));
    let sink = Arc::new(EventSink::connect(config.sink.host.clone(), config.sink.port));

    let users = UserIdGenerator::load(USER_ID_FILE);
    let session_user = users.next_user_id();
    tracing::info!(user_id = %session_user, "session identity assigned");

    let exchange = Arc::new(Exchange::new(
        catalog(),
        sink.clone(),
        Duration::from_secs(ORDER_EXPIRY_SECS),
    ));
    let expiry_workers = exchange.spawn_expiry_workers(stop.clone());

    let pool = ProducerPool::spawn(
        &exchange,
        catalog(),
        sink.clone(),
        stop.clone(),
        config.sim.producers_per_instrument,
    )
    .context("start producer pool")?;

    let wash = if config.sim.enable_wash {
        let instrument = catalog()
            .get(config.sim.wash_instrument_id)
            .ok_or_else(|| anyhow!("wash instrument {} not in catalog", config.sim.wash_instrument_id))?;
        let book = exchange
            .book(instrument.id)
            .ok_or_else(|| anyhow!("no book for instrument {}", instrument.id))?;
        Some(WashProducer::spawn(
            book,
            instrument.seed_price,
            sink.clone(),
            stop.clone(),
        ))
    } else {
        None
    };

    let ring = if config.sim.enable_ring {
        // The ring always trades instrument 1, whatever the participants'
        // retail assignments are.
        let instrument = catalog().get(1).ok_or_else(|| anyhow!("instrument 1 missing"))?;
        let book = exchange.book(1).ok_or_else(|| anyhow!("no book for instrument 1"))?;
        Some(RingCoordinator::spawn(
            book,
            instrument.seed_price,
            sink.clone(),
            stop.clone(),
        ))
    } else {
        None
    };

    // Bind before handing off to the server thread: a busy port is fatal
    // at startup, not a silent worker death.
    let depth_listener = std::net::TcpListener::bind(("127.0.0.1", config.depth.port))
        .with_context(|| format!("bind depth endpoint on 127.0.0.1:{}", config.depth.port))?;

    let server = {
        let exchange = exchange.clone();
        let stop = stop.clone();
        std::thread::Builder::new()
            .name("depth-server".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                    .expect("build tokio runtime");
                runtime.block_on(async {
                    let signals = tokio::spawn(watch_signals(stop.clone()));
                    if let Err(err) = depth::serve(depth_listener, exchange, stop.clone()).await {
                        tracing::error!(%err, "depth server failed");
                        stop.store(true, Ordering::Relaxed);
                    }
                    signals.abort();
                });
            })
            .context("spawn depth server thread")?
    };

    // Main loop: poll the shutdown flag.
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }
    tracing::info!("shutdown initiated");

    // Orderly stop: producers drain first, then the coordinated patterns,
    // then expiry workers and the depth server.
    pool.join();
    if let Some(wash) = wash {
        wash.join();
    }
    if let Some(ring) = ring {
        ring.join();
    }
    for handle in expiry_workers {
        let _ = handle.join();
    }
    let _ = server.join();

    if let Err(err) = users.save() {
        tracing::warn!(%err, "failed to persist user id counter");
    }
    remove_pid_file();
    tracing::info!("stopped cleanly");
    Ok(())
}
