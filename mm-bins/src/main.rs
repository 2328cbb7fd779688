//! Binary wiring for the market-making engine: loads configuration, builds
//! the two venue adapters and the event bus, spawns the stream and periodic
//! tasks, and runs the Supervisor to completion.
//!
//! Runs on a current-thread Tokio runtime: single-threaded cooperative
//! scheduling maps directly onto `flavor = "current_thread"` rather than
//! the default multi-threaded runtime.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Notify;
use tracing::{error, info};

use mm_core::event_bus::bounded as event_bus_bounded;
use mm_core::monitoring::{self, MetricsRegistry};
use mm_core::recorder::{JournalRecorder, Recorder};
use mm_core::supervisor::{
    run_counter_reset_timer, run_ladder_reset_timer, run_listen_key_renewal_timer, Supervisor,
};
use mm_core::venues::{MakerVenueAdapter, ReferenceVenueAdapter};
use mm_core::Config;

/// Maker venue trading pair, in the maker venue's own symbol format.
const MAKER_PAIR: &str = "RMVUSDT";
/// Reference venue trading pair, in the reference venue's own symbol format.
const REFERENCE_PAIR: &str = "RMV-USDT";

const MAKER_REST_BASE: &str = "https://api.maker.example";
const MAKER_WS_DEPTH_URL: &str = "wss://stream.maker.example/depth";
const MAKER_WS_ORDERS_URL: &str = "wss://stream.maker.example/orders";
const REFERENCE_HANDSHAKE_URL: &str = "https://api.reference.example/api/v1/bullet-public";

const JOURNAL_PATH: &str = "market_maker.journal.jsonl";

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build current-thread tokio runtime")?;
    runtime.block_on(run())
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("fatal: invalid configuration")?;
    mm_core::logging::init(&config.log_level, config.log_json);

    info!("starting market-making engine");

    let metrics = Arc::new(MetricsRegistry::new().context("failed to initialize metrics registry")?);
    let metrics_addr: std::net::SocketAddr = config
        .metrics_addr
        .parse()
        .with_context(|| format!("invalid METRICS_ADDR: {}", config.metrics_addr))?;
    tokio::spawn(monitoring::serve(metrics_addr, metrics.clone()));

    let recorder: Arc<dyn Recorder> = Arc::new(
        JournalRecorder::open(JOURNAL_PATH.into()).context("failed to open journal recorder")?,
    );

    let (events_tx, events_rx) = event_bus_bounded(mm_core::event_bus::DEFAULT_CAPACITY);

    let maker = Arc::new(MakerVenueAdapter::new(
        MAKER_REST_BASE,
        MAKER_WS_DEPTH_URL,
        MAKER_WS_ORDERS_URL,
        config.maker_api_key.clone(),
        config.maker_api_secret.clone(),
        MAKER_PAIR,
        events_tx.clone(),
    ));
    maker.set_metrics(metrics.clone());

    let reference = Arc::new(ReferenceVenueAdapter::new(
        REFERENCE_HANDSHAKE_URL,
        REFERENCE_PAIR,
        events_tx,
    ));
    reference.set_metrics(metrics.clone());

    let shutdown = Arc::new(Notify::new());
    install_sigint_handler(shutdown.clone())?;

    let mut supervisor =
        Supervisor::new(maker.clone(), reference.clone(), recorder, events_rx, shutdown.clone())
            .with_metrics(metrics.clone());

    // Boot first: cancels stale orders and creates the listen key the
    // private streams below depend on, then waits for the initial balance
    // snapshot. Only then do the streams start.
    supervisor.boot().await.context("supervisor boot failed")?;

    tokio::spawn({
        let maker = maker.clone();
        async move { maker.run_depth_stream().await }
    });
    tokio::spawn({
        let maker = maker.clone();
        async move { maker.run_private_orders_stream().await }
    });
    tokio::spawn({
        let maker = maker.clone();
        async move { maker.run_balance_stream().await }
    });
    tokio::spawn({
        let reference = reference.clone();
        async move { reference.run_depth_stream().await }
    });
    tokio::spawn(run_ladder_reset_timer(maker.clone(), shutdown.clone()));
    tokio::spawn(run_counter_reset_timer(maker.clone(), shutdown.clone()));
    tokio::spawn(run_listen_key_renewal_timer(maker, shutdown));

    if let Err(e) = supervisor.run().await {
        error!(error = %e, "supervisor exited with error");
        return Err(e);
    }

    Ok(())
}

/// Installs a SIGINT handler that notifies `shutdown`, triggering the
/// Supervisor's Draining transition (bulk cancel, orderly stop).
fn install_sigint_handler(shutdown: Arc<Notify>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        info!("SIGINT received");
        shutdown.notify_one();
    })
    .context("failed to install SIGINT handler")
}
