//! Wires the nine components together: owns the event loop, the two
//! periodic reset timers, and the `Booting -> Running -> Draining -> Halted`
//! lifecycle.
//!
//! Every event handler runs inside `catch_unwind` so a single malformed
//! event can never take the whole drain loop down: every handler is wrapped
//! in a catch-all that logs a traceback and continues draining, reworked
//! from exception-swallowing into an explicit panic boundary since the core
//! never throws for expected failures (those are `Option`/`None`, not
//! panics).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::depth_manager::DepthManager;
use crate::event_bus::EventReceiver;
use crate::ladder::LadderManager;
use crate::model::{MarketSnapshot, QuoteEvent, Venue};
use crate::monitoring::MetricsRegistry;
use crate::pricer;
use crate::recorder::Recorder;
use crate::venues::{MakerVenueAdapter, OrderBookSource, OrderPlacer, ReferenceVenueAdapter};

/// Ladder reset interval: a circuit breaker against drifted ladder state,
/// independent of normal Phase A/B reconciliation.
pub const LADDER_RESET_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// `amount_bought`/`amount_sold` counter reset interval.
pub const COUNTER_RESET_INTERVAL: Duration = Duration::from_secs(45 * 60);
/// Listen-key renewal interval: the private streams' key must be refreshed
/// well inside the exchange's own expiry window.
pub const LISTEN_KEY_RENEWAL_INTERVAL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Booting,
    Running,
    Draining,
    Halted,
}

pub struct Supervisor {
    maker: Arc<MakerVenueAdapter>,
    reference: Arc<ReferenceVenueAdapter>,
    recorder: Arc<dyn Recorder>,
    metrics: Option<Arc<MetricsRegistry>>,
    events: EventReceiver,
    shutdown: Arc<Notify>,
    state: LifecycleState,
}

impl Supervisor {
    pub fn new(
        maker: Arc<MakerVenueAdapter>,
        reference: Arc<ReferenceVenueAdapter>,
        recorder: Arc<dyn Recorder>,
        events: EventReceiver,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self { maker, reference, recorder, metrics: None, events, shutdown, state: LifecycleState::Booting }
    }

    /// Attach a shared metrics registry so each cycle's computed market
    /// snapshot is exported alongside being persisted.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Boot transition: cancel any pre-existing orders (so the ladder starts
    /// from a known-empty state), create the private-stream listen key, then
    /// pull the one-shot balance snapshot. The order/balance streams
    /// themselves are started by the caller as independent tasks only after
    /// this returns (they require the listen key this creates; they are
    /// long-running and reconnect forever, so they are not owned by the
    /// Supervisor's own future).
    pub async fn boot(&mut self) -> anyhow::Result<()> {
        info!("supervisor booting: canceling any pre-existing maker orders");
        self.maker.cancel_all().await;

        self.maker.acquire_listen_key().await.map_err(|e| {
            anyhow::anyhow!(crate::errors::EngineError::fatal(format!(
                "listen key creation failed: {e}"
            )))
        })?;

        self.maker.fetch_initial_balance().await.map_err(|e| {
            anyhow::anyhow!(crate::errors::EngineError::fatal(format!(
                "initial balance snapshot failed: {e}"
            )))
        })?;

        self.state = LifecycleState::Running;
        info!("supervisor running");
        Ok(())
    }

    /// Drain the event bus until shutdown is signaled, then transition
    /// through Draining to Halted.
    pub async fn run(mut self) -> anyhow::Result<()> {
        if self.state == LifecycleState::Booting {
            self.boot().await?;
        }

        let shutdown = self.shutdown.clone();
        tokio::select! {
            _ = self.drain_loop() => {}
            _ = shutdown.notified() => {
                info!("shutdown signal received, draining");
            }
        }

        self.state = LifecycleState::Draining;
        self.drain().await;
        self.state = LifecycleState::Halted;
        info!("supervisor halted");
        Ok(())
    }

    async fn drain_loop(&mut self) {
        while let Some(event) = self.events.recv().await {
            let outcome = AssertUnwindSafe(self.handle_event(&event)).catch_unwind().await;
            if let Err(panic) = outcome {
                error!(?event, ?panic, "event handler panicked, continuing to drain");
            }
        }
    }

    async fn handle_event(&self, event: &QuoteEvent) {
        match event {
            QuoteEvent::DepthUpdate { venue } => self.on_depth_update(*venue).await,
            QuoteEvent::OrderFill(fill) => self.recorder.record_order(fill),
        }
    }

    async fn on_depth_update(&self, venue: Venue) {
        let maker_book = self.maker.get_orderbook();
        let ref_book = self.reference.get_orderbook();
        let balances = self.maker.get_balance();

        LadderManager::run(&*self.maker, &*self.recorder, &maker_book, &ref_book, &balances).await;

        if venue == Venue::Maker {
            DepthManager::run(&*self.maker, &*self.recorder, &maker_book, &balances).await;
        }

        self.record_snapshot(&maker_book, &ref_book, &balances);
    }

    fn record_snapshot(
        &self,
        maker_book: &crate::model::OrderBook,
        ref_book: &crate::model::OrderBook,
        balances: &crate::model::Balances,
    ) {
        let Some(mid) = maker_book.mid() else { return };
        let Some(spread_pct) = pricer::market_spread(maker_book) else { return };
        let depth = pricer::market_depth(maker_book, pricer::FAIR_PRICE_PCT);
        let Some(fair_price) = pricer::fair_price(maker_book, ref_book, pricer::FAIR_PRICE_PCT) else { return };
        let inventory = balances.get("RMV").map(|b| b.total()).unwrap_or_default();

        self.recorder.record_market_state(&MarketSnapshot { mid, spread_pct, depth, fair_price, inventory });
        self.recorder.record_orderbook("maker", maker_book);
        self.recorder.record_orderbook("reference", ref_book);
        self.recorder.record_our_orders_snapshot(&self.maker.get_active_orders());

        if let Some(metrics) = &self.metrics {
            use rust_decimal::prelude::ToPrimitive;
            metrics.mid_price.set(mid.to_f64().unwrap_or_default());
            metrics.spread_pct.set(spread_pct.to_f64().unwrap_or_default());
            metrics.market_depth.set(depth.to_f64().unwrap_or_default());
            metrics.fair_price.set(fair_price.to_f64().unwrap_or_default());
            metrics.inventory.set(inventory.to_f64().unwrap_or_default());
        }
    }

    /// Drain transition: best-effort bulk cancel. No graceful-close
    /// handshake is required; in-flight RPCs are allowed to complete or are
    /// aborted when the process exits.
    async fn drain(&self) {
        warn!("draining: canceling all resting orders");
        self.maker.cancel_all().await;
    }
}

/// Periodic ladder reset: bulk cancel-all every [`LADDER_RESET_INTERVAL`], a
/// circuit breaker against drifted state independent of normal
/// reconciliation. Runs until `shutdown` is notified.
pub async fn run_ladder_reset_timer(maker: Arc<MakerVenueAdapter>, shutdown: Arc<Notify>) {
    let mut interval = tokio::time::interval(LADDER_RESET_INTERVAL);
    interval.tick().await; // first tick fires immediately; skip it
    loop {
        tokio::select! {
            _ = interval.tick() => {
                info!("periodic ladder reset: canceling all resting orders");
                maker.cancel_all().await;
            }
            _ = shutdown.notified() => break,
        }
    }
}

/// Periodic `amount_bought`/`amount_sold` counter reset every
/// [`COUNTER_RESET_INTERVAL`]. Runs until `shutdown` is notified.
pub async fn run_counter_reset_timer(maker: Arc<MakerVenueAdapter>, shutdown: Arc<Notify>) {
    let mut interval = tokio::time::interval(COUNTER_RESET_INTERVAL);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                info!("periodic counter reset: zeroing amount_bought/amount_sold");
                maker.reset_counters();
            }
            _ = shutdown.notified() => break,
        }
    }
}

/// Periodic listen-key renewal every [`LISTEN_KEY_RENEWAL_INTERVAL`]. Runs
/// until `shutdown` is notified. A failed renewal is logged and retried on
/// the next tick; the order/balance streams' own reconnect loops recover if
/// the key expires in the meantime.
pub async fn run_listen_key_renewal_timer(maker: Arc<MakerVenueAdapter>, shutdown: Arc<Notify>) {
    let mut interval = tokio::time::interval(LISTEN_KEY_RENEWAL_INTERVAL);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = maker.renew_listen_key().await {
                    warn!(error = %e, "listen key renewal failed, will retry next interval");
                }
            }
            _ = shutdown.notified() => break,
        }
    }
}
