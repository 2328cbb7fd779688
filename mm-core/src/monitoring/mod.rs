//! Prometheus metrics for the engine, trimmed to this domain's surface:
//! order/fill/cancel counters, reconnect counters, and gauges for the
//! computed market snapshot (mid, spread, depth, fair price, inventory).

mod metrics;
mod server;

pub use metrics::MetricsRegistry;
pub use server::serve;
