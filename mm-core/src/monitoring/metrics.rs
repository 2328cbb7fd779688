//! Central Prometheus registry. One instance is constructed in `mm-bins`'s
//! `main` and shared (via `Arc`) with both venue adapters and the
//! Supervisor, so every component updates the same registry instance that
//! `monitoring::serve` exports over HTTP.

use prometheus::{Gauge, IntCounterVec, Opts, Registry};

pub struct MetricsRegistry {
    registry: Registry,
    pub orders_placed_total: IntCounterVec,
    pub orders_canceled_total: IntCounterVec,
    pub fills_total: IntCounterVec,
    pub reconnects_total: IntCounterVec,
    pub mid_price: Gauge,
    pub spread_pct: Gauge,
    pub market_depth: Gauge,
    pub fair_price: Gauge,
    pub inventory: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_placed_total = IntCounterVec::new(
            Opts::new("orders_placed_total", "Resting orders placed on the maker venue")
                .namespace("mm"),
            &["side"],
        )?;
        registry.register(Box::new(orders_placed_total.clone()))?;

        let orders_canceled_total = IntCounterVec::new(
            Opts::new("orders_canceled_total", "Resting orders canceled on the maker venue")
                .namespace("mm"),
            &["side"],
        )?;
        registry.register(Box::new(orders_canceled_total.clone()))?;

        let fills_total = IntCounterVec::new(
            Opts::new("fills_total", "Private order fill events by status").namespace("mm"),
            &["side", "status"],
        )?;
        registry.register(Box::new(fills_total.clone()))?;

        let reconnects_total = IntCounterVec::new(
            Opts::new("reconnects_total", "Stream reconnects by venue and stream kind")
                .namespace("mm"),
            &["venue", "stream"],
        )?;
        registry.register(Box::new(reconnects_total.clone()))?;

        let mid_price = Gauge::new("mm_mid_price", "Maker venue mid price")?;
        registry.register(Box::new(mid_price.clone()))?;

        let spread_pct = Gauge::new("mm_spread_pct", "Maker venue spread, percent of mid")?;
        registry.register(Box::new(spread_pct.clone()))?;

        let market_depth = Gauge::new("mm_market_depth", "Notional depth within the fair-price band")?;
        registry.register(Box::new(market_depth.clone()))?;

        let fair_price = Gauge::new("mm_fair_price", "Cross-venue liquidity-weighted fair price")?;
        registry.register(Box::new(fair_price.clone()))?;

        let inventory = Gauge::new("mm_inventory", "Total (free + locked) base-asset inventory")?;
        registry.register(Box::new(inventory.clone()))?;

        Ok(Self {
            registry,
            orders_placed_total,
            orders_canceled_total,
            fills_total,
            reconnects_total,
            mid_price,
            spread_pct,
            market_depth,
            fair_price,
            inventory,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_exposes_every_declared_metric_family() {
        let metrics = MetricsRegistry::new().unwrap();
        let families = metrics.registry().gather();
        let names: Vec<_> = families.iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"mm_orders_placed_total".to_string()));
        assert!(names.contains(&"mm_mid_price".to_string()));
        assert!(names.contains(&"mm_fair_price".to_string()));
    }

    #[test]
    fn counters_increment_per_labeled_series() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.orders_placed_total.with_label_values(&["buy"]).inc();
        metrics.orders_placed_total.with_label_values(&["sell"]).inc_by(2);
        assert_eq!(metrics.orders_placed_total.with_label_values(&["buy"]).get(), 1);
        assert_eq!(metrics.orders_placed_total.with_label_values(&["sell"]).get(), 2);
    }
}
