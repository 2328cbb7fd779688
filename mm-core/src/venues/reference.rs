//! Owns only the reference exchange's public depth book. Public-only: no
//! placement, no private streams. Before connecting to the depth stream it
//! performs an out-of-band handshake against an unauthenticated endpoint to
//! obtain a short-lived streaming token, mirroring the reference venue's
//! bullet-token connection scheme.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::OrderBookSource;
use crate::event_bus::EventSender;
use crate::model::{OrderBook, PriceLevel, QuoteEvent, Venue};
use crate::monitoring::MetricsRegistry;
use crate::numeric::Dec;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct ReferenceVenueAdapter {
    http: reqwest::Client,
    handshake_url: String,
    pair: String,

    orderbook: Mutex<OrderBook>,
    events: EventSender,
    metrics: Mutex<Option<Arc<MetricsRegistry>>>,
}

impl ReferenceVenueAdapter {
    pub fn new(handshake_url: impl Into<String>, pair: impl Into<String>, events: EventSender) -> Self {
        Self {
            http: reqwest::Client::new(),
            handshake_url: handshake_url.into(),
            pair: pair.into(),
            orderbook: Mutex::new(OrderBook::default()),
            events,
            metrics: Mutex::new(None),
        }
    }

    /// Attach a shared metrics registry. Optional: adapters built without
    /// one (e.g. in tests) simply skip instrumentation.
    pub fn set_metrics(&self, metrics: Arc<MetricsRegistry>) {
        *self.metrics.lock().expect("metrics mutex poisoned") = Some(metrics);
    }

    /// Long-running public depth stream. Reconnects with a flat 5-second
    /// delay on any error (including a failed handshake), forever.
    pub async fn run_depth_stream(&self) {
        loop {
            if let Err(e) = self.depth_stream_once().await {
                let err = crate::errors::EngineError::TransientStream { venue: "reference-depth", source: e };
                warn!(%err, "reconnecting in 5s");
                if let Some(m) = self.metrics.lock().expect("metrics mutex poisoned").clone() {
                    m.reconnects_total.with_label_values(&["reference", "depth"]).inc();
                }
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    async fn depth_stream_once(&self) -> anyhow::Result<()> {
        let handshake: HandshakeResponse = self
            .http
            .post(&self.handshake_url)
            .send()
            .await?
            .json()
            .await?;

        let ws_url = format!("{}?token={}", handshake.endpoint, handshake.token);
        let (ws, _) = connect_async(&ws_url).await?;
        info!(venue = "reference", "depth stream connected");
        let (mut write, mut read) = ws.split();

        write
            .send(Message::Text(
                serde_json::json!({
                    "type": "subscribe",
                    "topic": format!("/spotMarket/level2Depth50:{}", self.pair),
                })
                .to_string(),
            ))
            .await?;

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => self.on_depth_message(&text).await,
                Message::Ping(payload) => {
                    write.send(Message::Pong(payload)).await?;
                }
                Message::Close(frame) => {
                    debug!(venue = "reference", ?frame, "depth stream closed by remote");
                    anyhow::bail!("depth stream closed");
                }
                _ => {}
            }
        }
        anyhow::bail!("depth stream ended")
    }

    async fn on_depth_message(&self, text: &str) {
        let Ok(msg) = serde_json::from_str::<WireDepthMessage>(text) else {
            debug!(venue = "reference", "failed to decode depth message");
            return;
        };
        let book = msg.into_orderbook();
        if !book.is_valid() {
            warn!(venue = "reference", "decoded depth message violates ladder invariants, dropping");
            return;
        }

        let changed = {
            let mut current = self.orderbook.lock().expect("orderbook mutex poisoned");
            let changed = !current.same_ladder(&book);
            if changed {
                *current = book;
            }
            changed
        };

        if changed {
            self.events.send(QuoteEvent::DepthUpdate { venue: Venue::Reference }).await;
        }
    }
}

impl OrderBookSource for ReferenceVenueAdapter {
    fn get_orderbook(&self) -> OrderBook {
        self.orderbook.lock().expect("orderbook mutex poisoned").clone()
    }
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    endpoint: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct WireDepthMessage {
    #[serde(default)]
    asks: Vec<(Dec, Dec)>,
    #[serde(default)]
    bids: Vec<(Dec, Dec)>,
}

impl WireDepthMessage {
    fn into_orderbook(self) -> OrderBook {
        OrderBook::new(
            self.asks.into_iter().map(|(p, s)| PriceLevel::public(p, s)).collect(),
            self.bids.into_iter().map(|(p, s)| PriceLevel::public(p, s)).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::bounded;
    use rust_decimal_macros::dec;

    fn adapter() -> ReferenceVenueAdapter {
        let (tx, _rx) = bounded(16);
        ReferenceVenueAdapter::new("https://reference.example/handshake", "RMV-USDT", tx)
    }

    #[tokio::test]
    async fn depth_message_populates_orderbook() {
        let a = adapter();
        a.on_depth_message(r#"{"asks":[["0.00246","500000"]],"bids":[["0.00245","500000"]]}"#).await;
        let book = a.get_orderbook();
        assert_eq!(book.best_ask(), Some(dec!(0.00246)));
        assert_eq!(book.best_bid(), Some(dec!(0.00245)));
    }

    #[tokio::test]
    async fn identical_successive_messages_do_not_change_book() {
        let a = adapter();
        a.on_depth_message(r#"{"asks":[["0.00246","500000"]],"bids":[["0.00245","500000"]]}"#).await;
        let first = a.get_orderbook();
        a.on_depth_message(r#"{"asks":[["0.00246","500000"]],"bids":[["0.00245","500000"]]}"#).await;
        let second = a.get_orderbook();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invalid_ladder_is_dropped() {
        let a = adapter();
        a.on_depth_message(r#"{"asks":[["10","1"],["9","1"]],"bids":[]}"#).await;
        assert!(a.get_orderbook().asks.is_empty());
    }
}
