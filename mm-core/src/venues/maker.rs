//! Owns the maker exchange's live state: public depth book, private active
//! orders, and balances. Exposes snapshot getters plus the mutating
//! place/cancel surface, and runs the three long-lived stream tasks.
//!
//! The maker venue's exact wire framing (length-prefixed protobuf) is an
//! external collaborator's concern (exchange-specific, delegated per the
//! core's scope); the decode functions here work against a JSON envelope at
//! the same message boundary, so the domain logic above them — full-replace
//! dedup, the private-order status table, balance bookkeeping — is exercised
//! exactly as a real protobuf decoder would exercise it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::signing::{sign_hex, unix_millis};
use super::{OrderBookSource, OrderPlacer};
use crate::event_bus::EventSender;
use crate::model::{Balance, Balances, FillEvent, FillStatus, OrderBook, PriceLevel, QuoteEvent, Side, Venue};
use crate::monitoring::MetricsRegistry;
use crate::numeric::Dec;

/// Fixed reconnect delay for every maker-venue stream task. Not exponential:
/// a flat 5-second backoff with infinite retries, not exponential.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct MakerVenueAdapter {
    http: reqwest::Client,
    rest_base: String,
    ws_depth_url: String,
    ws_orders_url: String,
    api_key: String,
    api_secret: String,
    pair: String,

    orderbook: Mutex<OrderBook>,
    active_orders: Mutex<OrderBook>,
    balances: Mutex<Balances>,
    amount_bought: Mutex<Dec>,
    amount_sold: Mutex<Dec>,

    /// Current private-stream listen key, created at boot and renewed every
    /// 30 minutes. `None` until `acquire_listen_key` succeeds at least once.
    listen_key: Mutex<Option<String>>,

    /// Serializes concurrent placements so signed timestamps stay monotone.
    placement_lock: AsyncMutex<()>,

    events: EventSender,
    metrics: Mutex<Option<Arc<MetricsRegistry>>>,
}

impl MakerVenueAdapter {
    pub fn new(
        rest_base: impl Into<String>,
        ws_depth_url: impl Into<String>,
        ws_orders_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        pair: impl Into<String>,
        events: EventSender,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_base: rest_base.into(),
            ws_depth_url: ws_depth_url.into(),
            ws_orders_url: ws_orders_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            pair: pair.into(),
            orderbook: Mutex::new(OrderBook::default()),
            active_orders: Mutex::new(OrderBook::default()),
            balances: Mutex::new(Balances::default()),
            amount_bought: Mutex::new(Decimal::ZERO),
            amount_sold: Mutex::new(Decimal::ZERO),
            listen_key: Mutex::new(None),
            placement_lock: AsyncMutex::new(()),
            events,
            metrics: Mutex::new(None),
        }
    }

    /// Attach a shared metrics registry. Optional: adapters built without
    /// one (e.g. in tests) simply skip instrumentation.
    pub fn set_metrics(&self, metrics: Arc<MetricsRegistry>) {
        *self.metrics.lock().expect("metrics mutex poisoned") = Some(metrics);
    }

    fn metrics(&self) -> Option<Arc<MetricsRegistry>> {
        self.metrics.lock().expect("metrics mutex poisoned").clone()
    }

    fn record_reconnect(&self, stream: &str) {
        if let Some(m) = self.metrics() {
            m.reconnects_total.with_label_values(&["maker", stream]).inc();
        }
    }

    /// One-shot REST balance snapshot. Called once at boot before the
    /// account stream takes over.
    pub async fn fetch_initial_balance(&self) -> anyhow::Result<()> {
        let path = "/api/v3/account";
        let headers = self.signed_headers("GET", path, "");
        let url = format!("{}{}", self.rest_base, path);

        let mut req = self.http.get(&url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("account snapshot failed ({status}): {body}");
        }

        let parsed: AccountSnapshot = serde_json::from_str(&body)?;
        let mut balances = self.balances.lock().expect("balances mutex poisoned");
        for entry in parsed.balances {
            balances.set(entry.asset, Balance { free: entry.free, locked: entry.locked });
        }
        Ok(())
    }

    /// Creates the private-stream listen key. Called once at boot, before
    /// the order and balance streams are started: both require a key to be
    /// present, mirroring the reference venue's own handshake-before-stream
    /// scheme.
    pub async fn acquire_listen_key(&self) -> anyhow::Result<()> {
        let path = "/api/v3/userDataStream";
        let headers = self.signed_headers("POST", path, "");
        let url = format!("{}{}", self.rest_base, path);

        let mut req = self.http.post(&url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("listen key creation failed ({status}): {body}");
        }

        let parsed: ListenKeyResponse = serde_json::from_str(&body)?;
        *self.listen_key.lock().expect("listen_key mutex poisoned") = Some(parsed.listen_key);
        Ok(())
    }

    /// Extends the current listen key's server-side expiry without changing
    /// its value. Called by the Supervisor's 30-minute renewal timer.
    pub async fn renew_listen_key(&self) -> anyhow::Result<()> {
        let key = self
            .listen_key
            .lock()
            .expect("listen_key mutex poisoned")
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no listen key to renew"))?;

        let path = "/api/v3/userDataStream";
        let query = format!("listenKey={key}");
        let headers = self.signed_headers("PUT", path, &query);
        let url = format!("{}{}?{}", self.rest_base, path, query);

        let mut req = self.http.put(&url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("listen key renewal failed ({})", resp.status());
        }
        Ok(())
    }

    fn current_listen_key(&self) -> anyhow::Result<String> {
        self.listen_key
            .lock()
            .expect("listen_key mutex poisoned")
            .clone()
            .ok_or_else(|| anyhow::anyhow!("listen key not yet acquired"))
    }

    /// Running `amount_bought`/`amount_sold` reset, called by the
    /// Supervisor's 45-minute timer.
    pub fn reset_counters(&self) {
        *self.amount_bought.lock().expect("amount_bought mutex poisoned") = Decimal::ZERO;
        *self.amount_sold.lock().expect("amount_sold mutex poisoned") = Decimal::ZERO;
    }

    pub fn amount_bought(&self) -> Dec {
        *self.amount_bought.lock().expect("amount_bought mutex poisoned")
    }

    pub fn amount_sold(&self) -> Dec {
        *self.amount_sold.lock().expect("amount_sold mutex poisoned")
    }

    /// Long-running public depth stream. Reconnects with a flat 5-second
    /// delay on any error, forever.
    pub async fn run_depth_stream(&self) {
        loop {
            if let Err(e) = self.depth_stream_once().await {
                let err = crate::errors::EngineError::TransientStream { venue: "maker-depth", source: e };
                warn!(%err, "reconnecting in 5s");
                self.record_reconnect("depth");
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    async fn depth_stream_once(&self) -> anyhow::Result<()> {
        let (ws, _) = connect_async(&self.ws_depth_url).await?;
        info!(venue = "maker", "depth stream connected");
        let (mut write, mut read) = ws.split();
        write
            .send(Message::Text(
                serde_json::json!({ "op": "subscribe", "channel": "depth", "pair": self.pair })
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
                    debug!(venue = "maker", ?frame, "depth stream closed by remote");
                    anyhow::bail!("depth stream closed");
                }
                _ => {}
            }
        }
        anyhow::bail!("depth stream ended")
    }

    async fn on_depth_message(&self, text: &str) {
        let Ok(msg) = serde_json::from_str::<WireDepthMessage>(text) else {
            debug!(venue = "maker", "failed to decode depth message");
            return;
        };
        let book = msg.into_orderbook();
        if !book.is_valid() {
            warn!(venue = "maker", "decoded depth message violates ladder invariants, dropping");
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
            self.events.send(QuoteEvent::DepthUpdate { venue: Venue::Maker }).await;
        }
    }

    /// Long-running private-order stream. Reconnects with a flat 5-second
    /// delay on any error, forever.
    pub async fn run_private_orders_stream(&self) {
        loop {
            if let Err(e) = self.orders_stream_once().await {
                let err = crate::errors::EngineError::TransientStream { venue: "maker-orders", source: e };
                warn!(%err, "reconnecting in 5s");
                self.record_reconnect("orders");
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    async fn orders_stream_once(&self) -> anyhow::Result<()> {
        let listen_key = self.current_listen_key()?;
        let url = format!("{}?listenKey={}", self.ws_orders_url, listen_key);
        let (ws, _) = connect_async(&url).await?;
        info!(venue = "maker", "private order stream connected");
        let (mut write, mut read) = ws.split();
        write
            .send(Message::Text(
                serde_json::json!({ "op": "login", "key": self.api_key }).to_string(),
            ))
            .await?;

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => self.on_order_message(&text).await,
                Message::Ping(payload) => {
                    write.send(Message::Pong(payload)).await?;
                }
                Message::Close(frame) => {
                    debug!(venue = "maker", ?frame, "order stream closed by remote");
                    anyhow::bail!("order stream closed");
                }
                _ => {}
            }
        }
        anyhow::bail!("order stream ended")
    }

    async fn on_order_message(&self, text: &str) {
        let Ok(msg) = serde_json::from_str::<WireOrderMessage>(text) else {
            debug!(venue = "maker", "failed to decode order message");
            return;
        };
        let fill = msg.into_fill_event();

        let emit = {
            let mut active = self.active_orders.lock().expect("active_orders mutex poisoned");
            match fill.status {
                FillStatus::New => false,
                FillStatus::Filled | FillStatus::Canceled | FillStatus::Rejected => {
                    remove_level(&mut active, &fill.id);
                    matches!(fill.status, FillStatus::Filled)
                }
                FillStatus::Partial => {
                    if let Some(level) = find_level_mut(&mut active, &fill.id) {
                        level.size = fill.remain_qty;
                    }
                    true
                }
            }
        };

        self.update_trade_counters(&fill);

        if let Some(m) = self.metrics() {
            let status = match fill.status {
                FillStatus::New => "new",
                FillStatus::Filled => "filled",
                FillStatus::Partial => "partial",
                FillStatus::Canceled => "canceled",
                FillStatus::Rejected => "rejected",
            };
            m.fills_total.with_label_values(&[&fill.side.to_string(), status]).inc();
        }

        if emit {
            self.events.send(QuoteEvent::OrderFill(fill)).await;
        }
    }

    fn update_trade_counters(&self, fill: &FillEvent) {
        if !matches!(fill.status, FillStatus::Filled | FillStatus::Partial) {
            return;
        }
        match fill.side {
            Side::Buy => *self.amount_bought.lock().expect("amount_bought mutex poisoned") += fill.cum_qty,
            Side::Sell => *self.amount_sold.lock().expect("amount_sold mutex poisoned") += fill.cum_qty,
        }
    }

    /// Long-running private-account (balance) stream. Reconnects with a flat
    /// 5-second delay on any error, forever.
    pub async fn run_balance_stream(&self) {
        loop {
            if let Err(e) = self.balance_stream_once().await {
                let err = crate::errors::EngineError::TransientStream { venue: "maker-balance", source: e };
                warn!(%err, "reconnecting in 5s");
                self.record_reconnect("balance");
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    async fn balance_stream_once(&self) -> anyhow::Result<()> {
        let listen_key = self.current_listen_key()?;
        let url = format!("{}?listenKey={}", self.ws_orders_url, listen_key);
        let (ws, _) = connect_async(&url).await?;
        info!(venue = "maker", "balance stream connected");
        let (mut write, mut read) = ws.split();
        write
            .send(Message::Text(
                serde_json::json!({ "op": "login", "key": self.api_key, "channel": "account" })
                    .to_string(),
            ))
            .await?;

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => self.on_balance_message(&text),
                Message::Ping(payload) => {
                    write.send(Message::Pong(payload)).await?;
                }
                Message::Close(frame) => {
                    debug!(venue = "maker", ?frame, "balance stream closed by remote");
                    anyhow::bail!("balance stream closed");
                }
                _ => {}
            }
        }
        anyhow::bail!("balance stream ended")
    }

    fn on_balance_message(&self, text: &str) {
        let Ok(msg) = serde_json::from_str::<WireBalanceMessage>(text) else {
            debug!(venue = "maker", "failed to decode balance message");
            return;
        };
        let mut balances = self.balances.lock().expect("balances mutex poisoned");
        balances.set(msg.asset, Balance { free: msg.free, locked: msg.locked });
    }

    fn signed_headers(&self, method: &str, path: &str, query: &str) -> Vec<(String, String)> {
        let timestamp = unix_millis();
        let payload = format!("{method}{path}{query}{timestamp}");
        let signature = sign_hex(&self.api_secret, &payload);
        vec![
            ("X-API-KEY".to_string(), self.api_key.clone()),
            ("X-API-SIGNATURE".to_string(), signature),
            ("X-API-TIMESTAMP".to_string(), timestamp.to_string()),
        ]
    }
}

#[async_trait]
impl OrderBookSource for MakerVenueAdapter {
    fn get_orderbook(&self) -> OrderBook {
        self.orderbook.lock().expect("orderbook mutex poisoned").clone()
    }
}

#[async_trait]
impl OrderPlacer for MakerVenueAdapter {
    fn get_active_orders(&self) -> OrderBook {
        self.active_orders.lock().expect("active_orders mutex poisoned").clone()
    }

    fn get_balance(&self) -> Balances {
        self.balances.lock().expect("balances mutex poisoned").clone()
    }

    async fn place_limit(&self, side: Side, size: Dec, price: Dec) -> Option<String> {
        let _permit = self.placement_lock.lock().await;

        let path = "/api/v3/order";
        let side_str = side.to_string();
        let query = format!("pair={}&side={side_str}&size={size}&price={price}", self.pair);
        let headers = self.signed_headers("POST", path, &query);
        let url = format!("{}{}?{}", self.rest_base, path, query);

        let mut req = self.http.post(&url);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(venue = "maker", error = %e, "place_limit request failed");
                return None;
            }
        };

        if resp.status() != reqwest::StatusCode::OK {
            let err = crate::errors::EngineError::RpcRejected {
                op: "place_limit",
                order_id: None,
                status: resp.status().as_u16(),
            };
            warn!(%err);
            return None;
        }

        let body: PlaceOrderResponse = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(venue = "maker", error = %e, "place_limit response undecodable");
                return None;
            }
        };

        let mut active = self.active_orders.lock().expect("active_orders mutex poisoned");
        let ladder = match side {
            Side::Sell => &mut active.asks,
            Side::Buy => &mut active.bids,
        };
        insert_sorted(ladder, PriceLevel::ours(body.order_id.clone(), price, size), side);
        drop(active);

        if let Some(m) = self.metrics() {
            m.orders_placed_total.with_label_values(&[&side.to_string()]).inc();
        }

        Some(body.order_id)
    }

    async fn cancel(&self, order_id: &str) -> Option<()> {
        let path = "/api/v3/order";
        let query = format!("order_id={order_id}");
        let headers = self.signed_headers("DELETE", path, &query);
        let url = format!("{}{}?{}", self.rest_base, path, query);

        let mut req = self.http.delete(&url);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send().await.ok()?;
        if resp.status() != reqwest::StatusCode::OK {
            let err = crate::errors::EngineError::RpcRejected {
                op: "cancel",
                order_id: Some(order_id.to_string()),
                status: resp.status().as_u16(),
            };
            warn!(%err);
            return None;
        }

        let mut active = self.active_orders.lock().expect("active_orders mutex poisoned");
        let side = if active.asks.iter().any(|l| l.id == order_id) { Some(Side::Sell) } else if active.bids.iter().any(|l| l.id == order_id) { Some(Side::Buy) } else { None };
        remove_level(&mut active, order_id);
        drop(active);

        if let (Some(m), Some(side)) = (self.metrics(), side) {
            m.orders_canceled_total.with_label_values(&[&side.to_string()]).inc();
        }

        Some(())
    }

    async fn cancel_all(&self) {
        let path = "/api/v3/openOrders";
        let query = format!("pair={}", self.pair);
        let headers = self.signed_headers("DELETE", path, &query);
        let url = format!("{}{}?{}", self.rest_base, path, query);

        let mut req = self.http.delete(&url);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        match req.send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                *self.active_orders.lock().expect("active_orders mutex poisoned") = OrderBook::default();
            }
            Ok(resp) => {
                let err = crate::errors::EngineError::RpcRejected {
                    op: "cancel_all",
                    order_id: None,
                    status: resp.status().as_u16(),
                };
                warn!(%err);
            }
            Err(e) => warn!(venue = "maker", error = %e, "cancel_all request failed"),
        }
    }
}

fn remove_level(book: &mut OrderBook, id: &str) {
    book.asks.retain(|l| l.id != id);
    book.bids.retain(|l| l.id != id);
}

fn find_level_mut<'a>(book: &'a mut OrderBook, id: &str) -> Option<&'a mut PriceLevel> {
    book.asks
        .iter_mut()
        .chain(book.bids.iter_mut())
        .find(|l| l.id == id)
}

fn insert_sorted(ladder: &mut Vec<PriceLevel>, level: PriceLevel, side: Side) {
    let pos = match side {
        Side::Sell => ladder.partition_point(|l| l.price < level.price),
        Side::Buy => ladder.partition_point(|l| l.price > level.price),
    };
    if ladder.get(pos).map(|l| l.price) != Some(level.price) {
        ladder.insert(pos, level);
    }
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

#[derive(Debug, Deserialize)]
struct WireOrderMessage {
    id: String,
    side: String,
    price: Dec,
    cum_qty: Dec,
    remain_qty: Dec,
    status: u8,
}

impl WireOrderMessage {
    fn into_fill_event(self) -> FillEvent {
        let side = if self.side.eq_ignore_ascii_case("buy") { Side::Buy } else { Side::Sell };
        let status = match self.status {
            1 => FillStatus::New,
            2 => FillStatus::Filled,
            3 => FillStatus::Partial,
            4 => FillStatus::Canceled,
            _ => FillStatus::Rejected,
        };
        FillEvent {
            id: self.id,
            side,
            price: self.price,
            cum_qty: self.cum_qty,
            remain_qty: self.remain_qty,
            status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireBalanceMessage {
    asset: String,
    free: Dec,
    locked: Dec,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountSnapshot {
    balances: Vec<AccountBalanceEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountBalanceEntry {
    asset: String,
    free: Dec,
    locked: Dec,
}

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct ListenKeyResponse {
    listen_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::bounded;
    use rust_decimal_macros::dec;

    fn adapter() -> MakerVenueAdapter {
        let (tx, _rx) = bounded(16);
        MakerVenueAdapter::new(
            "https://maker.example",
            "wss://maker.example/depth",
            "wss://maker.example/orders",
            "key",
            "secret",
            "RMVUSDT",
            tx,
        )
    }

    #[tokio::test]
    async fn depth_message_dedup_emits_once() {
        let a = adapter();
        a.on_depth_message(r#"{"asks":[["0.00250","100000"]],"bids":[["0.00240","100000"]]}"#).await;
        let book_first = a.get_orderbook();
        a.on_depth_message(r#"{"asks":[["0.00250","100000"]],"bids":[["0.00240","100000"]]}"#).await;
        let book_second = a.get_orderbook();
        assert_eq!(book_first, book_second);
    }

    #[tokio::test]
    async fn partial_fill_updates_remaining_size() {
        let a = adapter();
        {
            let mut active = a.active_orders.lock().unwrap();
            active.bids.push(PriceLevel::ours("o1", dec!(0.00240), dec!(100000)));
        }
        a.on_order_message(
            r#"{"id":"o1","side":"buy","price":"0.00240","cum_qty":"40000","remain_qty":"60000","status":3}"#,
        )
        .await;
        let active = a.get_active_orders();
        assert_eq!(active.bids[0].size, dec!(60000));
        assert_eq!(a.amount_bought(), dec!(40000));
    }

    #[tokio::test]
    async fn full_fill_removes_level_and_emits() {
        let a = adapter();
        {
            let mut active = a.active_orders.lock().unwrap();
            active.asks.push(PriceLevel::ours("o2", dec!(0.00250), dec!(100000)));
        }
        a.on_order_message(
            r#"{"id":"o2","side":"sell","price":"0.00250","cum_qty":"100000","remain_qty":"0","status":2}"#,
        )
        .await;
        assert!(a.get_active_orders().asks.is_empty());
        assert_eq!(a.amount_sold(), dec!(100000));
    }

    #[tokio::test]
    async fn canceled_order_is_removed_without_emitting() {
        let a = adapter();
        {
            let mut active = a.active_orders.lock().unwrap();
            active.bids.push(PriceLevel::ours("o3", dec!(0.00240), dec!(100000)));
        }
        a.on_order_message(
            r#"{"id":"o3","side":"buy","price":"0.00240","cum_qty":"0","remain_qty":"100000","status":4}"#,
        )
        .await;
        assert!(a.get_active_orders().bids.is_empty());
    }

    #[tokio::test]
    async fn orders_stream_without_a_listen_key_fails_fast() {
        let a = adapter();
        let err = a.orders_stream_once().await.unwrap_err();
        assert!(err.to_string().contains("listen key"));
    }

    #[tokio::test]
    async fn renew_listen_key_without_one_acquired_fails_fast() {
        let a = adapter();
        assert!(a.renew_listen_key().await.is_err());
    }

    #[test]
    fn reset_counters_zeroes_both_sides() {
        let a = adapter();
        *a.amount_bought.lock().unwrap() = dec!(1000);
        *a.amount_sold.lock().unwrap() = dec!(2000);
        a.reset_counters();
        assert_eq!(a.amount_bought(), Decimal::ZERO);
        assert_eq!(a.amount_sold(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn fills_increment_the_attached_metrics_registry() {
        let a = adapter();
        let metrics = Arc::new(crate::monitoring::MetricsRegistry::new().unwrap());
        a.set_metrics(metrics.clone());
        {
            let mut active = a.active_orders.lock().unwrap();
            active.asks.push(PriceLevel::ours("o4", dec!(0.00250), dec!(100000)));
        }
        a.on_order_message(
            r#"{"id":"o4","side":"sell","price":"0.00250","cum_qty":"100000","remain_qty":"0","status":2}"#,
        )
        .await;
        assert_eq!(metrics.fills_total.with_label_values(&["sell", "filled"]).get(), 1);
    }

    #[test]
    fn insert_sorted_preserves_ascending_ask_order_without_duplicates() {
        let mut asks = vec![PriceLevel::ours("a", dec!(10), dec!(1))];
        insert_sorted(&mut asks, PriceLevel::ours("b", dec!(9), dec!(1)), Side::Sell);
        insert_sorted(&mut asks, PriceLevel::ours("c", dec!(10), dec!(5)), Side::Sell);
        assert_eq!(asks.len(), 2);
        assert_eq!(asks[0].price, dec!(9));
        assert_eq!(asks[1].id, "a");
    }
}
