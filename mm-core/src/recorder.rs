//! Persistence boundary the core delegates to: a `Recorder` trait whose
//! method names mirror the SQL table list (`orders`, `every_order_placed`,
//! `market_states`, `kucoin_orderbook`/`mexc_orderbook`, `our_orders`), plus
//! a newline-delimited-JSON reference implementation.
//!
//! A real SQL-backed `Recorder` is an external collaborator this crate does
//! not implement; `JournalRecorder` is the always-present ambient path so the
//! core has somewhere durable to write even with no database configured.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, SystemTime};

use crossbeam::channel::{bounded, Sender};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::model::{FillEvent, MarketSnapshot, OrderBook};

/// Everything the core ever hands to persistence. No SQL, no connection
/// pooling: those belong to the delegated collaborator.
pub trait Recorder: Send + Sync {
    /// A private-order lifecycle event (`orders` table).
    fn record_order(&self, fill: &FillEvent);
    /// A resting-order placement, kept for audit even after the order is
    /// gone from `ActiveOrders` (`every_order_placed` table).
    fn record_placement(&self, side: crate::model::Side, price: crate::numeric::Dec, size: crate::numeric::Dec);
    /// A computed point-in-time market summary (`market_states` table).
    fn record_market_state(&self, snapshot: &MarketSnapshot);
    /// A public venue order book, labeled by venue (`kucoin_orderbook` /
    /// `mexc_orderbook` generalized to an arbitrary label).
    fn record_orderbook(&self, label: &str, book: &OrderBook);
    /// A snapshot of our own resting orders (`our_orders` table).
    fn record_our_orders_snapshot(&self, active: &OrderBook);
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
enum JournalEvent {
    Order(FillEvent),
    Placement { side: crate::model::Side, price: crate::numeric::Dec, size: crate::numeric::Dec },
    MarketState(MarketSnapshot),
    Orderbook { label: String, book: OrderBook },
    OurOrders(OrderBook),
}

#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
    timestamp_ms: u64,
    #[serde(flatten)]
    event: JournalEvent,
}

impl JournalEntry {
    fn new(event: JournalEvent) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        Self { timestamp_ms, event }
    }
}

/// Background-thread newline-delimited-JSON writer. `record` never blocks:
/// a full buffer drops the event and logs, rather than stalling the caller
/// (the caller is the single-consumer event loop, which must keep draining).
pub struct JournalRecorder {
    sender: Option<Sender<JournalEvent>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl JournalRecorder {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let (sender, receiver) = bounded(4096);
        let handle = thread::spawn(move || Self::writer_loop(path, receiver));
        Ok(Self { sender: Some(sender), thread_handle: Some(handle) })
    }

    fn writer_loop(path: PathBuf, receiver: crossbeam::channel::Receiver<JournalEvent>) {
        let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                error!(?path, error = %e, "failed to open journal file");
                return;
            }
        };

        for event in receiver {
            let entry = JournalEntry::new(event);
            match serde_json::to_string(&entry) {
                Ok(json) => {
                    if let Err(e) = writeln!(file, "{json}") {
                        error!(error = %e, "failed to write journal entry");
                    }
                }
                Err(e) => error!(error = %e, "failed to serialize journal entry"),
            }
        }

        let _ = file.flush();
        info!("journal writer thread stopping");
    }

    fn record(&self, event: JournalEvent) {
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.try_send(event) {
                error!(error = %e, "journal buffer full or disconnected, dropping event");
            }
        }
    }
}

impl Recorder for JournalRecorder {
    fn record_order(&self, fill: &FillEvent) {
        self.record(JournalEvent::Order(fill.clone()));
    }

    fn record_placement(&self, side: crate::model::Side, price: crate::numeric::Dec, size: crate::numeric::Dec) {
        self.record(JournalEvent::Placement { side, price, size });
    }

    fn record_market_state(&self, snapshot: &MarketSnapshot) {
        self.record(JournalEvent::MarketState(*snapshot));
    }

    fn record_orderbook(&self, label: &str, book: &OrderBook) {
        self.record(JournalEvent::Orderbook { label: label.to_string(), book: book.clone() });
    }

    fn record_our_orders_snapshot(&self, active: &OrderBook) {
        self.record(JournalEvent::OurOrders(active.clone()));
    }
}

impl Drop for JournalRecorder {
    fn drop(&mut self) {
        // Drop the sender first so the writer thread's `for event in receiver`
        // terminates instead of blocking forever on an open channel.
        let _ = self.sender.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// A `Recorder` that discards everything. Used where no durable sink is
/// configured (e.g. tests, or a deployment that only wants metrics).
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn record_order(&self, _fill: &FillEvent) {}
    fn record_placement(&self, _side: crate::model::Side, _price: crate::numeric::Dec, _size: crate::numeric::Dec) {}
    fn record_market_state(&self, _snapshot: &MarketSnapshot) {}
    fn record_orderbook(&self, _label: &str, _book: &OrderBook) {}
    fn record_our_orders_snapshot(&self, _active: &OrderBook) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FillStatus, Side};
    use rust_decimal_macros::dec;
    use std::io::{BufRead, BufReader};
    use tempfile::NamedTempFile;

    #[test]
    fn journal_recorder_round_trips_an_order_event() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        {
            let recorder = JournalRecorder::open(path.clone()).unwrap();
            recorder.record_order(&FillEvent {
                id: "o1".to_string(),
                side: Side::Buy,
                price: dec!(0.00240),
                cum_qty: dec!(1000),
                remain_qty: dec!(0),
                status: FillStatus::Filled,
            });
        }

        let reader = BufReader::new(std::fs::File::open(&path).unwrap());
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>().unwrap();
        assert_eq!(lines.len(), 1);
        let entry: JournalEntry = serde_json::from_str(&lines[0]).unwrap();
        match entry.event {
            JournalEvent::Order(f) => assert_eq!(f.id, "o1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn null_recorder_accepts_everything_without_panicking() {
        let r = NullRecorder;
        r.record_order(&FillEvent {
            id: "x".to_string(),
            side: Side::Sell,
            price: dec!(1),
            cum_qty: dec!(1),
            remain_qty: dec!(0),
            status: FillStatus::Filled,
        });
        r.record_market_state(&MarketSnapshot {
            mid: dec!(1),
            spread_pct: dec!(0),
            depth: dec!(0),
            fair_price: dec!(1),
            inventory: dec!(0),
        });
    }
}
