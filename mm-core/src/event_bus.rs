//! A bounded FIFO queue delivering `QuoteEvent`s from the venue adapters to
//! the Supervisor's single consumer loop.
//!
//! Backed by `tokio::sync::mpsc::channel`: producers await a permit when the
//! bus is full (back-pressure, not drop), and there is exactly one receiver,
//! ensuring strict FIFO delivery to a single consumer.

use tokio::sync::mpsc;

use crate::model::QuoteEvent;

/// Default bus capacity. Generous enough that a short burst of depth updates
/// across both venues never blocks a producer under normal operation.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventSender(mpsc::Sender<QuoteEvent>);

impl EventSender {
    /// Enqueue an event, suspending the caller if the bus is full.
    pub async fn send(&self, event: QuoteEvent) {
        // The only receiver is the Supervisor's drain loop; if it has been
        // dropped the process is shutting down, so a failed send is ignored.
        let _ = self.0.send(event).await;
    }
}

pub struct EventReceiver(mpsc::Receiver<QuoteEvent>);

impl EventReceiver {
    /// Receive the next event in FIFO order, suspending until one arrives.
    pub async fn recv(&mut self) -> Option<QuoteEvent> {
        self.0.recv().await
    }
}

/// Construct a bounded event bus with the given capacity.
pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender(tx), EventReceiver(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Venue;

    #[tokio::test]
    async fn events_are_delivered_in_fifo_order() {
        let (tx, mut rx) = bounded(DEFAULT_CAPACITY);
        tx.send(QuoteEvent::DepthUpdate { venue: Venue::Maker }).await;
        tx.send(QuoteEvent::DepthUpdate { venue: Venue::Reference }).await;

        assert_eq!(rx.recv().await, Some(QuoteEvent::DepthUpdate { venue: Venue::Maker }));
        assert_eq!(rx.recv().await, Some(QuoteEvent::DepthUpdate { venue: Venue::Reference }));
    }

    #[tokio::test]
    async fn recv_returns_none_once_all_senders_are_dropped() {
        let (tx, mut rx) = bounded(4);
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }
}
