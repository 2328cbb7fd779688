//! Capability interfaces the rest of the core depends on, and the two
//! concrete adapters that implement them. Pricer and LadderManager never
//! import a concrete adapter type, only these traits — the fix for the
//! source's cyclic module dependencies.

pub mod maker;
pub mod reference;
pub mod signing;

use async_trait::async_trait;

use crate::model::{Balances, OrderBook};
use crate::numeric::Dec;

/// Read-only access to a venue's public depth book. Implemented by both
/// adapters. Snapshot getters never block, so this trait has no async
/// methods.
pub trait OrderBookSource: Send + Sync {
    fn get_orderbook(&self) -> OrderBook;
}

/// Mutating access to the maker venue's order placement surface. Implemented
/// only by `MakerVenueAdapter`; `LadderManager` depends on this trait, never
/// on the concrete type.
#[async_trait]
pub trait OrderPlacer: Send + Sync {
    fn get_active_orders(&self) -> OrderBook;
    fn get_balance(&self) -> Balances;

    /// Place a resting limit order. Returns `None` on any remote rejection;
    /// never returns `Err` for a rejected order (that's a value, not an
    /// error).
    async fn place_limit(&self, side: crate::model::Side, size: Dec, price: Dec) -> Option<String>;

    /// Cancel a single order by id. Idempotent w.r.t. already-gone orders.
    async fn cancel(&self, order_id: &str) -> Option<()>;

    /// Best-effort bulk cancel of every resting order.
    async fn cancel_all(&self);
}

pub use maker::MakerVenueAdapter;
pub use reference::ReferenceVenueAdapter;
