//! Typed containers for the domain's entities: price-level ladders, balances,
//! active orders, fills, and the tagged event the EventBus carries.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::numeric::Dec;

/// A single resting order or public quote. `id` is empty for public-book
/// levels and a non-empty exchange-assigned identifier for our own orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub id: String,
    pub price: Dec,
    pub size: Dec,
}

impl PriceLevel {
    pub fn public(price: Dec, size: Dec) -> Self {
        Self { id: String::new(), price, size }
    }

    pub fn ours(id: impl Into<String>, price: Dec, size: Dec) -> Self {
        Self { id: id.into(), price, size }
    }
}

/// Which side of the book a level or fill belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// An ordered ladder of asks (ascending) and bids (descending). Used both
/// for the public depth book and for our own active orders.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
}

impl OrderBook {
    pub fn new(asks: Vec<PriceLevel>, bids: Vec<PriceLevel>) -> Self {
        Self { asks, bids }
    }

    pub fn best_ask(&self) -> Option<Dec> {
        self.asks.first().map(|l| l.price)
    }

    pub fn best_bid(&self) -> Option<Dec> {
        self.bids.first().map(|l| l.price)
    }

    pub fn mid(&self) -> Option<Dec> {
        match (self.best_ask(), self.best_bid()) {
            (Some(a), Some(b)) => Some((a + b) / Decimal::from(2)),
            _ => None,
        }
    }

    /// True if both sides carry at least one level.
    pub fn is_nonempty(&self) -> bool {
        !self.asks.is_empty() && !self.bids.is_empty()
    }

    /// Strict invariant check: ascending asks, descending bids, no duplicate
    /// prices on a side, all prices and sizes positive.
    pub fn is_valid(&self) -> bool {
        let ascending = self
            .asks
            .windows(2)
            .all(|w| w[0].price < w[1].price);
        let descending = self
            .bids
            .windows(2)
            .all(|w| w[0].price > w[1].price);
        let positive = self
            .asks
            .iter()
            .chain(self.bids.iter())
            .all(|l| l.price > Decimal::ZERO && l.size > Decimal::ZERO);
        ascending && descending && positive
    }

    /// Structural equality used to suppress no-op depth publishes. `derive`d
    /// `PartialEq` already does this pointwise comparison; this method exists
    /// to name the deduplication check by itself.
    pub fn same_ladder(&self, other: &OrderBook) -> bool {
        self == other
    }
}

/// Free/locked balance of a single asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub free: Dec,
    pub locked: Dec,
}

impl Balance {
    pub fn total(&self) -> Dec {
        self.free + self.locked
    }
}

/// Per-asset balance snapshot, e.g. `"RMV"` and `"USDT"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances(pub HashMap<String, Balance>);

impl Balances {
    pub fn get(&self, asset: &str) -> Option<Balance> {
        self.0.get(asset).copied()
    }

    pub fn set(&mut self, asset: impl Into<String>, balance: Balance) {
        self.0.insert(asset.into(), balance);
    }
}

/// Terminal/non-terminal lifecycle state of a private order event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStatus {
    New,
    Filled,
    Partial,
    Canceled,
    Rejected,
}

/// A private order-lifecycle event delivered by the maker venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
    pub id: String,
    pub side: Side,
    pub price: Dec,
    pub cum_qty: Dec,
    pub remain_qty: Dec,
    pub status: FillStatus,
}

/// Which venue a depth update originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Venue {
    Maker,
    Reference,
}

/// The single event type flowing through the EventBus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteEvent {
    DepthUpdate { venue: Venue },
    OrderFill(FillEvent),
}

/// Computed, point-in-time summary of market state, as persisted to the
/// `market_states` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub mid: Dec,
    pub spread_pct: Dec,
    pub depth: Dec,
    pub fair_price: Dec,
    pub inventory: Dec,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn level(price: Dec, size: Dec) -> PriceLevel {
        PriceLevel::public(price, size)
    }

    #[test]
    fn mid_is_average_of_best_ask_and_bid() {
        let book = OrderBook::new(
            vec![level(dec!(10), dec!(1))],
            vec![level(dec!(8), dec!(1))],
        );
        assert_eq!(book.mid(), Some(dec!(9)));
    }

    #[test]
    fn mid_is_none_when_a_side_is_empty() {
        let book = OrderBook::new(vec![], vec![level(dec!(8), dec!(1))]);
        assert_eq!(book.mid(), None);
    }

    #[test]
    fn is_valid_rejects_non_ascending_asks() {
        let book = OrderBook::new(
            vec![level(dec!(10), dec!(1)), level(dec!(9), dec!(1))],
            vec![],
        );
        assert!(!book.is_valid());
    }

    #[test]
    fn is_valid_rejects_duplicate_prices() {
        let book = OrderBook::new(
            vec![level(dec!(10), dec!(1)), level(dec!(10), dec!(1))],
            vec![],
        );
        assert!(!book.is_valid());
    }

    #[test]
    fn identical_ladders_compare_equal() {
        let a = OrderBook::new(vec![level(dec!(10), dec!(1))], vec![]);
        let b = OrderBook::new(vec![level(dec!(10), dec!(1))], vec![]);
        assert!(a.same_ladder(&b));
    }

    #[test]
    fn balances_round_trip_through_asset_map() {
        let mut balances = Balances::default();
        balances.set("RMV", Balance { free: dec!(800000), locked: Decimal::ZERO });
        assert_eq!(balances.get("RMV").unwrap().total(), dec!(800000));
        assert!(balances.get("USDT").is_none());
    }

    proptest! {
        /// Any strictly ascending sequence of distinct positive prices forms a
        /// valid ask ladder, and sorting it (however the caller assembled it)
        /// preserves that validity.
        #[test]
        fn strictly_ascending_distinct_prices_are_always_a_valid_ask_ladder(
            mut prices in proptest::collection::hash_set(1i64..100_000, 1..20),
        ) {
            let mut sorted: Vec<i64> = prices.drain().collect();
            sorted.sort_unstable();
            let asks: Vec<PriceLevel> = sorted
                .into_iter()
                .map(|p| level(Decimal::from(p), dec!(1)))
                .collect();
            let book = OrderBook::new(asks, vec![]);
            prop_assert!(book.is_valid());
        }

        /// `same_ladder` is reflexive for any book built from distinct prices,
        /// and two books built from the same price/size pairs always compare
        /// equal regardless of how they were constructed.
        #[test]
        fn same_ladder_is_reflexive(
            prices in proptest::collection::hash_set(1i64..100_000, 0..10),
        ) {
            let asks: Vec<PriceLevel> = {
                let mut sorted: Vec<i64> = prices.into_iter().collect();
                sorted.sort_unstable();
                sorted.into_iter().map(|p| level(Decimal::from(p), dec!(1))).collect()
            };
            let book = OrderBook::new(asks, vec![]);
            prop_assert!(book.same_ladder(&book.clone()));
        }
    }
}
