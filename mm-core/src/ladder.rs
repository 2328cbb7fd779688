//! The reconciliation algorithm: given current active orders, both depth
//! books, balances, and target quotes, decides which resting orders to
//! cancel and which to place, and applies both through an [`OrderPlacer`].
//!
//! Two phases per cycle: cancellations first (so a slot freed this cycle can
//! be refilled in the same cycle's placement phase), then placement. Both
//! phases are driven by the same `OrderBook`/`Balances` snapshots taken at
//! the start of the cycle; the adapter's own internal state may move ahead
//! of these snapshots mid-cycle as individual RPCs complete, which is fine —
//! the next cycle reconciles against whatever is current then.

use rand::Rng;
use rust_decimal::Decimal;

use crate::model::{Balances, OrderBook, Side};
use crate::numeric::{Dec, N_ASKS, N_BIDS, TICK};
use crate::pricer;
use crate::recorder::Recorder;
use crate::venues::OrderPlacer;

/// Minimum notional size before an order is worth placing (sub-minimum
/// orders are skipped, not rejected).
const MIN_NOTIONAL_USDT: Dec = rust_decimal_macros::dec!(1);

const MIN_FREE_RMV: Dec = rust_decimal_macros::dec!(400);
const MIN_FREE_USDT: Dec = rust_decimal_macros::dec!(1.10);

const OVERSIZED_FRONT: Dec = rust_decimal_macros::dec!(5000);
const OVERSIZED_BAND: Dec = rust_decimal_macros::dec!(20000);
const BAND_PCT: Dec = rust_decimal_macros::dec!(0.02);

const PLACE_SIZE_MIN: i64 = 2000;
const PLACE_SIZE_MAX: i64 = 4000;

pub struct LadderManager;

impl LadderManager {
    /// Run one reconciliation cycle against `placer`. No-ops (returns
    /// without touching anything) if either book is empty, quotes can't be
    /// computed, or the required balances are missing.
    pub async fn run(
        placer: &(impl OrderPlacer + ?Sized),
        recorder: &dyn Recorder,
        maker_book: &OrderBook,
        ref_book: &OrderBook,
        balances: &Balances,
    ) {
        if !maker_book.is_nonempty() || !ref_book.is_nonempty() {
            return;
        }
        let Some(mid) = maker_book.mid() else { return };
        let Some((ask_q, bid_q)) = pricer::quotes(maker_book, ref_book, balances) else { return };
        let (Some(rmv), Some(usdt)) = (balances.get("RMV"), balances.get("USDT")) else { return };

        let active = placer.get_active_orders();

        cancel_phase(placer, &active.asks, ask_q, mid, Side::Sell).await;
        cancel_phase(placer, &active.bids, bid_q, mid, Side::Buy).await;

        let active_after_cancel = placer.get_active_orders();
        place_asks(placer, recorder, &active_after_cancel, ask_q, rmv.free).await;
        place_bids(placer, recorder, &active_after_cancel, bid_q, usdt.free).await;

        check_post_cycle_invariants(&placer.get_active_orders(), ask_q, bid_q);
    }
}

/// Logs (but does not abort on) a violation of the cycle-end invariants: no
/// duplicate prices on a side, strictly ordered ladders, no ask at or below
/// `ask_q`'s mirror fair price, no bid at or above it. The next cycle's
/// cancellation rules are expected to clean up any violation found here.
fn check_post_cycle_invariants(active: &OrderBook, ask_q: Dec, bid_q: Dec) {
    if !active.is_valid() {
        let err = crate::errors::EngineError::invariant(
            "active orders ladder is not strictly ordered or contains non-positive levels after a reconciliation cycle",
        );
        tracing::error!(%err);
    }
    if active.asks.iter().any(|l| l.price < ask_q) || active.bids.iter().any(|l| l.price > bid_q) {
        let err = crate::errors::EngineError::invariant(
            "an active order crossed its own quote after a reconciliation cycle",
        );
        tracing::error!(%err);
    }
}

async fn cancel_phase(
    placer: &(impl OrderPlacer + ?Sized),
    levels: &[crate::model::PriceLevel],
    quote: Dec,
    mid: Dec,
    side: Side,
) {
    for level in levels {
        if should_cancel(level.price, level.size, quote, mid, side) {
            placer.cancel(&level.id).await;
        }
    }
}

/// Phase A cancellation predicate, mirrored for asks/bids around their
/// respective quote.
fn should_cancel(price: Dec, size: Dec, quote: Dec, mid: Dec, side: Side) -> bool {
    match side {
        Side::Sell => {
            let window_top = quote + Dec::from(N_ASKS as i64 - 1) * TICK;
            let stale = price < quote;
            let out_of_window = price > window_top;
            let oversized_front = price == quote && size > OVERSIZED_FRONT;
            let oversized_far = price > mid * (Decimal::ONE + BAND_PCT) && size > OVERSIZED_BAND;
            stale || out_of_window || oversized_front || oversized_far
        }
        Side::Buy => {
            let window_bottom = quote - Dec::from(N_BIDS as i64 - 1) * TICK;
            let stale = price > quote;
            let out_of_window = price < window_bottom;
            let oversized_front = price == quote && size > OVERSIZED_FRONT;
            let oversized_far = price < mid * (Decimal::ONE - BAND_PCT) && size > OVERSIZED_BAND;
            stale || out_of_window || oversized_front || oversized_far
        }
    }
}

async fn place_asks(
    placer: &(impl OrderPlacer + ?Sized),
    recorder: &dyn Recorder,
    active: &OrderBook,
    ask_q: Dec,
    free_rmv: Dec,
) {
    let existing_prices: Vec<Dec> = active.asks.iter().map(|l| l.price).collect();
    let mut remaining_slots = N_ASKS.saturating_sub(existing_prices.len());
    // Tracks this cycle's remaining RMV budget as slots are filled, so a
    // later slot in the same cycle sees the balance the earlier ones spent.
    let mut remaining_rmv = free_rmv;

    for step in 0..N_ASKS {
        if remaining_slots == 0 {
            break;
        }
        let price = ask_q + Dec::from(step as i64) * TICK;
        if existing_prices.contains(&price) {
            continue;
        }
        if remaining_rmv <= MIN_FREE_RMV {
            let err = crate::errors::EngineError::InsufficientBalance {
                reason: format!("free RMV {remaining_rmv} at or below floor {MIN_FREE_RMV}, skipping remaining ask slots"),
            };
            tracing::warn!(%err);
            break;
        }

        let cap = (remaining_rmv / Dec::from(remaining_slots as i64)).floor();
        if cap <= Decimal::ZERO {
            break;
        }

        let raw_size = Dec::from(random_in_range(PLACE_SIZE_MIN, PLACE_SIZE_MAX));
        let size = raw_size.min(cap);
        if size * price < MIN_NOTIONAL_USDT || size < Decimal::ONE {
            let err = crate::errors::EngineError::InsufficientBalance {
                reason: format!("ask slot at {price} would place sub-minimum notional {}, skipping", size * price),
            };
            tracing::warn!(%err);
            remaining_slots -= 1;
            continue;
        }

        if placer.place_limit(Side::Sell, size, price).await.is_some() {
            recorder.record_placement(Side::Sell, price, size);
            remaining_rmv -= size;
        }
        remaining_slots -= 1;
    }
}

async fn place_bids(
    placer: &(impl OrderPlacer + ?Sized),
    recorder: &dyn Recorder,
    active: &OrderBook,
    bid_q: Dec,
    free_usdt: Dec,
) {
    let existing_prices: Vec<Dec> = active.bids.iter().map(|l| l.price).collect();
    let mut remaining_slots = N_BIDS.saturating_sub(existing_prices.len());
    // Tracks this cycle's remaining USDT budget as slots are filled, so a
    // later slot in the same cycle sees the balance the earlier ones spent.
    let mut remaining_usdt = free_usdt;

    for step in 0..N_BIDS {
        if remaining_slots == 0 {
            break;
        }
        let price = bid_q - Dec::from(step as i64) * TICK;
        if existing_prices.contains(&price) {
            continue;
        }
        if remaining_usdt <= MIN_FREE_USDT {
            let err = crate::errors::EngineError::InsufficientBalance {
                reason: format!("free USDT {remaining_usdt} at or below floor {MIN_FREE_USDT}, skipping remaining bid slots"),
            };
            tracing::warn!(%err);
            break;
        }

        let cap = (remaining_usdt / (price * Dec::from(remaining_slots as i64))).floor();
        if cap <= Decimal::ZERO {
            break;
        }

        let raw_size = Dec::from(random_in_range(PLACE_SIZE_MIN, PLACE_SIZE_MAX));
        let size = raw_size.min(cap);
        if size * price < MIN_NOTIONAL_USDT || size < Decimal::ONE {
            let err = crate::errors::EngineError::InsufficientBalance {
                reason: format!("bid slot at {price} would place sub-minimum notional {}, skipping", size * price),
            };
            tracing::warn!(%err);
            remaining_slots -= 1;
            continue;
        }

        if placer.place_limit(Side::Buy, size, price).await.is_some() {
            recorder.record_placement(Side::Buy, price, size);
            remaining_usdt -= size * price;
        }
        remaining_slots -= 1;
    }
}

fn random_in_range(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}
