//! Pure functions over order books: market depth, market spread, cross-venue
//! fair price, and inventory-skewed quote prices. None of these touch I/O or
//! mutable state; every input is a decimal snapshot, every output is a
//! decimal or `None`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::model::{Balances, OrderBook};
use crate::numeric::{quantize_5dp, quantize_tick, Dec, Rounding, ALPHA, HALF_SPREAD, INVENTORY_LIMIT, INVENTORY_TARGET};

/// Sum of `price * size` over levels within `pct`% of mid, stopping at the
/// first out-of-band level on each side (levels are pre-sorted so this is a
/// safe early exit, not an approximation).
pub fn market_depth(book: &OrderBook, pct: Dec) -> Dec {
    let (Some(ask), Some(bid)) = (book.best_ask(), book.best_bid()) else {
        return Decimal::ZERO;
    };
    let mid = (ask + bid) / Decimal::from(2);
    let upper = mid * (Decimal::ONE + pct / Decimal::from(100));
    let lower = mid * (Decimal::ONE - pct / Decimal::from(100));

    let mut depth = Decimal::ZERO;
    for level in &book.asks {
        if level.price <= upper {
            depth += level.price * level.size;
        } else {
            break;
        }
    }
    for level in &book.bids {
        if level.price >= lower {
            depth += level.price * level.size;
        } else {
            break;
        }
    }
    depth
}

/// `(best_ask - best_bid) / mid * 100`, or `None` if either side is empty.
pub fn market_spread(book: &OrderBook) -> Option<Dec> {
    let ask = book.best_ask()?;
    let bid = book.best_bid()?;
    let mid = (ask + bid) / Decimal::from(2);
    Some((ask - bid) / mid * Decimal::from(100))
}

/// Liquidity-weighted cross-venue mid, quantized and clamped to the
/// reference venue's top of book.
pub fn fair_price(maker_book: &OrderBook, ref_book: &OrderBook, pct: Dec) -> Option<Dec> {
    if !maker_book.is_nonempty() || !ref_book.is_nonempty() {
        return None;
    }

    let maker_mid = maker_book.mid()?;
    let ref_mid = ref_book.mid()?;

    let maker_liq = market_depth(maker_book, pct);
    let ref_liq = market_depth(ref_book, pct);
    let total_liq = maker_liq + ref_liq;
    if total_liq.is_zero() {
        return None;
    }

    let weighted = (maker_mid * maker_liq + ref_mid * ref_liq) / total_liq;
    let mut fp = quantize_5dp(weighted, Rounding::HalfUp);

    let ref_ask = ref_book.best_ask()?;
    let ref_bid = ref_book.best_bid()?;

    if fp > ref_ask {
        fp = quantize_5dp(ref_ask, Rounding::HalfDown);
    }
    if fp < ref_bid {
        fp = quantize_5dp(ref_bid, Rounding::HalfUp);
    }

    Some(fp)
}

/// Percent band `fair_price` uses when weighting cross-venue liquidity.
pub const FAIR_PRICE_PCT: Dec = dec!(2);

/// Ask and bid quote prices: fair price plus/minus half the spread, shifted
/// by a continuous inventory-skew term.
pub fn quotes(maker_book: &OrderBook, ref_book: &OrderBook, balances: &Balances) -> Option<(Dec, Dec)> {
    let fp = fair_price(maker_book, ref_book, FAIR_PRICE_PCT)?;

    let rmv = balances.get("RMV")?;
    let _usdt = balances.get("USDT")?;

    let inventory = rmv.total();
    let z = (inventory - INVENTORY_TARGET) / INVENTORY_LIMIT;

    let ask = fp + HALF_SPREAD - ALPHA * z;
    let bid = fp - HALF_SPREAD - ALPHA * z;

    Some((
        quantize_tick(ask, Rounding::HalfUp),
        quantize_tick(bid, Rounding::HalfUp),
    ))
}
