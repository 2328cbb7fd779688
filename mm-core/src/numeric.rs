//! Fixed-point decimal arithmetic, tick-size quantization, and the constants
//! that parameterize the quoting model.
//!
//! `Dec` is the arbitrary-precision decimal used everywhere in the core; no
//! binary floating point crosses a component boundary.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Arbitrary-precision fixed-point decimal. `rust_decimal::Decimal` carries
/// up to 28-29 significant digits, comfortably inside the 18-digit precision
/// the source process required.
pub type Dec = Decimal;

/// Minimum price increment on the maker venue.
pub const TICK: Dec = dec!(0.00001);

/// Target resting inventory of the base asset (`RMV`).
pub const INVENTORY_TARGET: Dec = dec!(500000);

/// Half-width of the inventory band used to normalize the skew term.
pub const INVENTORY_LIMIT: Dec = dec!(200000);

/// Half the quoted spread (two ticks).
pub const HALF_SPREAD: Dec = dec!(0.00002);

/// Inventory-skew sensitivity: `alpha = half_spread * 0.5`.
pub const ALPHA: Dec = dec!(0.00001);

/// Number of asks/bids the ladder tries to maintain on each side.
pub const N_ASKS: usize = 5;
pub const N_BIDS: usize = 5;

/// Default target notional market-depth budget (within a 1,200..2,500 range).
pub const EXPECTED_DEPTH_DEFAULT: Dec = dec!(1800);

/// Rounding mode used at a quantization boundary. Mirrors the three modes
/// the source's decimal context distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    HalfUp,
    HalfDown,
    Floor,
}

/// Quantize `value` to `step` using `mode`. `step` is normally [`TICK`] or
/// the 5-decimal-place increment used by `fair_price`.
pub fn quantize(value: Dec, step: Dec, mode: Rounding) -> Dec {
    if step.is_zero() {
        return value;
    }
    let ratio = value / step;
    let rounded_units = match mode {
        Rounding::HalfUp => ratio.round_dp_with_strategy(
            0,
            rust_decimal::RoundingStrategy::MidpointAwayFromZero,
        ),
        Rounding::HalfDown => ratio.round_dp_with_strategy(
            0,
            rust_decimal::RoundingStrategy::MidpointTowardZero,
        ),
        Rounding::Floor => ratio.floor(),
    };
    rounded_units * step
}

/// Quantize to five decimal places using the given rounding mode (used by
/// `Pricer::fair_price`'s weighted-average step).
pub fn quantize_5dp(value: Dec, mode: Rounding) -> Dec {
    quantize(value, dec!(0.00001), mode)
}

/// Quantize to the maker venue's tick size using the given rounding mode.
pub fn quantize_tick(value: Dec, mode: Rounding) -> Dec {
    quantize(value, TICK, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_half_up_rounds_midpoint_away_from_zero() {
        let v = dec!(0.000025);
        assert_eq!(quantize_tick(v, Rounding::HalfUp), dec!(0.00003));
    }

    #[test]
    fn quantize_half_down_rounds_midpoint_toward_zero() {
        let v = dec!(0.000025);
        assert_eq!(quantize_tick(v, Rounding::HalfDown), dec!(0.00002));
    }

    #[test]
    fn quantize_floor_truncates() {
        let v = dec!(0.000029);
        assert_eq!(quantize_tick(v, Rounding::Floor), dec!(0.00002));
    }

    #[test]
    fn quantize_5dp_matches_tick_for_mexc_style_pair() {
        // TICK is already 5 decimal places, so the two quantizers agree here.
        let v = dec!(0.0024567);
        assert_eq!(quantize_5dp(v, Rounding::HalfUp), quantize_tick(v, Rounding::HalfUp));
    }

    #[test]
    fn alpha_is_half_of_half_spread() {
        assert_eq!(ALPHA, HALF_SPREAD * dec!(0.5));
    }
}
