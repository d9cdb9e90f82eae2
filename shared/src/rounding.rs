//! Quantity and money rounding
//!
//! Arithmetic results are kept at four decimals internally; anything stored
//! or shown to the user is rounded to two. Pack counts always round up.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimals kept between computation steps
pub const INTERNAL_SCALE: u32 = 4;

/// Decimals for stored and displayed values
pub const DISPLAY_SCALE: u32 = 2;

/// Round an intermediate quantity
pub fn round_internal(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(INTERNAL_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a quantity or price for storage and display
pub fn round_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Smallest whole number of packages covering `need`
///
/// Returns at least 1. `package_size` must be positive; callers fall back
/// to a single pack otherwise.
pub fn ceil_packs(need: Decimal, package_size: Decimal) -> i32 {
    if package_size <= Decimal::ZERO || need <= Decimal::ZERO {
        return 1;
    }
    // strip division noise only; any real remainder still buys another pack
    let packs = (need / package_size).round_dp(20).ceil();
    packs.to_i32().unwrap_or(i32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round_internal_keeps_four_decimals() {
        assert_eq!(round_internal(dec("1.23456")), dec("1.2346"));
        assert_eq!(round_internal(dec("0.00004")), dec("0.0000"));
    }

    #[test]
    fn test_round_display_half_away_from_zero() {
        assert_eq!(round_display(dec("2.345")), dec("2.35"));
        assert_eq!(round_display(dec("-2.345")), dec("-2.35"));
        assert_eq!(round_display(dec("1300")), dec("1300"));
    }

    #[test]
    fn test_ceil_packs() {
        assert_eq!(ceil_packs(dec("1300"), dec("1000")), 2);
        assert_eq!(ceil_packs(dec("1000"), dec("1000")), 1);
        assert_eq!(ceil_packs(dec("0.5"), dec("1000")), 1);
        assert_eq!(ceil_packs(dec("2001"), dec("1000")), 3);
    }

    #[test]
    fn test_ceil_packs_ignores_float_noise() {
        // 1/3 * 3 in Decimal carries trailing digits
        let need = dec("1") / dec("3") * dec("3");
        assert_eq!(ceil_packs(need, dec("1")), 1);
    }

    #[test]
    fn test_ceil_packs_never_under_orders() {
        assert_eq!(ceil_packs(dec("2000.00"), dec("1999.99")), 2);
    }

    #[test]
    fn test_ceil_packs_invalid_package() {
        assert_eq!(ceil_packs(dec("5"), Decimal::ZERO), 1);
    }
}
