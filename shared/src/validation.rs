//! Validation utilities for the Household Pantry platform

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::Unit;
use crate::rounding::round_internal;

/// Exclusive upper bound of a stored quantity (10 integer digits)
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

// ============================================================================
// Quantity Validations
// ============================================================================

/// Validate that a quantity is strictly positive and storable
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    if quantity >= MAX_QUANTITY {
        return Err("Quantity is too large");
    }
    Ok(())
}

/// Round a positive quantity to stored precision
///
/// Rejects quantities that vanish at four decimal places.
pub fn normalize_quantity(quantity: Decimal) -> Result<Decimal, &'static str> {
    validate_positive_quantity(quantity)?;
    let rounded = round_internal(quantity);
    if rounded.is_zero() {
        return Err("Quantity is below the smallest storable amount (0.0001)");
    }
    Ok(rounded)
}

/// Validate a declared stock level
pub fn validate_stock_level(stock: Decimal) -> Result<(), &'static str> {
    if stock < Decimal::ZERO {
        return Err("Stock level cannot be negative");
    }
    if stock >= MAX_QUANTITY {
        return Err("Stock level is too large");
    }
    Ok(())
}

/// Validate a price, which may be zero but never negative
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Unit Validations
// ============================================================================

/// Validate unit symbol format (1-16 chars, no whitespace)
pub fn validate_unit_symbol(symbol: &str) -> Result<(), &'static str> {
    if symbol.is_empty() {
        return Err("Unit symbol cannot be empty");
    }
    if symbol.chars().count() > 16 {
        return Err("Unit symbol must be at most 16 characters");
    }
    if symbol.chars().any(char::is_whitespace) {
        return Err("Unit symbol cannot contain whitespace");
    }
    Ok(())
}

/// Validate the conversion data carried by a unit
pub fn validate_unit_conversion(unit: &Unit) -> Result<(), &'static str> {
    if unit.converts_to_unit_id == Some(unit.id) {
        return Err("A unit cannot convert to itself");
    }
    match (&unit.conversion_group, unit.conversion_factor) {
        (Some(_), None) => return Err("A conversion group requires a conversion factor"),
        (None, Some(_)) => return Err("A conversion factor requires a conversion group"),
        (_, Some(factor)) if factor <= Decimal::ZERO => {
            return Err("Conversion factor must be positive")
        }
        _ => {}
    }
    match (unit.converts_to_unit_id, unit.converts_to_amount) {
        (Some(_), None) | (None, Some(_)) => {
            Err("Custom conversions need both a target unit and an amount")
        }
        (Some(_), Some(amount)) if amount <= Decimal::ZERO => {
            Err("Custom conversion amount must be positive")
        }
        _ => Ok(()),
    }
}

// ============================================================================
// Purchase Edits
// ============================================================================

/// Raised when a purchase edit would shrink a batch below what already left it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("initial quantity {requested} is below the {consumed} already consumed from this batch")]
pub struct PurchaseEditError {
    pub requested: Decimal,
    pub consumed: Decimal,
}

/// New remaining quantity after changing a batch's initial quantity
///
/// The amount already consumed (`old_initial - old_quantity`) is preserved.
pub fn rebase_batch_quantity(
    old_initial: Decimal,
    old_quantity: Decimal,
    new_initial: Decimal,
) -> Result<Decimal, PurchaseEditError> {
    let consumed = old_initial - old_quantity;
    let quantity = new_initial - consumed;
    if quantity < Decimal::ZERO {
        return Err(PurchaseEditError {
            requested: new_initial,
            consumed,
        });
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_positive_quantity() {
        assert!(validate_positive_quantity(dec("0.01")).is_ok());
        assert!(validate_positive_quantity(Decimal::ZERO).is_err());
        assert!(validate_positive_quantity(dec("-1")).is_err());
    }

    #[test]
    fn test_quantity_upper_bound() {
        assert_eq!(MAX_QUANTITY, dec("10000000000"));
        assert!(validate_positive_quantity(dec("9999999999.9999")).is_ok());
        assert!(validate_positive_quantity(MAX_QUANTITY).is_err());
        assert!(validate_positive_quantity(dec("100000000000000000000000000")).is_err());
        assert!(validate_stock_level(MAX_QUANTITY).is_err());
    }

    #[test]
    fn test_normalize_quantity() {
        assert_eq!(normalize_quantity(dec("1.23456")), Ok(dec("1.2346")));
        assert_eq!(normalize_quantity(dec("0.00005")), Ok(dec("0.0001")));
        assert!(normalize_quantity(dec("0.00001")).is_err());
        assert!(normalize_quantity(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_stock_level_allows_zero() {
        assert!(validate_stock_level(Decimal::ZERO).is_ok());
        assert!(validate_stock_level(dec("-0.5")).is_err());
    }

    #[test]
    fn test_unit_symbol() {
        assert!(validate_unit_symbol("kg").is_ok());
        assert!(validate_unit_symbol("").is_err());
        assert!(validate_unit_symbol("k g").is_err());
        assert!(validate_unit_symbol("abcdefghijklmnopq").is_err());
    }

    #[test]
    fn test_unit_self_conversion_rejected() {
        let mut roll = Unit::new("Roll", "roll");
        roll.converts_to_unit_id = Some(roll.id);
        roll.converts_to_amount = Some(dec("2"));
        assert_eq!(
            validate_unit_conversion(&roll),
            Err("A unit cannot convert to itself")
        );
    }

    #[test]
    fn test_unit_group_needs_factor() {
        let mut g = Unit::new("Gram", "g").in_group("mass", dec("1"));
        assert!(validate_unit_conversion(&g).is_ok());
        g.conversion_factor = None;
        assert!(validate_unit_conversion(&g).is_err());
    }

    #[test]
    fn test_custom_edge_needs_positive_amount() {
        let sheet = Unit::new("Sheet", "sheet");
        let roll = Unit::new("Roll", "roll").converting_to(&sheet, Decimal::ZERO);
        assert!(validate_unit_conversion(&roll).is_err());
    }

    #[test]
    fn test_rebase_batch_quantity() {
        // 10 bought, 4 left => 6 consumed
        assert_eq!(rebase_batch_quantity(dec("10"), dec("4"), dec("12")), Ok(dec("6")));
        assert_eq!(rebase_batch_quantity(dec("10"), dec("4"), dec("6")), Ok(Decimal::ZERO));
        let err = rebase_batch_quantity(dec("10"), dec("4"), dec("5")).unwrap_err();
        assert_eq!(err.consumed, dec("6"));
    }
}
