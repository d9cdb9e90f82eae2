//! WebAssembly module for the Household Pantry front end
//!
//! Provides client-side computation for:
//! - Unit conversion against the household's unit list
//! - Package rounding for shopping quantities
//! - Display rounding

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

use shared::{ceil_packs, Conversion, UnitCatalog};

fn to_decimal(value: f64, what: &str) -> Result<Decimal, JsValue> {
    Decimal::try_from(value).map_err(|_| JsValue::from_str(&format!("Invalid {}: {}", what, value)))
}

/// Convert a quantity between two unit symbols
///
/// `units_json` is the household's unit list. Returns `undefined` when the
/// units are not convertible.
#[wasm_bindgen]
pub fn convert_units(quantity: f64, from: &str, to: &str, units_json: &str) -> Result<Option<f64>, JsValue> {
    let units: Vec<Unit> = serde_json::from_str(units_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid units JSON: {}", e)))?;
    let quantity = to_decimal(quantity, "quantity")?;

    match UnitCatalog::new(units).convert(quantity, from, to) {
        Conversion::Converted(q) => Ok(shared::round_internal(q).to_f64()),
        Conversion::Unconvertible => Ok(None),
    }
}

/// Packages to buy for a need, always rounding up
#[wasm_bindgen]
pub fn recommended_packs(need: f64, package_size: f64) -> Result<i32, JsValue> {
    Ok(ceil_packs(to_decimal(need, "need")?, to_decimal(package_size, "package size")?))
}

/// Round to two decimals, halves away from zero
#[wasm_bindgen]
pub fn round_display(value: f64) -> Result<f64, JsValue> {
    let rounded = shared::round_display(to_decimal(value, "value")?);
    rounded
        .to_f64()
        .ok_or_else(|| JsValue::from_str("Value out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn units_json() -> String {
        let kg = Unit::new("Kilogram", "kg").in_group("mass", Decimal::from(1000));
        let g = Unit::new("Gram", "g").in_group("mass", Decimal::ONE);
        let roll = Unit::new("Roll", "roll");
        let sheet = Unit::new("Sheet", "sheet").converting_to(&roll, Decimal::from_str("0.02").unwrap());
        serde_json::to_string(&vec![kg, g, roll, sheet]).unwrap()
    }

    #[test]
    fn test_convert_units() {
        assert_eq!(convert_units(2.0, "kg", "g", &units_json()).unwrap(), Some(2000.0));
        assert_eq!(convert_units(2000.0, "g", "kg", &units_json()).unwrap(), Some(2.0));
        assert_eq!(convert_units(1.0, "kg", "roll", &units_json()).unwrap(), None);
    }

    #[test]
    fn test_convert_same_symbol_without_units() {
        assert_eq!(convert_units(3.5, "pcs", "pcs", "[]").unwrap(), Some(3.5));
    }

    #[test]
    fn test_recommended_packs() {
        assert_eq!(recommended_packs(1300.0, 1000.0).unwrap(), 2);
        assert_eq!(recommended_packs(1000.0, 1000.0).unwrap(), 1);
        assert_eq!(recommended_packs(5.0, 0.0).unwrap(), 1);
    }

    #[test]
    fn test_round_display() {
        assert_eq!(round_display(1.125).unwrap(), 1.13);
        assert_eq!(round_display(2.344).unwrap(), 2.34);
    }
}
