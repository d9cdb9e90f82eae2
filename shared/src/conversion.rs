//! Unit conversion
//!
//! Converts quantities between units sharing a linear conversion group or
//! linked by a single custom edge. Anything else is reported as
//! [`Conversion::Unconvertible`]; there is no multi-hop resolution and no
//! crossing between groups. A result outside the `Decimal` range is
//! unconvertible as well.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::Unit;

/// Outcome of a unit conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "quantity", rename_all = "snake_case")]
pub enum Conversion {
    Converted(Decimal),
    Unconvertible,
}

impl Conversion {
    pub fn value(self) -> Option<Decimal> {
        match self {
            Conversion::Converted(q) => Some(q),
            Conversion::Unconvertible => None,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Conversion::Converted(_))
    }
}

impl From<Option<Decimal>> for Conversion {
    fn from(value: Option<Decimal>) -> Self {
        value.map_or(Conversion::Unconvertible, Conversion::Converted)
    }
}

/// Convert `quantity` from one unit to another
pub fn convert(quantity: Decimal, from: &Unit, to: &Unit) -> Conversion {
    if from.symbol == to.symbol {
        return Conversion::Converted(quantity);
    }

    if let (Some((from_group, from_factor)), Some((to_group, to_factor))) =
        (from.group_factor(), to.group_factor())
    {
        if from_group == to_group {
            return quantity
                .checked_mul(from_factor)
                .and_then(|base| base.checked_div(to_factor))
                .into();
        }
    }

    if from.converts_to_unit_id == Some(to.id) {
        if let Some(amount) = from.converts_to_amount {
            return quantity.checked_mul(amount).into();
        }
    }

    if to.converts_to_unit_id == Some(from.id) {
        if let Some(amount) = to.converts_to_amount {
            return quantity.checked_div(amount).into();
        }
    }

    Conversion::Unconvertible
}

/// In-memory set of unit definitions addressed by symbol
#[derive(Debug, Clone, Default)]
pub struct UnitCatalog {
    by_symbol: HashMap<String, Unit>,
}

impl UnitCatalog {
    pub fn new(units: impl IntoIterator<Item = Unit>) -> Self {
        let mut catalog = Self::default();
        for unit in units {
            catalog.by_symbol.insert(unit.symbol.clone(), unit);
        }
        catalog
    }

    pub fn get(&self, symbol: &str) -> Option<&Unit> {
        self.by_symbol.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Convert between two unit symbols
    ///
    /// Identical symbols convert even when no unit record exists for them.
    pub fn convert(&self, quantity: Decimal, from: &str, to: &str) -> Conversion {
        if from == to {
            return Conversion::Converted(quantity);
        }
        match (self.get(from), self.get(to)) {
            (Some(from), Some(to)) => convert(quantity, from, to),
            _ => Conversion::Unconvertible,
        }
    }
}
