//! Measurement unit models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named measurement unit
///
/// Units in the same `conversion_group` convert linearly through their
/// `conversion_factor` (the unit's amount in the group's base unit, base = 1).
/// A unit may additionally carry one custom edge to another unit, e.g.
/// `roll -> sheet` with `converts_to_amount = 50`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    /// Unique per household
    pub symbol: String,
    pub conversion_group: Option<String>,
    pub conversion_factor: Option<Decimal>,
    pub converts_to_unit_id: Option<Uuid>,
    pub converts_to_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Unit {
    /// Build a bare unit without any conversion data
    pub fn new(name: &str, symbol: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            conversion_group: None,
            conversion_factor: None,
            converts_to_unit_id: None,
            converts_to_amount: None,
            created_at: Utc::now(),
        }
    }

    /// Place the unit in a linear conversion group
    pub fn in_group(mut self, group: &str, factor: Decimal) -> Self {
        self.conversion_group = Some(group.to_string());
        self.conversion_factor = Some(factor);
        self
    }

    /// Add a one-hop custom conversion edge to `target`
    pub fn converting_to(mut self, target: &Unit, amount: Decimal) -> Self {
        self.converts_to_unit_id = Some(target.id);
        self.converts_to_amount = Some(amount);
        self
    }

    /// Group factor, only when both group and factor are set
    pub fn group_factor(&self) -> Option<(&str, Decimal)> {
        match (&self.conversion_group, self.conversion_factor) {
            (Some(group), Some(factor)) if !factor.is_zero() => Some((group.as_str(), factor)),
            _ => None,
        }
    }
}
