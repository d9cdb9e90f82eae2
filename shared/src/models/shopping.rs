//! Shopping list models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;

/// Why an item is on a shopping list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemReason {
    Recipe,
    LowStock,
    Forecast,
    Manual,
}

impl ItemReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemReason::Recipe => "RECIPE",
            ItemReason::LowStock => "LOW_STOCK",
            ItemReason::Forecast => "FORECAST",
            ItemReason::Manual => "MANUAL",
        }
    }
}

impl FromStr for ItemReason {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECIPE" => Ok(ItemReason::Recipe),
            "LOW_STOCK" => Ok(ItemReason::LowStock),
            "FORECAST" => Ok(ItemReason::Forecast),
            "MANUAL" => Ok(ItemReason::Manual),
            other => Err(ParseEnumError::new("item reason", other)),
        }
    }
}

/// One generation run of the shopping planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingList {
    pub id: Uuid,
    pub name: String,
    pub shop_date: DateTime<Utc>,
    pub plan_until_date: DateTime<Utc>,
    /// None while the list is active
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ShoppingListItem>,
    pub total_items: i64,
    pub purchased_items: i64,
    pub estimated_total: Decimal,
}

/// A shopping list line, linked to an article or carrying a custom name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingListItem {
    pub id: Uuid,
    pub list_id: Uuid,
    pub article_id: Option<Uuid>,
    pub custom_name: Option<String>,
    /// In the article's canonical unit, two decimals
    pub needed_quantity: Decimal,
    pub unit: Option<String>,
    /// At least 1
    pub recommended_packs: i32,
    /// None when there is no priced purchase history
    pub estimated_price: Option<Decimal>,
    pub is_purchased: bool,
    pub purchased_quantity: Option<Decimal>,
    pub actual_price: Option<Decimal>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<NaiveDate>,
    pub reason: ItemReason,
    pub notes: Option<String>,
}

impl ShoppingListItem {
    /// Quantity that enters stock when the list is completed
    pub fn stocked_quantity(&self) -> Decimal {
        self.purchased_quantity.unwrap_or(self.needed_quantity)
    }

    /// Price recorded on the new batch
    pub fn effective_price(&self) -> Option<Decimal> {
        self.actual_price.or(self.estimated_price)
    }
}

/// Totals over a list's items
///
/// `estimated_total` only counts purchased items, so a fresh list reports zero.
pub fn list_totals(items: &[ShoppingListItem]) -> (i64, i64, Decimal) {
    let total = items.len() as i64;
    let purchased: Vec<&ShoppingListItem> = items.iter().filter(|i| i.is_purchased).collect();
    let estimated_total = purchased
        .iter()
        .filter_map(|i| i.effective_price())
        .sum::<Decimal>();
    (
        total,
        purchased.len() as i64,
        crate::rounding::round_display(estimated_total),
    )
}
