//! Article (catalog) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Batch;

/// A trackable good in the household catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub name: String,
    /// Canonical unit symbol; all stock and demand numbers use it
    pub default_unit: String,
    /// Always > 0
    pub package_size: Decimal,
    /// Unit of `package_size`; the canonical unit when absent
    pub package_unit: Option<String>,
    pub min_stock: Option<Decimal>,
    pub default_expiry_days: Option<i32>,
    pub nutrition: Option<NutritionFacts>,
    /// Free-text category used for flexible ingredient matching
    pub category: Option<String>,
    pub consumable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Symbol of the unit the package size is expressed in
    pub fn package_unit_symbol(&self) -> &str {
        self.package_unit.as_deref().unwrap_or(&self.default_unit)
    }

    /// Whether this article matches a recipe ingredient category
    pub fn matches_category(&self, category: &str) -> bool {
        let wanted = category.trim();
        if wanted.is_empty() {
            return false;
        }
        self.category
            .as_deref()
            .map(|c| c.trim().eq_ignore_ascii_case(wanted))
            .unwrap_or(false)
            || self.name.trim().eq_ignore_ascii_case(wanted)
    }
}

/// Nutrition facts per 100 units of the canonical unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NutritionFacts {
    pub calories_kcal: Option<Decimal>,
    pub protein_g: Option<Decimal>,
    pub carbohydrates_g: Option<Decimal>,
    pub fat_g: Option<Decimal>,
}

/// Current stock of an article together with its package metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleStock {
    pub article_id: Uuid,
    pub name: String,
    pub unit: String,
    /// Sum of batch quantities with quantity > 0
    pub current_stock: Decimal,
    pub package_size: Decimal,
    pub package_unit: String,
    pub min_stock: Option<Decimal>,
    /// Unconsumed batches in FIFO order
    pub batches: Vec<Batch>,
}

/// Article paired with its computed stock, as fed into demand aggregation
#[derive(Debug, Clone)]
pub struct ArticleSnapshot {
    pub article: Article,
    pub current_stock: Decimal,
}
