//! Recipe and meal plan models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;

/// A recipe with its ingredient list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    /// Servings the ingredient quantities are written for
    pub servings: Decimal,
    pub ingredients: Vec<RecipeIngredient>,
}

impl Recipe {
    /// Factor to apply to ingredient quantities when cooking `servings`
    pub fn scale_factor(&self, servings: Decimal) -> Decimal {
        if self.servings <= Decimal::ZERO {
            return servings;
        }
        servings / self.servings
    }
}

/// An ingredient line, matched either to a specific article or by category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub article_id: Option<Uuid>,
    pub category: Option<String>,
    /// Display name for lines that resolve to nothing
    pub name: Option<String>,
    pub quantity: Decimal,
    /// Unit symbol
    pub unit: String,
    pub optional: bool,
}

impl RecipeIngredient {
    /// Non-blank category match string
    pub fn category_key(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Human readable label
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.category_key().map(str::to_string))
            .unwrap_or_else(|| format!("ingredient {}", self.id))
    }
}

/// Meal slots of a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl FromStr for MealType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            other => Err(ParseEnumError::new("meal type", other)),
        }
    }
}

/// A scheduled recipe; several entries may share a date and meal type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealPlanEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub recipe_id: Uuid,
    pub servings: Decimal,
    /// None while pending
    pub completed_at: Option<DateTime<Utc>>,
}

impl MealPlanEntry {
    pub fn is_pending(&self) -> bool {
        self.completed_at.is_none()
    }
}
