//! Batch and consumption history models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::ParseEnumError;

/// One purchase lot of an article
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: Uuid,
    pub article_id: Uuid,
    /// Remaining quantity in the article's canonical unit, never below zero
    pub quantity: Decimal,
    pub initial_quantity: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub expiry_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What caused a consumption log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumptionSource {
    Manual,
    Recipe,
    Expired,
    Waste,
    Correction,
}

impl ConsumptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumptionSource::Manual => "MANUAL",
            ConsumptionSource::Recipe => "RECIPE",
            ConsumptionSource::Expired => "EXPIRED",
            ConsumptionSource::Waste => "WASTE",
            ConsumptionSource::Correction => "CORRECTION",
        }
    }
}

impl FromStr for ConsumptionSource {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(ConsumptionSource::Manual),
            "RECIPE" => Ok(ConsumptionSource::Recipe),
            "EXPIRED" => Ok(ConsumptionSource::Expired),
            "WASTE" => Ok(ConsumptionSource::Waste),
            "CORRECTION" => Ok(ConsumptionSource::Correction),
            other => Err(ParseEnumError::new("consumption source", other)),
        }
    }
}

/// Whether a log entry removed stock or added it
///
/// Only stock corrections produce `Addition` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDirection {
    Consumption,
    Addition,
}

impl LogDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogDirection::Consumption => "consumption",
            LogDirection::Addition => "addition",
        }
    }
}

impl FromStr for LogDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consumption" => Ok(LogDirection::Consumption),
            "addition" => Ok(LogDirection::Addition),
            other => Err(ParseEnumError::new("log direction", other)),
        }
    }
}

/// Append-only record of stock leaving (or, for corrections, entering) an article
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionLog {
    pub id: Uuid,
    pub article_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub recipe_id: Option<Uuid>,
    /// Non-negative magnitude; see `direction`
    pub quantity: Decimal,
    pub direction: LogDirection,
    pub source: ConsumptionSource,
    pub consumed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl ConsumptionLog {
    /// Effect of this entry on the article's stock
    pub fn stock_delta(&self) -> Decimal {
        match self.direction {
            LogDirection::Consumption => -self.quantity,
            LogDirection::Addition => self.quantity,
        }
    }
}
