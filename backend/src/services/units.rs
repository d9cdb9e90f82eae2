//! Unit management and store-backed unit conversion

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::{validate_unit_conversion, validate_unit_symbol, Conversion, Unit, UnitCatalog};

/// Unit service for unit definitions and conversions
#[derive(Clone)]
pub struct UnitService {
    db: PgPool,
}

/// Unit row
#[derive(Debug, Clone, FromRow)]
pub(crate) struct UnitRow {
    id: Uuid,
    name: String,
    symbol: String,
    conversion_group: Option<String>,
    conversion_factor: Option<Decimal>,
    converts_to_unit_id: Option<Uuid>,
    converts_to_amount: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<UnitRow> for Unit {
    fn from(row: UnitRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            symbol: row.symbol,
            conversion_group: row.conversion_group,
            conversion_factor: row.conversion_factor,
            converts_to_unit_id: row.converts_to_unit_id,
            converts_to_amount: row.converts_to_amount,
            created_at: row.created_at,
        }
    }
}

/// Input for creating or replacing a unit
#[derive(Debug, Deserialize, Validate)]
pub struct UnitInput {
    #[validate(length(min = 1, max = 64, message = "Name must be 1-64 characters"))]
    pub name: String,
    pub symbol: String,
    pub conversion_group: Option<String>,
    pub conversion_factor: Option<Decimal>,
    pub converts_to_unit_id: Option<Uuid>,
    pub converts_to_amount: Option<Decimal>,
}

/// Input for a conversion request
#[derive(Debug, Deserialize)]
pub struct ConvertInput {
    pub quantity: Decimal,
    pub from: String,
    pub to: String,
}

/// Result of a conversion request; `quantity` is null when not convertible
#[derive(Debug, Serialize)]
pub struct ConvertResult {
    pub quantity: Option<Decimal>,
    pub from: String,
    pub to: String,
}

const UNIT_COLUMNS: &str = "id, name, symbol, conversion_group, conversion_factor, \
                            converts_to_unit_id, converts_to_amount, created_at";

impl UnitService {
    /// Create a new UnitService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all units of a household
    pub async fn list_units(&self, household_id: Uuid) -> AppResult<Vec<Unit>> {
        let rows = sqlx::query_as::<_, UnitRow>(&format!(
            "SELECT {UNIT_COLUMNS} FROM units WHERE household_id = $1 ORDER BY conversion_group NULLS LAST, conversion_factor, symbol"
        ))
        .bind(household_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Unit::from).collect())
    }

    /// Load every unit of a household into a conversion catalog
    pub async fn load_catalog(&self, household_id: Uuid) -> AppResult<UnitCatalog> {
        Ok(UnitCatalog::new(self.list_units(household_id).await?))
    }

    /// Convert between two unit symbols, resolving the unit records first
    pub async fn convert_quantity_between_units(
        &self,
        household_id: Uuid,
        quantity: Decimal,
        from_symbol: &str,
        to_symbol: &str,
    ) -> AppResult<Conversion> {
        if from_symbol == to_symbol {
            return Ok(Conversion::Converted(quantity));
        }
        let rows = sqlx::query_as::<_, UnitRow>(&format!(
            "SELECT {UNIT_COLUMNS} FROM units WHERE household_id = $1 AND symbol IN ($2, $3)"
        ))
        .bind(household_id)
        .bind(from_symbol)
        .bind(to_symbol)
        .fetch_all(&self.db)
        .await?;

        let catalog = UnitCatalog::new(rows.into_iter().map(Unit::from));
        Ok(catalog.convert(quantity, from_symbol, to_symbol))
    }

    /// Conversion endpoint body
    pub async fn convert(&self, household_id: Uuid, input: ConvertInput) -> AppResult<ConvertResult> {
        let conversion = self
            .convert_quantity_between_units(household_id, input.quantity, &input.from, &input.to)
            .await?;
        Ok(ConvertResult {
            quantity: conversion.value(),
            from: input.from,
            to: input.to,
        })
    }

    /// Create a unit
    pub async fn create_unit(&self, household_id: Uuid, input: UnitInput) -> AppResult<Unit> {
        let id = Uuid::new_v4();
        self.validate_input(household_id, id, &input).await?;

        let row = sqlx::query_as::<_, UnitRow>(&format!(
            r#"
            INSERT INTO units (id, household_id, name, symbol, conversion_group, conversion_factor,
                               converts_to_unit_id, converts_to_amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {UNIT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(household_id)
        .bind(input.name.trim())
        .bind(input.symbol.trim())
        .bind(&input.conversion_group)
        .bind(input.conversion_factor)
        .bind(input.converts_to_unit_id)
        .bind(input.converts_to_amount)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Replace a unit's definition
    pub async fn update_unit(&self, household_id: Uuid, unit_id: Uuid, input: UnitInput) -> AppResult<Unit> {
        let existing = self.get_unit(household_id, unit_id).await?;
        self.validate_input(household_id, unit_id, &input).await?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, UnitRow>(&format!(
            r#"
            UPDATE units
            SET name = $1, symbol = $2, conversion_group = $3, conversion_factor = $4,
                converts_to_unit_id = $5, converts_to_amount = $6
            WHERE id = $7 AND household_id = $8
            RETURNING {UNIT_COLUMNS}
            "#
        ))
        .bind(input.name.trim())
        .bind(input.symbol.trim())
        .bind(&input.conversion_group)
        .bind(input.conversion_factor)
        .bind(input.converts_to_unit_id)
        .bind(input.converts_to_amount)
        .bind(unit_id)
        .bind(household_id)
        .fetch_one(&mut *tx)
        .await?;

        // Articles and ingredients reference units by symbol
        if existing.symbol != row.symbol {
            for statement in [
                "UPDATE articles SET default_unit = $1 WHERE household_id = $3 AND default_unit = $2",
                "UPDATE articles SET package_unit = $1 WHERE household_id = $3 AND package_unit = $2",
                "UPDATE recipe_ingredients ri SET unit = $1 FROM recipes r \
                 WHERE r.id = ri.recipe_id AND r.household_id = $3 AND ri.unit = $2",
            ] {
                sqlx::query(statement)
                    .bind(&row.symbol)
                    .bind(&existing.symbol)
                    .bind(household_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(row.into())
    }

    /// Delete a unit that nothing references
    pub async fn delete_unit(&self, household_id: Uuid, unit_id: Uuid) -> AppResult<()> {
        let unit = self.get_unit(household_id, unit_id).await?;

        let (articles, ingredients, edges) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM articles
                 WHERE household_id = $1 AND (default_unit = $2 OR package_unit = $2)),
                (SELECT COUNT(*) FROM recipe_ingredients ri JOIN recipes r ON r.id = ri.recipe_id
                 WHERE r.household_id = $1 AND ri.unit = $2),
                (SELECT COUNT(*) FROM units WHERE converts_to_unit_id = $3)
            "#,
        )
        .bind(household_id)
        .bind(&unit.symbol)
        .bind(unit_id)
        .fetch_one(&self.db)
        .await?;

        if articles > 0 {
            return Err(AppError::conflict(
                "articles",
                format!("Unit {} is still used by {} article(s)", unit.symbol, articles),
            ));
        }
        if ingredients > 0 {
            return Err(AppError::conflict(
                "recipe_ingredients",
                format!("Unit {} is still used by {} recipe ingredient(s)", unit.symbol, ingredients),
            ));
        }
        if edges > 0 {
            return Err(AppError::conflict(
                "units",
                format!("Unit {} is the target of {} custom conversion(s)", unit.symbol, edges),
            ));
        }

        sqlx::query("DELETE FROM units WHERE id = $1 AND household_id = $2")
            .bind(unit_id)
            .bind(household_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn get_unit(&self, household_id: Uuid, unit_id: Uuid) -> AppResult<Unit> {
        sqlx::query_as::<_, UnitRow>(&format!(
            "SELECT {UNIT_COLUMNS} FROM units WHERE id = $1 AND household_id = $2"
        ))
        .bind(unit_id)
        .bind(household_id)
        .fetch_optional(&self.db)
        .await?
        .map(Unit::from)
        .ok_or_else(|| AppError::NotFound("Unit".to_string()))
    }

    async fn validate_input(&self, household_id: Uuid, unit_id: Uuid, input: &UnitInput) -> AppResult<()> {
        input.validate()?;
        validate_unit_symbol(input.symbol.trim()).map_err(|e| AppError::validation("symbol", e))?;

        let candidate = Unit {
            id: unit_id,
            name: input.name.clone(),
            symbol: input.symbol.trim().to_string(),
            conversion_group: input.conversion_group.clone(),
            conversion_factor: input.conversion_factor,
            converts_to_unit_id: input.converts_to_unit_id,
            converts_to_amount: input.converts_to_amount,
            created_at: Utc::now(),
        };
        if candidate.converts_to_unit_id == Some(unit_id) {
            return Err(AppError::conflict("converts_to_unit_id", "A unit cannot convert to itself"));
        }
        validate_unit_conversion(&candidate).map_err(|e| AppError::validation("conversion", e))?;

        let duplicate = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM units WHERE household_id = $1 AND symbol = $2 AND id <> $3)",
        )
        .bind(household_id)
        .bind(&candidate.symbol)
        .bind(unit_id)
        .fetch_one(&self.db)
        .await?;

        if duplicate {
            return Err(AppError::conflict(
                "symbol",
                format!("A unit with symbol {} already exists", candidate.symbol),
            ));
        }

        if let Some(target) = input.converts_to_unit_id {
            let target_exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM units WHERE id = $1 AND household_id = $2)",
            )
            .bind(target)
            .bind(household_id)
            .fetch_one(&self.db)
            .await?;

            if !target_exists {
                return Err(AppError::NotFound("Target unit".to_string()));
            }
        }

        Ok(())
    }
}
