//! Batch consumption engine and stock correction
//!
//! Every flow that takes stock out of inventory (manual consumption, recipe
//! cooking, stock correction) goes through [`consume_fifo`], which locks the
//! article's batches and drains them in FIFO order inside the caller's
//! transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::inventory::{fetch_article, lock_batches, BatchRow, ConsumptionLogRow, BATCH_COLUMNS, LOG_COLUMNS};
use super::units::UnitService;
use crate::error::{AppError, AppResult};
use shared::fifo::{plan_correction, plan_fifo, take_from_batch, Correction, FifoPlan};
use shared::{
    normalize_quantity, validate_positive_quantity, validate_stock_level, Article, Batch,
    ConsumptionLog, ConsumptionSource, Conversion, LogDirection,
};

/// Consumption service for taking stock out of batches
#[derive(Clone)]
pub struct ConsumptionService {
    db: PgPool,
}

/// Input for consuming from an article
#[derive(Debug, Deserialize)]
pub struct ConsumeInput {
    pub quantity: Decimal,
    /// Unit of `quantity`; the article's canonical unit when absent
    pub unit: Option<String>,
    pub source: Option<ConsumptionSource>,
    pub notes: Option<String>,
}

/// Result of a FIFO consumption; `consumed + remaining` equals the request
#[derive(Debug, Clone, Serialize)]
pub struct ConsumptionOutcome {
    pub consumed: Decimal,
    /// Shortfall when stock ran out
    pub remaining: Decimal,
    pub logs: Vec<ConsumptionLog>,
}

/// Quantity conversion applied before consuming
#[derive(Debug, Clone, Serialize)]
pub struct AppliedConversion {
    pub original_quantity: Decimal,
    pub original_unit: String,
    pub quantity: Decimal,
    pub unit: String,
}

/// Result of consuming from one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchConsumption {
    pub batch: Batch,
    pub log: ConsumptionLog,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<AppliedConversion>,
}

/// Input for a stock correction
#[derive(Debug, Deserialize)]
pub struct CorrectStockInput {
    pub actual_stock: Decimal,
    pub notes: Option<String>,
}

/// Result of a stock correction
#[derive(Debug, Clone, Serialize)]
pub struct StockCorrection {
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub difference: Decimal,
    pub logs: Vec<ConsumptionLog>,
}

/// Log entry to append
pub(crate) struct NewLog<'a> {
    pub household_id: Uuid,
    pub article_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub recipe_id: Option<Uuid>,
    pub quantity: Decimal,
    pub direction: LogDirection,
    pub source: ConsumptionSource,
    pub notes: Option<&'a str>,
}

/// Append a consumption log entry
pub(crate) async fn insert_log(conn: &mut PgConnection, log: NewLog<'_>) -> AppResult<ConsumptionLog> {
    let row = sqlx::query_as::<_, ConsumptionLogRow>(&format!(
        r#"
        INSERT INTO consumption_logs (household_id, article_id, batch_id, recipe_id, quantity,
                                      direction, source, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {LOG_COLUMNS}
        "#
    ))
    .bind(log.household_id)
    .bind(log.article_id)
    .bind(log.batch_id)
    .bind(log.recipe_id)
    .bind(log.quantity)
    .bind(log.direction.as_str())
    .bind(log.source.as_str())
    .bind(log.notes)
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}

/// Decrement a batch, refusing to go below zero
async fn decrement_batch(conn: &mut PgConnection, batch_id: Uuid, take: Decimal) -> AppResult<Batch> {
    sqlx::query_as::<_, BatchRow>(&format!(
        r#"
        UPDATE batches
        SET quantity = quantity - $2
        WHERE id = $1 AND quantity >= $2
        RETURNING {BATCH_COLUMNS}
        "#
    ))
    .bind(batch_id)
    .bind(take)
    .fetch_optional(&mut *conn)
    .await?
    .map(Batch::from)
    .ok_or_else(|| AppError::conflict("batch", format!("Batch {} no longer holds {}", batch_id, take)))
}

/// Consume `quantity` of an article FIFO inside the caller's transaction
///
/// Short stock is not an error: the shortfall is reported in `remaining`.
pub(crate) async fn consume_fifo(
    conn: &mut PgConnection,
    household_id: Uuid,
    article_id: Uuid,
    quantity: Decimal,
    source: ConsumptionSource,
    recipe_id: Option<Uuid>,
    notes: Option<&str>,
) -> AppResult<ConsumptionOutcome> {
    let batches = lock_batches(conn, article_id).await?;
    let plan = plan_fifo(&batches, quantity);
    let logs = apply_fifo_plan(conn, household_id, article_id, &plan, source, recipe_id, notes).await?;

    if !plan.is_complete() {
        tracing::debug!(
            article_id = %article_id,
            requested = %quantity,
            remaining = %plan.remaining,
            "Stock ran out during consumption"
        );
    }

    Ok(ConsumptionOutcome {
        consumed: plan.consumed,
        remaining: plan.remaining,
        logs,
    })
}

/// Decrement every batch of a plan made against locked batches, one log each
async fn apply_fifo_plan(
    conn: &mut PgConnection,
    household_id: Uuid,
    article_id: Uuid,
    plan: &FifoPlan,
    source: ConsumptionSource,
    recipe_id: Option<Uuid>,
    notes: Option<&str>,
) -> AppResult<Vec<ConsumptionLog>> {
    let mut logs = Vec::with_capacity(plan.allocations.len());
    for allocation in &plan.allocations {
        decrement_batch(conn, allocation.batch_id, allocation.take).await?;
        let log = insert_log(
            conn,
            NewLog {
                household_id,
                article_id,
                batch_id: Some(allocation.batch_id),
                recipe_id,
                quantity: allocation.take,
                direction: LogDirection::Consumption,
                source,
                notes,
            },
        )
        .await?;
        logs.push(log);
    }
    Ok(logs)
}

/// Normalize a caller-supplied quantity into the article's canonical unit
///
/// The result is rounded to stored precision. An unconvertible unit is
/// rejected outright.
async fn to_canonical(
    units: &UnitService,
    household_id: Uuid,
    article: &Article,
    quantity: Decimal,
    unit: Option<&str>,
) -> AppResult<(Decimal, Option<AppliedConversion>)> {
    let Some(unit) = unit.filter(|u| *u != article.default_unit) else {
        let quantity = normalize_quantity(quantity).map_err(|e| AppError::validation("quantity", e))?;
        return Ok((quantity, None));
    };

    match units
        .convert_quantity_between_units(household_id, quantity, unit, &article.default_unit)
        .await?
    {
        Conversion::Converted(converted) => {
            let converted =
                normalize_quantity(converted).map_err(|e| AppError::validation("quantity", e))?;
            Ok((
                converted,
                Some(AppliedConversion {
                    original_quantity: quantity,
                    original_unit: unit.to_string(),
                    quantity: converted,
                    unit: article.default_unit.clone(),
                }),
            ))
        }
        Conversion::Unconvertible => Err(AppError::UnconvertibleUnits {
            from: unit.to_string(),
            to: article.default_unit.clone(),
        }),
    }
}

fn caller_source(source: Option<ConsumptionSource>) -> AppResult<ConsumptionSource> {
    match source.unwrap_or(ConsumptionSource::Manual) {
        ConsumptionSource::Correction => Err(AppError::validation(
            "source",
            "CORRECTION entries are only written by stock corrections",
        )),
        source => Ok(source),
    }
}

impl ConsumptionService {
    /// Create a new ConsumptionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Consume from an article's batches in FIFO order
    pub async fn consume_from_article(
        &self,
        household_id: Uuid,
        article_id: Uuid,
        input: ConsumeInput,
    ) -> AppResult<ConsumptionOutcome> {
        validate_positive_quantity(input.quantity).map_err(|e| AppError::validation("quantity", e))?;
        let source = caller_source(input.source)?;

        let mut tx = self.db.begin().await?;

        let article = fetch_article(&mut tx, household_id, article_id).await?;
        let units = UnitService::new(self.db.clone());
        let (quantity, _) =
            to_canonical(&units, household_id, &article, input.quantity, input.unit.as_deref()).await?;

        let outcome = consume_fifo(
            &mut tx,
            household_id,
            article_id,
            quantity,
            source,
            None,
            input.notes.as_deref(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            article_id = %article_id,
            consumed = %outcome.consumed,
            remaining = %outcome.remaining,
            source = source.as_str(),
            "Consumed from article"
        );

        Ok(outcome)
    }

    /// Consume from one specific batch; fails when the batch holds too little
    pub async fn consume_from_batch(
        &self,
        household_id: Uuid,
        batch_id: Uuid,
        input: ConsumeInput,
    ) -> AppResult<BatchConsumption> {
        validate_positive_quantity(input.quantity).map_err(|e| AppError::validation("quantity", e))?;
        let source = caller_source(input.source)?;

        let mut tx = self.db.begin().await?;

        let batch: Batch = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {BATCH_COLUMNS} FROM batches WHERE id = $1 AND household_id = $2 FOR UPDATE"
        ))
        .bind(batch_id)
        .bind(household_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Batch::from)
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        let article = fetch_article(&mut tx, household_id, batch.article_id).await?;
        let units = UnitService::new(self.db.clone());
        let (quantity, conversion) =
            to_canonical(&units, household_id, &article, input.quantity, input.unit.as_deref()).await?;

        let allocation = take_from_batch(&batch, quantity).map_err(|e| AppError::InsufficientStock {
            article: article.name.clone(),
            requested: e.requested,
            available: e.available,
        })?;

        let batch = decrement_batch(&mut tx, batch_id, allocation.take).await?;
        let log = insert_log(
            &mut tx,
            NewLog {
                household_id,
                article_id: article.id,
                batch_id: Some(batch_id),
                recipe_id: None,
                quantity: allocation.take,
                direction: LogDirection::Consumption,
                source,
                notes: input.notes.as_deref(),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            batch_id = %batch_id,
            consumed = %allocation.take,
            left = %batch.quantity,
            "Consumed from batch"
        );

        Ok(BatchConsumption {
            batch,
            log,
            conversion,
        })
    }

    /// Reconcile declared stock with computed stock
    pub async fn correct_stock(
        &self,
        household_id: Uuid,
        article_id: Uuid,
        input: CorrectStockInput,
    ) -> AppResult<StockCorrection> {
        validate_stock_level(input.actual_stock).map_err(|e| AppError::validation("actual_stock", e))?;

        let mut tx = self.db.begin().await?;

        let article = fetch_article(&mut tx, household_id, article_id).await?;
        let batches = lock_batches(&mut tx, article_id).await?;
        let plan = plan_correction(&batches, input.actual_stock);
        let notes = input.notes.as_deref();

        let logs = match &plan.correction {
            Correction::Add(surplus) => {
                let batch_id = sqlx::query_scalar::<_, Uuid>(
                    r#"
                    INSERT INTO batches (household_id, article_id, quantity, initial_quantity, purchase_date, notes)
                    VALUES ($1, $2, $3, $3, $4, $5)
                    RETURNING id
                    "#,
                )
                .bind(household_id)
                .bind(article_id)
                .bind(*surplus)
                .bind(Utc::now())
                .bind(notes.unwrap_or("Stock correction"))
                .fetch_one(&mut *tx)
                .await?;

                let log = insert_log(
                    &mut tx,
                    NewLog {
                        household_id,
                        article_id,
                        batch_id: Some(batch_id),
                        recipe_id: None,
                        quantity: *surplus,
                        direction: LogDirection::Addition,
                        source: ConsumptionSource::Correction,
                        notes,
                    },
                )
                .await?;
                vec![log]
            }
            Correction::Consume(fifo) => {
                let source = ConsumptionSource::Correction;
                apply_fifo_plan(&mut tx, household_id, article_id, fifo, source, None, notes).await?
            }
            Correction::Unchanged => Vec::new(),
        };
        let (previous_stock, new_stock, difference) = (plan.previous_stock, plan.new_stock(), plan.difference);

        tx.commit().await?;

        if !difference.is_zero() {
            tracing::info!(
                article = %article.name,
                previous_stock = %previous_stock,
                new_stock = %new_stock,
                difference = %difference,
                "Stock corrected"
            );
        }

        Ok(StockCorrection {
            previous_stock,
            new_stock,
            difference,
            logs,
        })
    }
}
