//! Inventory queries and batch/history corrections

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{
    rebase_batch_quantity, validate_positive_quantity, validate_price, Article, ArticleSnapshot,
    ArticleStock, Batch, ConsumptionLog, NutritionFacts, Pagination,
};

/// Inventory service for stock levels, batches and consumption history
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

pub(crate) const ARTICLE_COLUMNS: &str = "a.id, a.name, a.default_unit, a.package_size, a.package_unit, \
     a.min_stock, a.default_expiry_days, a.nutrition, a.category, a.consumable, a.created_at, a.updated_at";

pub(crate) const BATCH_COLUMNS: &str = "id, article_id, quantity, initial_quantity, purchase_date, \
     expiry_date, purchase_price, notes, created_at";

pub(crate) const LOG_COLUMNS: &str =
    "id, article_id, batch_id, recipe_id, quantity, direction, source, consumed_at, notes";

/// Article row
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ArticleRow {
    id: Uuid,
    name: String,
    default_unit: String,
    package_size: Decimal,
    package_unit: Option<String>,
    min_stock: Option<Decimal>,
    default_expiry_days: Option<i32>,
    nutrition: Option<Json<NutritionFacts>>,
    category: Option<String>,
    consumable: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            default_unit: row.default_unit,
            package_size: row.package_size,
            package_unit: row.package_unit,
            min_stock: row.min_stock,
            default_expiry_days: row.default_expiry_days,
            nutrition: row.nutrition.map(|n| n.0),
            category: row.category,
            consumable: row.consumable,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Article row with its computed stock
#[derive(Debug, FromRow)]
struct ArticleStockRow {
    #[sqlx(flatten)]
    article: ArticleRow,
    current_stock: Decimal,
}

/// Batch row
#[derive(Debug, Clone, FromRow)]
pub(crate) struct BatchRow {
    id: Uuid,
    article_id: Uuid,
    quantity: Decimal,
    initial_quantity: Decimal,
    purchase_date: DateTime<Utc>,
    expiry_date: Option<NaiveDate>,
    purchase_price: Option<Decimal>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Self {
            id: row.id,
            article_id: row.article_id,
            quantity: row.quantity,
            initial_quantity: row.initial_quantity,
            purchase_date: row.purchase_date,
            expiry_date: row.expiry_date,
            purchase_price: row.purchase_price,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

/// Consumption log row; enums are stored as text
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ConsumptionLogRow {
    id: Uuid,
    article_id: Uuid,
    batch_id: Option<Uuid>,
    recipe_id: Option<Uuid>,
    quantity: Decimal,
    direction: String,
    source: String,
    consumed_at: DateTime<Utc>,
    notes: Option<String>,
}

impl TryFrom<ConsumptionLogRow> for ConsumptionLog {
    type Error = AppError;

    fn try_from(row: ConsumptionLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            article_id: row.article_id,
            batch_id: row.batch_id,
            recipe_id: row.recipe_id,
            quantity: row.quantity,
            direction: row.direction.parse()?,
            source: row.source.parse()?,
            consumed_at: row.consumed_at,
            notes: row.notes,
        })
    }
}

/// Input for correcting a recorded purchase
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePurchaseInput {
    pub initial_quantity: Option<Decimal>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    pub notes: Option<String>,
}

/// Input for editing a consumption log entry
#[derive(Debug, Default, Deserialize)]
pub struct UpdateLogInput {
    pub quantity: Option<Decimal>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Fetch one article of a household
pub(crate) async fn fetch_article(
    conn: &mut PgConnection,
    household_id: Uuid,
    article_id: Uuid,
) -> AppResult<Article> {
    sqlx::query_as::<_, ArticleRow>(&format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.id = $1 AND a.household_id = $2"
    ))
    .bind(article_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(Article::from)
    .ok_or_else(|| AppError::NotFound("Article".to_string()))
}

/// Unconsumed batches of an article in FIFO order, locked for the transaction
pub(crate) async fn lock_batches(conn: &mut PgConnection, article_id: Uuid) -> AppResult<Vec<Batch>> {
    let rows = sqlx::query_as::<_, BatchRow>(&format!(
        r#"
        SELECT {BATCH_COLUMNS}
        FROM batches
        WHERE article_id = $1 AND quantity > 0
        ORDER BY expiry_date ASC NULLS LAST, purchase_date ASC
        FOR UPDATE
        "#
    ))
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Batch::from).collect())
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get an article
    pub async fn get_article(&self, household_id: Uuid, article_id: Uuid) -> AppResult<Article> {
        let mut conn = self.db.acquire().await?;
        fetch_article(&mut conn, household_id, article_id).await
    }

    /// Stock, package metadata and unconsumed batches of an article
    pub async fn get_article_stock(&self, household_id: Uuid, article_id: Uuid) -> AppResult<ArticleStock> {
        let article = self.get_article(household_id, article_id).await?;

        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM batches
            WHERE article_id = $1 AND quantity > 0
            ORDER BY expiry_date ASC NULLS LAST, purchase_date ASC
            "#
        ))
        .bind(article_id)
        .fetch_all(&self.db)
        .await?;

        let batches: Vec<Batch> = rows.into_iter().map(Batch::from).collect();
        let current_stock = batches.iter().map(|b| b.quantity).sum();

        Ok(ArticleStock {
            article_id: article.id,
            package_unit: article.package_unit_symbol().to_string(),
            name: article.name,
            unit: article.default_unit,
            current_stock,
            package_size: article.package_size,
            min_stock: article.min_stock,
            batches,
        })
    }

    /// All articles of a household with their current stock
    pub async fn load_snapshots(&self, household_id: Uuid) -> AppResult<HashMap<Uuid, ArticleSnapshot>> {
        let rows = sqlx::query_as::<_, ArticleStockRow>(&format!(
            r#"
            SELECT {ARTICLE_COLUMNS}, COALESCE(s.stock, 0) AS current_stock
            FROM articles a
            LEFT JOIN (
                SELECT article_id, SUM(quantity) AS stock
                FROM batches
                WHERE household_id = $1 AND quantity > 0
                GROUP BY article_id
            ) s ON s.article_id = a.id
            WHERE a.household_id = $1
            ORDER BY a.name
            "#
        ))
        .bind(household_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let article = Article::from(row.article);
                (
                    article.id,
                    ArticleSnapshot {
                        article,
                        current_stock: row.current_stock,
                    },
                )
            })
            .collect())
    }

    /// Purchase prices of the latest priced batches, newest first
    pub async fn price_history(&self, article_id: Uuid, limit: i64) -> AppResult<Vec<Decimal>> {
        let prices = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT purchase_price
            FROM batches
            WHERE article_id = $1 AND purchase_price IS NOT NULL
            ORDER BY purchase_date DESC, created_at DESC
            LIMIT $2
            "#,
        )
        .bind(article_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(prices)
    }

    /// Correct a recorded purchase, keeping the already consumed amount
    pub async fn update_purchase(
        &self,
        household_id: Uuid,
        batch_id: Uuid,
        input: UpdatePurchaseInput,
    ) -> AppResult<Batch> {
        if let Some(initial) = input.initial_quantity {
            validate_positive_quantity(initial)
                .map_err(|e| AppError::validation("initial_quantity", e))?;
        }
        if let Some(price) = input.purchase_price {
            validate_price(price).map_err(|e| AppError::validation("purchase_price", e))?;
        }

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

        let (initial_quantity, quantity) = match input.initial_quantity {
            Some(new_initial) => {
                let quantity =
                    rebase_batch_quantity(batch.initial_quantity, batch.quantity, new_initial)
                        .map_err(|e| {
                            AppError::validation(
                                "initial_quantity",
                                format!(
                                    "{} has already been consumed from this batch; the initial quantity cannot be lower",
                                    e.consumed
                                ),
                            )
                        })?;
                (new_initial, quantity)
            }
            None => (batch.initial_quantity, batch.quantity),
        };

        let updated = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            UPDATE batches
            SET initial_quantity = $1, quantity = $2,
                purchase_date = COALESCE($3, purchase_date),
                expiry_date = COALESCE($4, expiry_date),
                purchase_price = COALESCE($5, purchase_price),
                notes = COALESCE($6, notes)
            WHERE id = $7
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(initial_quantity)
        .bind(quantity)
        .bind(input.purchase_date)
        .bind(input.expiry_date)
        .bind(input.purchase_price)
        .bind(&input.notes)
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            batch_id = %batch_id,
            initial_quantity = %initial_quantity,
            quantity = %quantity,
            "Purchase updated"
        );

        Ok(updated.into())
    }

    /// Consumption history of an article, newest first
    pub async fn list_consumption_logs(
        &self,
        household_id: Uuid,
        article_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<Vec<ConsumptionLog>> {
        // Validate article belongs to household
        self.get_article(household_id, article_id).await?;

        let rows = sqlx::query_as::<_, ConsumptionLogRow>(&format!(
            r#"
            SELECT {LOG_COLUMNS}
            FROM consumption_logs
            WHERE article_id = $1 AND household_id = $2
            ORDER BY consumed_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(article_id)
        .bind(household_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ConsumptionLog::try_from).collect()
    }

    /// Edit quantity, date or notes of one history entry
    ///
    /// History edits do not move stock.
    pub async fn update_consumption_log(
        &self,
        household_id: Uuid,
        log_id: Uuid,
        input: UpdateLogInput,
    ) -> AppResult<ConsumptionLog> {
        if let Some(quantity) = input.quantity {
            if quantity < Decimal::ZERO {
                return Err(AppError::validation("quantity", "Quantity cannot be negative"));
            }
        }

        let row = sqlx::query_as::<_, ConsumptionLogRow>(&format!(
            r#"
            UPDATE consumption_logs
            SET quantity = COALESCE($1, quantity),
                consumed_at = COALESCE($2, consumed_at),
                notes = COALESCE($3, notes)
            WHERE id = $4 AND household_id = $5
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(input.quantity)
        .bind(input.consumed_at)
        .bind(&input.notes)
        .bind(log_id)
        .bind(household_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumption log".to_string()))?;

        row.try_into()
    }
}
