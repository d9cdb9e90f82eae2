//! HTTP handlers for stock, consumption and purchase corrections

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::consumption::{
    BatchConsumption, ConsumeInput, ConsumptionOutcome, ConsumptionService, CorrectStockInput,
    StockCorrection,
};
use crate::services::inventory::{InventoryService, UpdateLogInput, UpdatePurchaseInput};
use crate::AppState;
use shared::{ArticleStock, Batch, ConsumptionLog, Pagination};

/// Get an article's stock and unconsumed batches
pub async fn get_article_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(article_id): Path<Uuid>,
) -> AppResult<Json<ArticleStock>> {
    let service = InventoryService::new(state.db);
    let stock = service
        .get_article_stock(current_user.0.household_id, article_id)
        .await?;
    Ok(Json(stock))
}

/// Consume from an article in FIFO order
pub async fn consume_from_article(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(article_id): Path<Uuid>,
    Json(input): Json<ConsumeInput>,
) -> AppResult<Json<ConsumptionOutcome>> {
    let service = ConsumptionService::new(state.db);
    let outcome = service
        .consume_from_article(current_user.0.household_id, article_id, input)
        .await?;
    Ok(Json(outcome))
}

/// Consume from one batch
pub async fn consume_from_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<ConsumeInput>,
) -> AppResult<Json<BatchConsumption>> {
    let service = ConsumptionService::new(state.db);
    let result = service
        .consume_from_batch(current_user.0.household_id, batch_id, input)
        .await?;
    Ok(Json(result))
}

/// Correct an article's stock to a declared level
pub async fn correct_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(article_id): Path<Uuid>,
    Json(input): Json<CorrectStockInput>,
) -> AppResult<Json<StockCorrection>> {
    let service = ConsumptionService::new(state.db);
    let correction = service
        .correct_stock(current_user.0.household_id, article_id, input)
        .await?;
    Ok(Json(correction))
}

/// Correct a recorded purchase
pub async fn update_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseInput>,
) -> AppResult<Json<Batch>> {
    let service = InventoryService::new(state.db);
    let batch = service
        .update_purchase(current_user.0.household_id, batch_id, input)
        .await?;
    Ok(Json(batch))
}

/// Consumption history of an article, newest first
pub async fn list_consumption_logs(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(article_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<ConsumptionLog>>> {
    let service = InventoryService::new(state.db);
    let logs = service
        .list_consumption_logs(current_user.0.household_id, article_id, pagination)
        .await?;
    Ok(Json(logs))
}

/// Edit a consumption log entry
pub async fn update_consumption_log(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(log_id): Path<Uuid>,
    Json(input): Json<UpdateLogInput>,
) -> AppResult<Json<ConsumptionLog>> {
    let service = InventoryService::new(state.db);
    let log = service
        .update_consumption_log(current_user.0.household_id, log_id, input)
        .await?;
    Ok(Json(log))
}
