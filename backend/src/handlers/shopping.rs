//! HTTP handlers for shopping lists

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::shopping::{
    AddItemInput, GenerateListInput, ShoppingListService, UpdateItemInput,
};
use crate::AppState;
use shared::{ShoppingList, ShoppingListItem};

fn service(state: AppState) -> ShoppingListService {
    ShoppingListService::new(state.db, state.config.planning.clone())
}

/// Generate a shopping list from the meal plan, forecast and minimum stock
pub async fn generate_shopping_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<GenerateListInput>,
) -> AppResult<(StatusCode, Json<ShoppingList>)> {
    let list = service(state)
        .generate(current_user.0.household_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// Get the active shopping list
pub async fn get_active_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ShoppingList>> {
    service(state)
        .get_active(current_user.0.household_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Active shopping list".to_string()))
}

/// Get a shopping list
pub async fn get_shopping_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(list_id): Path<Uuid>,
) -> AppResult<Json<ShoppingList>> {
    let list = service(state)
        .get_list(current_user.0.household_id, list_id)
        .await?;
    Ok(Json(list))
}

/// Delete an uncompleted shopping list
pub async fn delete_shopping_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(list_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(state)
        .delete_list(current_user.0.household_id, list_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Complete a shopping list, stocking purchased items
pub async fn complete_shopping_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(list_id): Path<Uuid>,
) -> AppResult<Json<ShoppingList>> {
    let list = service(state)
        .complete_list(current_user.0.household_id, list_id)
        .await?;
    Ok(Json(list))
}

/// Add a manual item
pub async fn add_list_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(list_id): Path<Uuid>,
    Json(input): Json<AddItemInput>,
) -> AppResult<(StatusCode, Json<ShoppingListItem>)> {
    let item = service(state)
        .add_item(current_user.0.household_id, list_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Update an item
pub async fn update_list_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((list_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<ShoppingListItem>> {
    let item = service(state)
        .update_item(current_user.0.household_id, list_id, item_id, input)
        .await?;
    Ok(Json(item))
}

/// Remove an item
pub async fn delete_list_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((list_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    service(state)
        .delete_item(current_user.0.household_id, list_id, item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
