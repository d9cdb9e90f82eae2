//! HTTP handlers for unit definitions and conversion

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::units::{ConvertInput, ConvertResult, UnitInput, UnitService};
use crate::AppState;
use shared::Unit;

/// List the household's units
pub async fn list_units(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Unit>>> {
    let service = UnitService::new(state.db);
    let units = service.list_units(current_user.0.household_id).await?;
    Ok(Json(units))
}

/// Create a unit
pub async fn create_unit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UnitInput>,
) -> AppResult<(StatusCode, Json<Unit>)> {
    let service = UnitService::new(state.db);
    let unit = service.create_unit(current_user.0.household_id, input).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

/// Replace a unit definition
pub async fn update_unit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(unit_id): Path<Uuid>,
    Json(input): Json<UnitInput>,
) -> AppResult<Json<Unit>> {
    let service = UnitService::new(state.db);
    let unit = service
        .update_unit(current_user.0.household_id, unit_id, input)
        .await?;
    Ok(Json(unit))
}

/// Delete an unused unit
pub async fn delete_unit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(unit_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = UnitService::new(state.db);
    service.delete_unit(current_user.0.household_id, unit_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Convert a quantity between two unit symbols
pub async fn convert_units(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ConvertInput>,
) -> AppResult<Json<ConvertResult>> {
    let service = UnitService::new(state.db);
    let result = service.convert(current_user.0.household_id, input).await?;
    Ok(Json(result))
}
