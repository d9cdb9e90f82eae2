//! HTTP handlers for recipes

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::recipes::{CookInput, CookResult, RecipeService};
use crate::AppState;
use shared::Recipe;

/// Get a recipe with its ingredients
pub async fn get_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<Json<Recipe>> {
    let service = RecipeService::new(state.db);
    let recipe = service
        .get_recipe(current_user.0.household_id, recipe_id)
        .await?;
    Ok(Json(recipe))
}

/// Cook a recipe; an unsatisfiable recipe answers 200 with `success: false`
pub async fn cook_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(recipe_id): Path<Uuid>,
    input: Option<Json<CookInput>>,
) -> AppResult<Json<CookResult>> {
    let service = RecipeService::new(state.db);
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let result = service
        .cook_recipe(current_user.0.household_id, recipe_id, input)
        .await?;
    Ok(Json(result))
}
