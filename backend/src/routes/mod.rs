//! Route definitions for the Household Pantry API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - units and conversion
        .nest("/units", unit_routes(state.clone()))
        // Protected routes - stock and consumption
        .nest("/articles", article_routes(state.clone()))
        .nest("/batches", batch_routes(state.clone()))
        .nest("/consumption-logs", consumption_log_routes(state.clone()))
        // Protected routes - recipes
        .nest("/recipes", recipe_routes(state.clone()))
        // Protected routes - shopping lists
        .nest("/shopping-lists", shopping_list_routes(state))
}

/// Unit routes (protected)
fn unit_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_units).post(handlers::create_unit))
        .route("/convert", post(handlers::convert_units))
        .route(
            "/:unit_id",
            put(handlers::update_unit).delete(handlers::delete_unit),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Article stock routes (protected)
fn article_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:article_id/stock", get(handlers::get_article_stock))
        .route("/:article_id/consume", post(handlers::consume_from_article))
        .route("/:article_id/correct-stock", post(handlers::correct_stock))
        .route("/:article_id/consumption-logs", get(handlers::list_consumption_logs))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Batch routes (protected)
fn batch_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:batch_id", put(handlers::update_purchase))
        .route("/:batch_id/consume", post(handlers::consume_from_batch))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Consumption history routes (protected)
fn consumption_log_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:log_id", put(handlers::update_consumption_log))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Recipe routes (protected)
fn recipe_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:recipe_id", get(handlers::get_recipe))
        .route("/:recipe_id/cook", post(handlers::cook_recipe))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Shopping list routes (protected)
fn shopping_list_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::generate_shopping_list))
        .route("/active", get(handlers::get_active_list))
        .route(
            "/:list_id",
            get(handlers::get_shopping_list).delete(handlers::delete_shopping_list),
        )
        .route("/:list_id/complete", post(handlers::complete_shopping_list))
        .route("/:list_id/items", post(handlers::add_list_item))
        .route(
            "/:list_id/items/:item_id",
            put(handlers::update_list_item).delete(handlers::delete_list_item),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
