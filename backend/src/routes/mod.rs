//! Route definitions for the POS inventory API

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes. Protected areas verify bearer tokens with the state's JWT secret.
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .nest("/inventory", inventory_routes(state.clone()))
        .nest("/ingredients", ingredient_routes(state.clone()))
        .nest("/transfers", transfer_routes(state.clone()))
        .nest("/manufacturing", manufacturing_routes(state.clone()))
        .nest("/recipes", recipe_routes(state.clone()))
        .nest("/pos", pos_routes(state))
}

/// Product stock routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/movements", get(handlers::list_movements))
        .route("/adjustments", post(handlers::create_adjustment))
        .route("/alerts", get(handlers::get_stock_alerts))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Ingredient stock routes (protected)
fn ingredient_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/movements", get(handlers::list_ingredient_movements))
        .route("/:ingredient_id/stock", post(handlers::update_ingredient_stock))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Inter-store transfer routes (protected)
fn transfer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers).post(handlers::create_transfer))
        .route("/:transfer_id", get(handlers::get_transfer))
        .route("/:transfer_id/approve", patch(handlers::approve_transfer))
        .route("/:transfer_id/reject", patch(handlers::reject_transfer))
        .route("/:transfer_id/complete", patch(handlers::complete_transfer))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Manufacturing routes (protected)
fn manufacturing_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/history", get(handlers::get_manufacturing_history))
        .route("/:product_id", post(handlers::manufacture_product))
        .route(
            "/:product_id/availability",
            get(handlers::check_manufacturing_availability),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Recipe routes (protected)
fn recipe_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/:product_id",
            get(handlers::get_recipe).put(handlers::save_recipe),
        )
        .route("/:product_id/availability", get(handlers::get_recipe_availability))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Point-of-sale routes (protected)
fn pos_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/availability", get(handlers::check_product_availability))
        .route("/sales", post(handlers::create_sale))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
