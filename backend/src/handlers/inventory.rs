//! HTTP handlers for product stock movements, adjustments and alerts

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::{PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{
    InventoryService, MovementQuery, ProductMovement, StockAdjustmentInput, StockAlert,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub store_id: Option<Uuid>,
}

/// List product stock movements
pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<MovementQuery>,
) -> AppResult<Json<PaginatedResponse<ProductMovement>>> {
    let limits = &state.config.inventory;
    let pagination = Pagination::from_query(
        query.page,
        query.per_page,
        limits.default_page_size,
        limits.max_page_size,
    );
    let service = InventoryService::new(state.db);
    let movements = service
        .list_movements(current_user.0.company_id, query, pagination)
        .await?;
    Ok(Json(movements))
}

/// Apply a manual stock adjustment
pub async fn create_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StockAdjustmentInput>,
) -> AppResult<impl IntoResponse> {
    let service = InventoryService::new(state.db);
    let result = service
        .adjust_stock(current_user.0.company_id, current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Low stock and out of stock alerts
pub async fn get_stock_alerts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AlertQuery>,
) -> AppResult<Json<Vec<StockAlert>>> {
    let service = InventoryService::new(state.db);
    let alerts = service
        .low_stock_alerts(current_user.0.company_id, query.store_id)
        .await?;
    Ok(Json(alerts))
}
