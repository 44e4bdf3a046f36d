//! HTTP handlers for ingredient stock

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{
    IngredientMovement, IngredientMovementQuery, IngredientStockInput, IngredientStockResult,
    InventoryService,
};
use crate::AppState;

/// List ingredient stock movements
pub async fn list_ingredient_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<IngredientMovementQuery>,
) -> AppResult<Json<PaginatedResponse<IngredientMovement>>> {
    let limits = &state.config.inventory;
    let pagination = Pagination::from_query(
        query.page,
        query.per_page,
        limits.default_page_size,
        limits.max_page_size,
    );
    let service = InventoryService::new(state.db);
    let movements = service
        .list_ingredient_movements(current_user.0.company_id, query, pagination)
        .await?;
    Ok(Json(movements))
}

/// Receive, consume or correct an ingredient's stock
pub async fn update_ingredient_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(ingredient_id): Path<Uuid>,
    Json(input): Json<IngredientStockInput>,
) -> AppResult<Json<IngredientStockResult>> {
    let service = InventoryService::new(state.db);
    let result = service
        .update_ingredient_stock(
            current_user.0.company_id,
            current_user.0.user_id,
            ingredient_id,
            input,
        )
        .await?;
    Ok(Json(result))
}
