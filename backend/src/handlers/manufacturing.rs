//! HTTP handlers for manufacturing

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::manufacturing::{
    HistoryQuery, ManufactureInput, ManufactureResult, ManufacturingAvailability,
    ManufacturingHistoryEntry, ManufacturingService,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QuantityQuery {
    pub quantity: Option<Decimal>,
}

impl QuantityQuery {
    pub fn quantity_or_one(&self) -> Decimal {
        self.quantity.unwrap_or(Decimal::ONE)
    }
}

/// Check whether a composite product can be manufactured
pub async fn check_manufacturing_availability(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(query): Query<QuantityQuery>,
) -> AppResult<Json<ManufacturingAvailability>> {
    let service = ManufacturingService::new(state.db);
    let availability = service
        .check_availability(
            current_user.0.company_id,
            product_id,
            query.quantity_or_one(),
        )
        .await?;
    Ok(Json(availability))
}

/// Manufacture a composite product
pub async fn manufacture_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<ManufactureInput>,
) -> AppResult<Json<ManufactureResult>> {
    let service = ManufacturingService::new(state.db);
    let result = service
        .manufacture(
            current_user.0.company_id,
            current_user.0.user_id,
            product_id,
            input,
        )
        .await?;
    Ok(Json(result))
}

/// Manufacturing history
pub async fn get_manufacturing_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ManufacturingHistoryEntry>>> {
    let default_limit = state.config.inventory.history_limit;
    let service = ManufacturingService::new(state.db);
    let history = service
        .history(current_user.0.company_id, query, default_limit)
        .await?;
    Ok(Json(history))
}
