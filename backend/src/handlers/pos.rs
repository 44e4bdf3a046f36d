//! HTTP handlers for the point of sale

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::pos::{AvailabilityQuery, CreateSaleInput, PosService, ProductAvailability};
use crate::AppState;

/// Can a product be sold in the requested quantity
pub async fn check_product_availability(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<ProductAvailability>> {
    let service = PosService::new(state.db);
    let availability = service
        .product_availability(
            current_user.0.company_id,
            query.product_id,
            query.quantity.unwrap_or(Decimal::ONE),
        )
        .await?;
    Ok(Json(availability))
}

/// Ring up a sale
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<impl IntoResponse> {
    let service = PosService::new(state.db);
    let sale = service
        .create_sale(current_user.0.company_id, current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}
