//! HTTP handlers for product recipes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::manufacturing::QuantityQuery;
use crate::middleware::CurrentUser;
use crate::services::recipe::{
    ProductRecipe, RecipeAvailability, RecipeService, SaveRecipeInput, SavedRecipe,
};
use crate::AppState;

/// Get a product's recipe
pub async fn get_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductRecipe>> {
    let service = RecipeService::new(state.db);
    let recipe = service
        .get_recipe(current_user.0.company_id, product_id)
        .await?;
    Ok(Json(recipe))
}

/// Replace a product's recipe
pub async fn save_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<SaveRecipeInput>,
) -> AppResult<Json<SavedRecipe>> {
    let service = RecipeService::new(state.db);
    let saved = service
        .save_recipe(current_user.0.company_id, product_id, input)
        .await?;
    Ok(Json(saved))
}

/// Recipe availability for a quantity (default 1)
pub async fn get_recipe_availability(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(query): Query<QuantityQuery>,
) -> AppResult<Json<RecipeAvailability>> {
    let service = RecipeService::new(state.db);
    let availability = service
        .recipe_availability(
            current_user.0.company_id,
            product_id,
            query.quantity_or_one(),
        )
        .await?;
    Ok(Json(availability))
}
