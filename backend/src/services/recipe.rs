//! Recipe service
//!
//! Reads and replaces product recipes, and resolves a composite product's
//! recipe into [`RecipeRequirement`]s joined with live ingredient stock.
//! Manufacturing and the POS reuse [`load_requirements`] and [`find_product`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    check_availability, recipe_unit_cost, validate_positive_quantity, validate_recipe_line,
    IngredientAvailability, RecipeRequirement,
};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::tenancy::TenantScope;

/// Recipe service
#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
}

/// Stock-relevant view of a product
#[derive(Debug, Clone, FromRow)]
pub struct ProductSummary {
    pub name: String,
    pub store_id: Uuid,
    pub is_composite: bool,
    pub stock_quantity: Decimal,
}

/// Recipe line with ingredient details
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeLine {
    pub id: Uuid,
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    pub ingredient_sku: Option<String>,
    pub quantity_needed: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
    pub stock_quantity: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A product's full recipe
#[derive(Debug, Clone, Serialize)]
pub struct ProductRecipe {
    pub product_id: Uuid,
    pub is_composite: bool,
    pub recipe: Vec<RecipeLine>,
    /// Ingredient cost of one unit, 4 decimal places
    pub total_cost: Decimal,
}

/// One line of a recipe being saved
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeLineInput {
    pub ingredient_id: Uuid,
    pub quantity_needed: Decimal,
    pub unit: String,
    pub notes: Option<String>,
}

/// Replacement recipe; an empty list clears it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRecipeInput {
    #[serde(default)]
    pub ingredients: Vec<RecipeLineInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedRecipe {
    pub product_id: Uuid,
    pub is_composite: bool,
    pub recipe_cost: Decimal,
    pub ingredient_count: usize,
}

/// Availability of a product as seen from its recipe
#[derive(Debug, Clone, Serialize)]
pub struct RecipeAvailability {
    pub product_id: Uuid,
    pub can_make: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<i64>,
    pub requested_quantity: Decimal,
    pub availability: Vec<IngredientAvailability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, FromRow)]
struct RequirementRow {
    ingredient_id: Uuid,
    ingredient_name: String,
    quantity_needed: Decimal,
    available: Decimal,
    unit: Option<String>,
}

impl From<RequirementRow> for RecipeRequirement {
    fn from(row: RequirementRow) -> Self {
        RecipeRequirement {
            ingredient_id: row.ingredient_id,
            ingredient_name: row.ingredient_name,
            quantity_needed: row.quantity_needed,
            available: row.available,
            unit: row.unit,
        }
    }
}

/// Look up a product inside the tenant's stores
pub async fn find_product<'e, E>(
    executor: E,
    scope: &TenantScope,
    product_id: Uuid,
    lock: bool,
) -> AppResult<ProductSummary>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"
        SELECT name, store_id, is_composite, COALESCE(stock_quantity, 0) AS stock_quantity
        FROM products
        WHERE id = $1 AND store_id = ANY($2)
        {}
        "#,
        if lock { "FOR UPDATE" } else { "" }
    );

    sqlx::query_as::<_, ProductSummary>(&sql)
        .bind(product_id)
        .bind(scope.store_ids())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Resolve a product's recipe against current ingredient stock.
///
/// With `lock` the ingredient rows stay locked until the caller's transaction
/// ends. Rows are locked in ingredient id order.
pub async fn load_requirements<'e, E>(
    executor: E,
    product_id: Uuid,
    lock: bool,
) -> AppResult<Vec<RecipeRequirement>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"
        SELECT r.ingredient_id, i.name AS ingredient_name, r.quantity_needed,
               COALESCE(i.stock_quantity, 0) AS available,
               COALESCE(r.unit, i.unit) AS unit
        FROM product_recipes r
        JOIN ingredients i ON i.id = r.ingredient_id
        WHERE r.product_id = $1
        ORDER BY r.ingredient_id
        {}
        "#,
        if lock { "FOR UPDATE OF i" } else { "" }
    );

    let rows = sqlx::query_as::<_, RequirementRow>(&sql)
        .bind(product_id)
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Lock every ingredient used by the given products' recipes, in ingredient id order
pub async fn lock_recipe_ingredients<'e, E>(executor: E, product_ids: &[Uuid]) -> AppResult<()>
where
    E: PgExecutor<'e>,
{
    if product_ids.is_empty() {
        return Ok(());
    }

    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT i.id
        FROM ingredients i
        WHERE i.id IN (SELECT ingredient_id FROM product_recipes WHERE product_id = ANY($1))
        ORDER BY i.id
        FOR UPDATE
        "#,
    )
    .bind(product_ids)
    .fetch_all(executor)
    .await?;

    Ok(())
}

/// Field-level checks on a recipe before anything is written
fn validate_recipe_input(input: &SaveRecipeInput) -> AppResult<()> {
    let mut seen = HashSet::new();
    for (index, line) in input.ingredients.iter().enumerate() {
        validate_recipe_line(line.quantity_needed, &line.unit)
            .map_err(|msg| AppError::validation(&format!("ingredients[{}]", index), msg))?;
        if !seen.insert(line.ingredient_id) {
            return Err(AppError::validation(
                &format!("ingredients[{}].ingredient_id", index),
                "Ingredient appears more than once in the recipe",
            ));
        }
    }
    Ok(())
}

impl RecipeService {
    /// Create a new RecipeService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a product's recipe with its total unit cost
    pub async fn get_recipe(&self, company_id: Uuid, product_id: Uuid) -> AppResult<ProductRecipe> {
        let scope = TenantScope::load(&self.db, company_id).await?;
        let product = find_product(&self.db, &scope, product_id, false).await?;

        let recipe = sqlx::query_as::<_, RecipeLine>(
            r#"
            SELECT r.id, r.ingredient_id, i.name AS ingredient_name, i.sku AS ingredient_sku,
                   r.quantity_needed, r.unit, COALESCE(i.unit_cost, 0) AS unit_cost,
                   COALESCE(i.stock_quantity, 0) AS stock_quantity, r.notes, r.created_at
            FROM product_recipes r
            JOIN ingredients i ON i.id = r.ingredient_id
            WHERE r.product_id = $1
            ORDER BY r.created_at, r.id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        let total_cost = recipe_unit_cost(recipe.iter().map(|l| (l.quantity_needed, l.unit_cost)));

        Ok(ProductRecipe {
            product_id,
            is_composite: product.is_composite,
            recipe,
            total_cost,
        })
    }

    /// Replace a product's recipe. A non-empty recipe makes the product composite.
    pub async fn save_recipe(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        input: SaveRecipeInput,
    ) -> AppResult<SavedRecipe> {
        validate_recipe_input(&input)?;

        let mut tx = self.db.begin().await?;
        let scope = TenantScope::load(&mut *tx, company_id).await?;
        find_product(&mut *tx, &scope, product_id, true).await?;

        let ingredient_ids: Vec<Uuid> = input.ingredients.iter().map(|l| l.ingredient_id).collect();
        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM ingredients WHERE id = ANY($1) AND store_id = ANY($2)",
        )
        .bind(&ingredient_ids)
        .bind(scope.store_ids())
        .fetch_one(&mut *tx)
        .await?;
        if usize::try_from(owned).unwrap_or(0) != ingredient_ids.len() {
            return Err(AppError::NotFound("Ingredient".to_string()));
        }

        sqlx::query("DELETE FROM product_recipes WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        for line in &input.ingredients {
            sqlx::query(
                r#"
                INSERT INTO product_recipes (product_id, ingredient_id, quantity_needed, unit, notes)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(product_id)
            .bind(line.ingredient_id)
            .bind(line.quantity_needed)
            .bind(line.unit.trim())
            .bind(&line.notes)
            .execute(&mut *tx)
            .await?;
        }

        let costs = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT r.quantity_needed, COALESCE(i.unit_cost, 0)
            FROM product_recipes r
            JOIN ingredients i ON i.id = r.ingredient_id
            WHERE r.product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?;
        let recipe_cost = recipe_unit_cost(costs);
        let is_composite = !input.ingredients.is_empty();

        sqlx::query(
            r#"
            UPDATE products
            SET is_composite = $1, recipe_cost = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(is_composite)
        .bind(recipe_cost)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            product_id = %product_id,
            ingredients = input.ingredients.len(),
            %recipe_cost,
            "Recipe saved"
        );

        Ok(SavedRecipe {
            product_id,
            is_composite,
            recipe_cost,
            ingredient_count: input.ingredients.len(),
        })
    }

    /// Can `quantity` units be made from current ingredient stock
    pub async fn recipe_availability(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<RecipeAvailability> {
        validate_positive_quantity(quantity).map_err(|msg| AppError::validation("quantity", msg))?;

        let scope = TenantScope::load(&self.db, company_id).await?;
        let product = find_product(&self.db, &scope, product_id, false).await?;

        if !product.is_composite {
            return Ok(RecipeAvailability {
                product_id,
                can_make: true,
                max_quantity: None,
                requested_quantity: quantity,
                availability: Vec::new(),
                message: Some("Product is not a composite product".to_string()),
            });
        }

        let requirements = load_requirements(&self.db, product_id, false).await?;
        if requirements.is_empty() {
            return Ok(RecipeAvailability {
                product_id,
                can_make: false,
                max_quantity: Some(0),
                requested_quantity: quantity,
                availability: Vec::new(),
                message: Some("No recipe defined for this product".to_string()),
            });
        }

        let report = check_availability(&requirements, quantity);
        Ok(RecipeAvailability {
            product_id,
            can_make: report.can_manufacture,
            max_quantity: Some(report.max_quantity),
            requested_quantity: quantity,
            availability: report.availability,
            message: None,
        })
    }
}
