//! Inventory service: product movement history, manual adjustments, low stock
//! alerts and direct ingredient stock updates

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    ingredient_update_delta, AdjustmentDirection, EntityKind, MovementType, PaginatedResponse,
    Pagination, ReferenceType,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{self, StockDelta, StockMovement};
use crate::services::positive_quantity;
use crate::services::tenancy::TenantScope;

/// Inventory service for stock movements and alerts
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Product movement joined with the product it belongs to
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
    pub store_id: Uuid,
    pub movement_type: String,
    pub quantity: Decimal,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Ingredient movement joined with the ingredient it belongs to
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IngredientMovement {
    pub id: Uuid,
    pub ingredient_id: Uuid,
    pub ingredient_name: Option<String>,
    pub unit: Option<String>,
    pub store_id: Uuid,
    pub movement_type: String,
    pub quantity: Decimal,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Filters for product movement listing
#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub store_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub movement_type: Option<String>,
    pub reference_type: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Filters for ingredient movement listing
#[derive(Debug, Default, Deserialize)]
pub struct IngredientMovementQuery {
    pub store_id: Option<Uuid>,
    pub ingredient_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Input for a manual stock adjustment
#[derive(Debug, Deserialize, Validate)]
pub struct StockAdjustmentInput {
    pub product_id: Uuid,
    pub adjustment_type: AdjustmentDirection,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate(length(max = 500, message = "Reason is too long"))]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl StockAdjustmentInput {
    /// Stored movement note; falls back to a description of the adjustment
    fn movement_notes(&self) -> String {
        match self.notes.as_deref().map(str::trim) {
            Some(notes) if !notes.is_empty() => notes.to_string(),
            _ => format!(
                "{} by {} - {}",
                self.adjustment_type.as_str(),
                self.quantity,
                self.reason.as_deref().unwrap_or("Manual adjustment")
            ),
        }
    }
}

/// Result of a manual stock adjustment
#[derive(Debug, Clone, Serialize)]
pub struct StockAdjustmentResult {
    pub product_id: Uuid,
    pub product_name: String,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub movement: StockMovement,
}

/// Input for a direct ingredient stock update
#[derive(Debug, Deserialize, Validate)]
pub struct IngredientStockInput {
    pub movement_type: String,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    pub notes: Option<String>,
}

/// Result of an ingredient stock update
#[derive(Debug, Clone, Serialize)]
pub struct IngredientStockResult {
    pub ingredient_id: Uuid,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub movement: StockMovement,
}

/// Low stock alert kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// Stock alert for one product
#[derive(Debug, Clone, Serialize)]
pub struct StockAlert {
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub category_name: Option<String>,
    pub stock_quantity: Decimal,
    pub min_stock_level: Option<Decimal>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Row for alert query
#[derive(Debug, FromRow)]
struct AlertRow {
    id: Uuid,
    store_id: Uuid,
    name: String,
    sku: Option<String>,
    category_name: Option<String>,
    stock_quantity: Decimal,
    min_stock_level: Option<Decimal>,
}

impl AlertRow {
    /// Out of stock wins over low stock; rows above their minimum yield nothing
    fn into_alert(self) -> Option<StockAlert> {
        let (alert_type, severity, message) = if self.stock_quantity <= Decimal::ZERO {
            (
                AlertType::OutOfStock,
                AlertSeverity::Critical,
                "Product is out of stock".to_string(),
            )
        } else {
            let min = self.min_stock_level?;
            if self.stock_quantity > min {
                return None;
            }
            (
                AlertType::LowStock,
                AlertSeverity::Warning,
                format!(
                    "Only {} units left (Min: {})",
                    self.stock_quantity.normalize(),
                    min.normalize()
                ),
            )
        };

        Some(StockAlert {
            product_id: self.id,
            store_id: self.store_id,
            name: self.name,
            sku: self.sku,
            category_name: self.category_name,
            stock_quantity: self.stock_quantity,
            min_stock_level: self.min_stock_level,
            alert_type,
            severity,
            message,
        })
    }
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List product movements, newest first
    pub async fn list_movements(
        &self,
        company_id: Uuid,
        query: MovementQuery,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<ProductMovement>> {
        let scope = TenantScope::load(&self.db, company_id).await?;
        let store_ids = scope.narrow(query.store_id)?;

        let movement_type = parse_filter(
            "movement_type",
            query.movement_type.as_deref(),
            MovementType::from_str,
        )?
        .map(|t| t.as_str());
        let reference_type = parse_filter(
            "reference_type",
            query.reference_type.as_deref(),
            ReferenceType::from_str,
        )?
        .map(|t| t.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM inventory_movements m
            WHERE m.store_id = ANY($1)
              AND ($2::uuid IS NULL OR m.product_id = $2)
              AND ($3::text IS NULL OR m.movement_type = $3)
              AND ($4::text IS NULL OR m.reference_type = $4)
            "#,
        )
        .bind(&store_ids)
        .bind(query.product_id)
        .bind(movement_type)
        .bind(reference_type)
        .fetch_one(&self.db)
        .await?;

        let movements = sqlx::query_as::<_, ProductMovement>(
            r#"
            SELECT m.id, m.product_id, p.name AS product_name, p.sku AS product_sku,
                   m.store_id, m.movement_type, m.quantity, m.previous_stock, m.new_stock,
                   m.reference_type, m.reference_id, m.notes, m.created_by, m.created_at
            FROM inventory_movements m
            LEFT JOIN products p ON p.id = m.product_id
            WHERE m.store_id = ANY($1)
              AND ($2::uuid IS NULL OR m.product_id = $2)
              AND ($3::text IS NULL OR m.movement_type = $3)
              AND ($4::text IS NULL OR m.reference_type = $4)
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(&store_ids)
        .bind(query.product_id)
        .bind(movement_type)
        .bind(reference_type)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            movements,
            pagination,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    /// Apply an operator-initiated stock correction to a product.
    /// Decreases never take stock below zero.
    pub async fn adjust_stock(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        input: StockAdjustmentInput,
    ) -> AppResult<StockAdjustmentResult> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let scope = TenantScope::load(&mut *tx, company_id).await?;

        let product_name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM products WHERE id = $1 AND store_id = ANY($2)",
        )
        .bind(input.product_id)
        .bind(scope.store_ids())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let delta = StockDelta::new(
            EntityKind::Product,
            input.product_id,
            input.adjustment_type.signed(input.quantity),
            MovementType::Adjustment,
            ReferenceType::ManualAdjustment,
        )
        .policy(input.adjustment_type.policy())
        .notes(input.movement_notes());

        let movement = ledger::apply_stock_delta(&mut *tx, &scope, user_id, delta).await?;

        tx.commit().await?;

        tracing::info!(
            product_id = %input.product_id,
            from = %movement.previous_stock,
            to = %movement.new_stock,
            "Stock adjustment completed"
        );

        Ok(StockAdjustmentResult {
            product_id: input.product_id,
            product_name,
            previous_stock: movement.previous_stock,
            new_stock: movement.new_stock,
            movement,
        })
    }

    /// Active products at or below their minimum level, and those out of stock
    pub async fn low_stock_alerts(
        &self,
        company_id: Uuid,
        store_id: Option<Uuid>,
    ) -> AppResult<Vec<StockAlert>> {
        let scope = TenantScope::load(&self.db, company_id).await?;
        let store_ids = scope.narrow(store_id)?;

        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT p.id, p.store_id, p.name, p.sku, c.name AS category_name,
                   COALESCE(p.stock_quantity, 0) AS stock_quantity, p.min_stock_level
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE p.store_id = ANY($1)
              AND p.is_active = TRUE
              AND p.is_composite = FALSE
              AND (COALESCE(p.stock_quantity, 0) = 0
                   OR (p.min_stock_level IS NOT NULL
                       AND COALESCE(p.stock_quantity, 0) <= p.min_stock_level))
            ORDER BY COALESCE(p.stock_quantity, 0) ASC, p.name ASC
            "#,
        )
        .bind(&store_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().filter_map(AlertRow::into_alert).collect())
    }

    /// List ingredient movements, newest first
    pub async fn list_ingredient_movements(
        &self,
        company_id: Uuid,
        query: IngredientMovementQuery,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<IngredientMovement>> {
        let scope = TenantScope::load(&self.db, company_id).await?;
        let store_ids = scope.narrow(query.store_id)?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM ingredient_movements m
            WHERE m.store_id = ANY($1)
              AND ($2::uuid IS NULL OR m.ingredient_id = $2)
            "#,
        )
        .bind(&store_ids)
        .bind(query.ingredient_id)
        .fetch_one(&self.db)
        .await?;

        let movements = sqlx::query_as::<_, IngredientMovement>(
            r#"
            SELECT m.id, m.ingredient_id, i.name AS ingredient_name, i.unit,
                   m.store_id, m.movement_type, m.quantity, m.previous_stock, m.new_stock,
                   m.unit_cost, m.reference_type, m.reference_id, m.notes,
                   m.created_by, m.created_at
            FROM ingredient_movements m
            LEFT JOIN ingredients i ON i.id = m.ingredient_id
            WHERE m.store_id = ANY($1)
              AND ($2::uuid IS NULL OR m.ingredient_id = $2)
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&store_ids)
        .bind(query.ingredient_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            movements,
            pagination,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    /// Receive, consume or correct ingredient stock directly
    pub async fn update_ingredient_stock(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        ingredient_id: Uuid,
        input: IngredientStockInput,
    ) -> AppResult<IngredientStockResult> {
        input.validate()?;

        let delta = MovementType::from_str(&input.movement_type)
            .and_then(|t| ingredient_update_delta(t, input.quantity).map(|d| (t, d)));
        let (movement_type, delta) = delta.ok_or_else(|| {
            AppError::validation("movement_type", "movement_type must be one of: in, out, adjustment")
        })?;

        let mut tx = self.db.begin().await?;
        let scope = TenantScope::load(&mut *tx, company_id).await?;

        let mut entry = StockDelta::new(
            EntityKind::Ingredient,
            ingredient_id,
            delta,
            movement_type,
            ReferenceType::ManualAdjustment,
        );
        if let Some(notes) = input.notes {
            entry = entry.notes(notes);
        }

        let movement = ledger::apply_stock_delta(&mut *tx, &scope, user_id, entry).await?;

        tx.commit().await?;

        Ok(IngredientStockResult {
            ingredient_id,
            previous_stock: movement.previous_stock,
            new_stock: movement.new_stock,
            movement,
        })
    }
}

/// Parse an optional enum-valued query filter
fn parse_filter<T>(
    field: &str,
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
) -> AppResult<Option<T>> {
    match value.filter(|v| !v.is_empty()) {
        Some(v) => parse(v)
            .map(Some)
            .ok_or_else(|| AppError::validation(field, format!("Unknown {} '{}'", field, v))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert_row(stock: i64, min: Option<i64>) -> AlertRow {
        AlertRow {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            name: "Croissant".to_string(),
            sku: Some("CRS-01".to_string()),
            category_name: None,
            stock_quantity: Decimal::from(stock),
            min_stock_level: min.map(Decimal::from),
        }
    }

    #[test]
    fn test_alert_classification() {
        let out = alert_row(0, Some(5)).into_alert().unwrap();
        assert_eq!(out.alert_type, AlertType::OutOfStock);
        assert_eq!(out.severity, AlertSeverity::Critical);

        let low = alert_row(3, Some(5)).into_alert().unwrap();
        assert_eq!(low.alert_type, AlertType::LowStock);
        assert_eq!(low.message, "Only 3 units left (Min: 5)");

        assert!(alert_row(8, Some(5)).into_alert().is_none());
        assert!(alert_row(8, None).into_alert().is_none());
    }

    #[test]
    fn test_adjustment_notes_fallback() {
        let input = StockAdjustmentInput {
            product_id: Uuid::new_v4(),
            adjustment_type: AdjustmentDirection::Decrease,
            quantity: Decimal::from(4),
            reason: Some("Damaged".to_string()),
            notes: None,
        };
        assert_eq!(input.movement_notes(), "decrease by 4 - Damaged");

        let input = StockAdjustmentInput {
            notes: Some("Counted shelf".to_string()),
            ..input
        };
        assert_eq!(input.movement_notes(), "Counted shelf");
    }

    #[test]
    fn test_adjustment_rejects_zero_quantity() {
        let input = StockAdjustmentInput {
            product_id: Uuid::new_v4(),
            adjustment_type: AdjustmentDirection::Increase,
            quantity: Decimal::ZERO,
            reason: None,
            notes: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("movement_type", Some("usage"), MovementType::from_str).unwrap(),
            Some(MovementType::Usage)
        );
        assert_eq!(
            parse_filter("movement_type", None, MovementType::from_str).unwrap(),
            None
        );
        assert!(parse_filter("movement_type", Some("teleport"), MovementType::from_str).is_err());
    }

    mod db {
        use super::*;
        use crate::services::test_support::*;

        fn adjustment(product_id: Uuid, direction: AdjustmentDirection, quantity: &str) -> StockAdjustmentInput {
            StockAdjustmentInput {
                product_id,
                adjustment_type: direction,
                quantity: dec(quantity),
                reason: Some("Recount".to_string()),
                notes: None,
            }
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn test_sub_scale_adjustment_writes_nothing(pool: PgPool) {
            let company_id = company(&pool, "Deli").await;
            let main = store(&pool, company_id, "Main").await;
            let olives = product(&pool, main, "Olives", None, "10").await;
            let service = InventoryService::new(pool.clone());

            let result = service
                .adjust_stock(
                    company_id,
                    Uuid::new_v4(),
                    adjustment(olives, AdjustmentDirection::Decrease, "0.00005"),
                )
                .await;
            assert!(matches!(result, Err(AppError::Validation { .. })));
            assert_eq!(product_stock(&pool, olives).await, dec("10"));
            assert_eq!(
                count(&pool, "SELECT COUNT(*) FROM inventory_movements WHERE product_id = $1", olives).await,
                0
            );

            let done = service
                .adjust_stock(
                    company_id,
                    Uuid::new_v4(),
                    adjustment(olives, AdjustmentDirection::Decrease, "0.0005"),
                )
                .await
                .unwrap();
            assert_eq!(done.new_stock, dec("9.9995"));
            assert_eq!(done.movement.quantity, dec("0.0005"));
            assert_eq!(product_stock(&pool, olives).await, dec("9.9995"));
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn test_adjusting_foreign_product_is_not_found(pool: PgPool) {
            let owner = company(&pool, "Deli").await;
            let main = store(&pool, owner, "Main").await;
            let olives = product(&pool, main, "Olives", None, "10").await;

            let other = company(&pool, "Rival").await;
            store(&pool, other, "Rival Main").await;

            let result = InventoryService::new(pool.clone())
                .adjust_stock(
                    other,
                    Uuid::new_v4(),
                    adjustment(olives, AdjustmentDirection::Increase, "5"),
                )
                .await;
            assert!(matches!(result, Err(AppError::NotFound(_))));
            assert_eq!(product_stock(&pool, olives).await, dec("10"));
        }
    }
}

