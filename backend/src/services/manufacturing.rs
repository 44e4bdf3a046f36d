//! Manufacturing service
//!
//! Turns ingredient stock into composite product stock. The availability
//! check is the pure projection from `shared`; manufacturing re-runs it
//! against locked ingredient rows and then writes every ledger entry and the
//! manufacturing record in a single transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    check_availability, validate_whole_units, AvailabilityReport, EntityKind, MovementType,
    ReferenceType,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{self, StockDelta};
use crate::services::recipe::{find_product, load_requirements, ProductSummary};
use crate::services::tenancy::TenantScope;
use crate::services::whole_units;

/// Manufacturing service
#[derive(Clone)]
pub struct ManufacturingService {
    db: PgPool,
}

/// Manufacturing record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ManufacturingRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub quantity_produced: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Manufacturing record with product details, for history listings
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ManufacturingHistoryEntry {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
    pub product_image_url: Option<String>,
    pub store_id: Uuid,
    pub quantity_produced: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub production_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: String,
    pub created_by: Option<Uuid>,
}

/// Input for a production run
#[derive(Debug, Deserialize, Validate)]
pub struct ManufactureInput {
    #[validate(custom = "whole_units")]
    pub quantity: Decimal,
    #[validate(length(max = 100, message = "Batch number is too long"))]
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Filters for manufacturing history
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub product_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Availability check for a composite product
#[derive(Debug, Clone, Serialize)]
pub struct ManufacturingAvailability {
    pub product_id: Uuid,
    pub product_name: String,
    #[serde(flatten)]
    pub report: AvailabilityReport,
}

/// Product stock before and after a production run
#[derive(Debug, Clone, Serialize)]
pub struct ProducedProduct {
    pub id: Uuid,
    pub name: String,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub quantity_produced: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngredientUsage {
    pub ingredient_id: Uuid,
    pub name: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
}

/// Result of a production run
#[derive(Debug, Clone, Serialize)]
pub struct ManufactureResult {
    pub manufacturing: ManufacturingRecord,
    pub product: ProducedProduct,
    pub ingredients_used: Vec<IngredientUsage>,
}

const MAX_HISTORY_LIMIT: i64 = 500;

fn batch_suffix(batch_number: Option<&str>) -> String {
    batch_number
        .map(|b| format!(" (Batch: {})", b))
        .unwrap_or_default()
}

fn ensure_composite(product: &ProductSummary) -> AppResult<()> {
    if product.is_composite {
        Ok(())
    } else {
        Err(AppError::validation(
            "product_id",
            "Product is not a composite product",
        ))
    }
}

impl ManufacturingService {
    /// Create a new ManufacturingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Check whether `quantity` units can be made. Read-only.
    pub async fn check_availability(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<ManufacturingAvailability> {
        validate_whole_units(quantity).map_err(|msg| AppError::validation("quantity", msg))?;

        let scope = TenantScope::load(&self.db, company_id).await?;
        let product = find_product(&self.db, &scope, product_id, false).await?;
        ensure_composite(&product)?;

        let requirements = load_requirements(&self.db, product_id, false).await?;

        Ok(ManufacturingAvailability {
            product_id,
            product_name: product.name,
            report: check_availability(&requirements, quantity),
        })
    }

    /// Produce `quantity` units: consume ingredients, credit the product and
    /// record the run. Nothing is written when any ingredient is short.
    pub async fn manufacture(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        product_id: Uuid,
        input: ManufactureInput,
    ) -> AppResult<ManufactureResult> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let scope = TenantScope::load(&mut *tx, company_id).await?;

        let product = find_product(&mut *tx, &scope, product_id, true).await?;
        ensure_composite(&product)?;

        let requirements = load_requirements(&mut *tx, product_id, true).await?;
        if requirements.is_empty() {
            return Err(AppError::validation(
                "product_id",
                "No recipe defined for this product",
            ));
        }

        let report = check_availability(&requirements, input.quantity);
        report.ensure_sufficient()?;

        let manufacturing = sqlx::query_as::<_, ManufacturingRecord>(
            r#"
            INSERT INTO product_manufacturing (
                product_id, store_id, quantity_produced, batch_number, expiry_date,
                notes, status, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'completed', $7)
            RETURNING id, product_id, store_id, quantity_produced, batch_number, expiry_date,
                      production_date, notes, status, created_by, created_at
            "#,
        )
        .bind(product_id)
        .bind(product.store_id)
        .bind(input.quantity)
        .bind(&input.batch_number)
        .bind(input.expiry_date)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let batch = batch_suffix(input.batch_number.as_deref());

        let mut ingredients_used = Vec::with_capacity(requirements.len());
        for requirement in &requirements {
            let needed = requirement.needed_for(input.quantity);
            let movement = ledger::apply_stock_delta(
                &mut *tx,
                &scope,
                user_id,
                StockDelta::new(
                    EntityKind::Ingredient,
                    requirement.ingredient_id,
                    -needed,
                    MovementType::Usage,
                    ReferenceType::Manufacturing,
                )
                .reference(manufacturing.id)
                .notes(format!(
                    "Used in manufacturing {} units of {}{}",
                    input.quantity, product.name, batch
                )),
            )
            .await?;

            ingredients_used.push(IngredientUsage {
                ingredient_id: requirement.ingredient_id,
                name: requirement.ingredient_name.clone(),
                quantity: movement.quantity,
                unit: requirement.unit.clone(),
                previous_stock: movement.previous_stock,
                new_stock: movement.new_stock,
            });
        }

        let product_movement = ledger::apply_stock_delta(
            &mut *tx,
            &scope,
            user_id,
            StockDelta::new(
                EntityKind::Product,
                product_id,
                input.quantity,
                MovementType::In,
                ReferenceType::Manufacturing,
            )
            .reference(manufacturing.id)
            .notes(format!("Manufactured {} units{}", input.quantity, batch)),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            product_id = %product_id,
            quantity = %input.quantity,
            manufacturing_id = %manufacturing.id,
            "Product manufactured"
        );

        Ok(ManufactureResult {
            manufacturing,
            product: ProducedProduct {
                id: product_id,
                name: product.name,
                previous_stock: product_movement.previous_stock,
                new_stock: product_movement.new_stock,
                quantity_produced: input.quantity,
            },
            ingredients_used,
        })
    }

    /// Past production runs, newest first
    pub async fn history(
        &self,
        company_id: Uuid,
        query: HistoryQuery,
        default_limit: i64,
    ) -> AppResult<Vec<ManufacturingHistoryEntry>> {
        let scope = TenantScope::load(&self.db, company_id).await?;
        let store_ids = scope.narrow(query.store_id)?;
        let limit = query.limit.unwrap_or(default_limit).clamp(1, MAX_HISTORY_LIMIT);

        let history = sqlx::query_as::<_, ManufacturingHistoryEntry>(
            r#"
            SELECT m.id, m.product_id, p.name AS product_name, p.sku AS product_sku,
                   p.image_url AS product_image_url, m.store_id, m.quantity_produced,
                   m.batch_number, m.expiry_date, m.production_date, m.notes, m.status,
                   m.created_by
            FROM product_manufacturing m
            LEFT JOIN products p ON p.id = m.product_id
            WHERE m.store_id = ANY($1)
              AND ($2::uuid IS NULL OR m.product_id = $2)
            ORDER BY m.production_date DESC
            LIMIT $3
            "#,
        )
        .bind(&store_ids)
        .bind(query.product_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(history)
    }
}
