//! Point-of-sale service: sellability checks and sale fulfilment
//!
//! Simple products are sold from their own stock. Composite products never
//! carry sellable stock of their own at the register; selling one consumes
//! its recipe's ingredients instead.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    check_availability, validate_positive_quantity, EntityKind, MovementType, ReferenceType,
    Shortage,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{self, StockDelta, StockMovement};
use crate::services::recipe::{find_product, load_requirements, lock_recipe_ingredients};
use crate::services::tenancy::TenantScope;
use crate::services::{epoch_millis, positive_quantity, random_code};

/// POS service
#[derive(Clone)]
pub struct PosService {
    db: PgPool,
}

/// How a product's availability is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    Simple,
    Composite,
}

/// Can a product be sold in the requested quantity
#[derive(Debug, Clone, Serialize)]
pub struct ProductAvailability {
    pub product_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProductKind,
    pub available: bool,
    pub requested_quantity: Decimal,
    /// Own stock of a simple product
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<Decimal>,
    /// Units a composite product's ingredients could still make
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub insufficient_ingredients: Vec<Shortage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Query for a sellability check
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub product_id: Uuid,
    pub quantity: Option<Decimal>,
}

/// One line of a sale
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaleItemInput {
    pub product_id: Uuid,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
}

impl SaleItemInput {
    fn total_price(&self) -> Decimal {
        self.unit_price * self.quantity - self.discount_amount
    }
}

/// Input for ringing up a sale
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaleInput {
    pub store_id: Uuid,
    #[validate]
    pub items: Vec<SaleItemInput>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
}

/// Sale header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub company_id: Uuid,
    pub store_id: Uuid,
    pub receipt_number: String,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub items_count: Decimal,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Sale line
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SaleItem {
    pub id: Uuid,
    pub sales_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
}

/// Completed sale with every stock movement it caused
#[derive(Debug, Clone, Serialize)]
pub struct SaleResult {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub product_movements: Vec<StockMovement>,
    pub ingredient_movements: Vec<StockMovement>,
}

/// `RCP-<epoch millis>-<9 uppercase alphanumerics>`
pub fn generate_receipt_number() -> String {
    format!("RCP-{}-{}", epoch_millis(), random_code(9))
}

impl PosService {
    /// Create a new PosService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Simple products compare their own stock; composite products go
    /// through the recipe availability projection.
    pub async fn product_availability(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<ProductAvailability> {
        validate_positive_quantity(quantity).map_err(|msg| AppError::validation("quantity", msg))?;

        let scope = TenantScope::load(&self.db, company_id).await?;
        let product = find_product(&self.db, &scope, product_id, false).await?;

        if !product.is_composite {
            return Ok(ProductAvailability {
                product_id,
                name: product.name,
                kind: ProductKind::Simple,
                available: product.stock_quantity >= quantity,
                requested_quantity: quantity,
                stock_quantity: Some(product.stock_quantity),
                max_quantity: None,
                insufficient_ingredients: Vec::new(),
                message: None,
            });
        }

        let requirements = load_requirements(&self.db, product_id, false).await?;
        if requirements.is_empty() {
            return Ok(ProductAvailability {
                product_id,
                name: product.name,
                kind: ProductKind::Composite,
                available: false,
                requested_quantity: quantity,
                stock_quantity: None,
                max_quantity: Some(0),
                insufficient_ingredients: Vec::new(),
                message: Some("No recipe defined".to_string()),
            });
        }

        let report = check_availability(&requirements, quantity);
        Ok(ProductAvailability {
            product_id,
            name: product.name,
            kind: ProductKind::Composite,
            available: report.can_manufacture,
            requested_quantity: quantity,
            stock_quantity: None,
            max_quantity: Some(report.max_quantity),
            insufficient_ingredients: report.shortages(),
            message: None,
        })
    }

    /// Record a sale and take its stock out of the ledger, atomically
    pub async fn create_sale(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        input: CreateSaleInput,
    ) -> AppResult<SaleResult> {
        if input.items.is_empty() {
            return Err(AppError::validation("items", "A sale needs at least one item"));
        }
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let scope = TenantScope::load(&mut *tx, company_id).await?;
        scope.ensure_store(input.store_id)?;

        let receipt_number = generate_receipt_number();
        let subtotal: Decimal = input.items.iter().map(SaleItemInput::total_price).sum();
        let total_amount = (subtotal - input.discount_amount).max(Decimal::ZERO);
        let items_count: Decimal = input.items.iter().map(|i| i.quantity).sum();

        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (
                company_id, store_id, receipt_number, subtotal, discount_amount, total_amount,
                payment_method, items_count, customer_name, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, company_id, store_id, receipt_number, subtotal, discount_amount,
                      total_amount, payment_method, items_count, customer_name, notes,
                      created_by, created_at
            "#,
        )
        .bind(company_id)
        .bind(input.store_id)
        .bind(&receipt_number)
        .bind(subtotal)
        .bind(input.discount_amount)
        .bind(total_amount)
        .bind(input.payment_method.as_deref().unwrap_or("cash"))
        .bind(items_count)
        .bind(&input.customer_name)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::unique_violation(e, "Receipt number"))?;

        // Lock order: products by id, then recipe ingredients by id
        let mut lines: Vec<&SaleItemInput> = input.items.iter().collect();
        lines.sort_by_key(|line| line.product_id);

        let mut products = HashMap::with_capacity(lines.len());
        for line in &lines {
            if products.contains_key(&line.product_id) {
                continue;
            }
            let product = find_product(&mut *tx, &scope, line.product_id, true).await?;
            if product.store_id != input.store_id {
                return Err(AppError::NotFound("Product".to_string()));
            }
            products.insert(line.product_id, product);
        }

        let composite_ids: Vec<Uuid> = products
            .iter()
            .filter(|(_, product)| product.is_composite)
            .map(|(id, _)| *id)
            .collect();
        lock_recipe_ingredients(&mut *tx, &composite_ids).await?;

        let mut items = Vec::with_capacity(lines.len());
        let mut product_movements = Vec::new();
        let mut ingredient_movements = Vec::new();
        let notes = format!("Sale {}", receipt_number);

        for line in lines {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

            let item = sqlx::query_as::<_, SaleItem>(
                r#"
                INSERT INTO sales_items (
                    sales_id, product_id, quantity, unit_price, discount_amount, total_price
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, sales_id, product_id, quantity, unit_price, discount_amount,
                          total_price
                "#,
            )
            .bind(sale.id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.discount_amount)
            .bind(line.total_price())
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);

            if !product.is_composite {
                let movement = ledger::apply_stock_delta(
                    &mut *tx,
                    &scope,
                    user_id,
                    StockDelta::new(
                        EntityKind::Product,
                        line.product_id,
                        -line.quantity,
                        MovementType::Out,
                        ReferenceType::Sale,
                    )
                    .reference(sale.id)
                    .notes(notes.clone()),
                )
                .await?;
                product_movements.push(movement);
                continue;
            }

            let requirements = load_requirements(&mut *tx, line.product_id, false).await?;
            if requirements.is_empty() {
                return Err(AppError::validation(
                    "items",
                    format!("No recipe defined for {}", product.name),
                ));
            }
            check_availability(&requirements, line.quantity).ensure_sufficient()?;

            for requirement in &requirements {
                let movement = ledger::apply_stock_delta(
                    &mut *tx,
                    &scope,
                    user_id,
                    StockDelta::new(
                        EntityKind::Ingredient,
                        requirement.ingredient_id,
                        -requirement.needed_for(line.quantity),
                        MovementType::Usage,
                        ReferenceType::Sale,
                    )
                    .reference(sale.id)
                    .notes(format!("{} - {}", notes, product.name)),
                )
                .await?;
                ingredient_movements.push(movement);
            }
        }

        tx.commit().await?;

        tracing::info!(%receipt_number, %total_amount, items = items.len(), "Sale completed");

        Ok(SaleResult {
            sale,
            items,
            product_movements,
            ingredient_movements,
        })
    }
}
