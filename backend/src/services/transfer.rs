//! Inter-store transfer workflow
//!
//! pending -> approved -> completed, or pending -> rejected. Source stock is
//! checked at creation, approval and completion; nothing is reserved in
//! between. Completion moves the stock through the ledger in one transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    ensure_stock_covers, validate_transfer_stores, EntityKind, MovementType, ReferenceType,
    TransferAction, TransferStatus,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{self, StockDelta, StockMovement};
use crate::services::tenancy::TenantScope;
use crate::services::{epoch_millis, positive_quantity, random_code};

/// Transfer service
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

/// Transfer with store and product names resolved
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryTransfer {
    pub id: Uuid,
    pub company_id: Uuid,
    pub transfer_number: String,
    pub from_store_id: Uuid,
    pub from_store_name: Option<String>,
    pub to_store_id: Uuid,
    pub to_store_name: Option<String>,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
    pub quantity: Decimal,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub received_by: Option<Uuid>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for requesting a transfer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferInput {
    pub from_store_id: Uuid,
    pub to_store_id: Uuid,
    pub product_id: Uuid,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[validate(length(max = 500, message = "Reason is too long"))]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Input for rejecting a transfer
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RejectTransferInput {
    #[validate(length(max = 500, message = "Rejection reason is too long"))]
    #[serde(alias = "rejection_reason")]
    pub reason: Option<String>,
}

/// Filters for transfer listing
#[derive(Debug, Default, Deserialize)]
pub struct TransferQuery {
    pub status: Option<String>,
    /// Matches either side of the transfer
    pub store_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

/// Outcome of a completed transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferCompletion {
    pub transfer: InventoryTransfer,
    pub destination_product_id: Uuid,
    /// True when the product did not exist in the destination store and was created
    pub created_destination_product: bool,
    pub source_movement: StockMovement,
    pub destination_movement: StockMovement,
}

/// Transfer row locked for a state transition
#[derive(Debug, FromRow)]
struct LockedTransfer {
    id: Uuid,
    transfer_number: String,
    from_store_id: Uuid,
    from_store_name: Option<String>,
    to_store_id: Uuid,
    to_store_name: Option<String>,
    product_id: Uuid,
    quantity: Decimal,
    status: String,
}

impl LockedTransfer {
    fn status(&self) -> AppResult<TransferStatus> {
        TransferStatus::from_str(&self.status).ok_or_else(|| {
            AppError::Internal(format!("unknown transfer status '{}'", self.status))
        })
    }
}

const TRANSFER_SELECT: &str = r#"
    SELECT t.id, t.company_id, t.transfer_number,
           t.from_store_id, fs.name AS from_store_name,
           t.to_store_id, ts.name AS to_store_name,
           t.product_id, p.name AS product_name, p.sku AS product_sku,
           t.quantity, t.reason, t.notes, t.status, t.requested_by,
           t.approved_by, t.approved_at, t.rejection_reason,
           t.received_by, t.received_at, t.created_at, t.updated_at
    FROM inventory_transfers t
    LEFT JOIN stores fs ON fs.id = t.from_store_id
    LEFT JOIN stores ts ON ts.id = t.to_store_id
    LEFT JOIN products p ON p.id = t.product_id
"#;

/// `TRF-<last 8 digits of epoch millis>-<4 uppercase alphanumerics>`
pub fn generate_transfer_number() -> String {
    let millis = epoch_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(8)..];
    format!("TRF-{}-{}", tail, random_code(4))
}

impl TransferService {
    /// Create a new TransferService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Request a transfer. No stock moves until completion.
    pub async fn create_transfer(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        input: CreateTransferInput,
    ) -> AppResult<InventoryTransfer> {
        input.validate()?;
        validate_transfer_stores(input.from_store_id, input.to_store_id)?;

        let scope = TenantScope::load(&self.db, company_id).await?;
        scope.ensure_store(input.from_store_id)?;
        scope.ensure_store(input.to_store_id)?;

        let mut conn = self.db.acquire().await?;
        let available = source_stock(&mut conn, input.product_id, input.from_store_id, false).await?;
        ensure_stock_covers(available, input.quantity)?;

        let transfer_number = generate_transfer_number();

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO inventory_transfers (
                company_id, transfer_number, from_store_id, to_store_id, product_id,
                quantity, reason, notes, status, requested_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(company_id)
        .bind(&transfer_number)
        .bind(input.from_store_id)
        .bind(input.to_store_id)
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(&input.reason)
        .bind(&input.notes)
        .bind(TransferStatus::Pending.as_str())
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::unique_violation(e, "Transfer number"))?;

        tracing::info!(%transfer_number, "Transfer request created");

        fetch_transfer(&mut conn, company_id, id).await
    }

    /// List transfers for the company, newest first
    pub async fn list_transfers(
        &self,
        company_id: Uuid,
        query: TransferQuery,
    ) -> AppResult<Vec<InventoryTransfer>> {
        let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(
                TransferStatus::from_str(s)
                    .ok_or_else(|| AppError::validation("status", format!("Unknown status '{}'", s)))?,
            ),
            None => None,
        };

        let sql = format!(
            r#"{TRANSFER_SELECT}
            WHERE t.company_id = $1
              AND ($2::text IS NULL OR t.status = $2)
              AND ($3::uuid IS NULL OR t.from_store_id = $3 OR t.to_store_id = $3)
              AND ($4::uuid IS NULL OR t.product_id = $4)
            ORDER BY t.created_at DESC
            "#
        );

        let transfers = sqlx::query_as::<_, InventoryTransfer>(&sql)
            .bind(company_id)
            .bind(status.map(|s| s.as_str()))
            .bind(query.store_id)
            .bind(query.product_id)
            .fetch_all(&self.db)
            .await?;

        Ok(transfers)
    }

    /// Get a single transfer
    pub async fn get_transfer(&self, company_id: Uuid, transfer_id: Uuid) -> AppResult<InventoryTransfer> {
        let mut conn = self.db.acquire().await?;
        fetch_transfer(&mut conn, company_id, transfer_id).await
    }

    /// Approve a pending transfer after re-checking source stock
    pub async fn approve_transfer(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        transfer_id: Uuid,
    ) -> AppResult<InventoryTransfer> {
        let mut tx = self.db.begin().await?;

        let action = TransferAction::Approve;
        let transfer = lock_transfer(&mut tx, company_id, transfer_id).await?;
        let next = action.apply(transfer.status()?)?;

        if action.rechecks_stock() {
            let available =
                source_stock(&mut tx, transfer.product_id, transfer.from_store_id, false).await?;
            ensure_stock_covers(available, transfer.quantity)?;
        }

        let result = sqlx::query(
            r#"
            UPDATE inventory_transfers
            SET status = $1, approved_by = $2, approved_at = NOW(), updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(next.as_str())
        .bind(user_id)
        .bind(transfer_id)
        .bind(action.required_status().as_str())
        .execute(&mut *tx)
        .await?;
        ensure_transitioned(result.rows_affected(), action)?;

        let approved = fetch_transfer(&mut tx, company_id, transfer_id).await?;
        tx.commit().await?;

        tracing::info!(transfer_number = %approved.transfer_number, "Transfer approved");
        Ok(approved)
    }

    /// Reject a pending transfer
    pub async fn reject_transfer(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        transfer_id: Uuid,
        input: RejectTransferInput,
    ) -> AppResult<InventoryTransfer> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let transfer = lock_transfer(&mut tx, company_id, transfer_id).await?;
        let next = TransferAction::Reject.apply(transfer.status()?)?;

        let result = sqlx::query(
            r#"
            UPDATE inventory_transfers
            SET status = $1, approved_by = $2, approved_at = NOW(),
                rejection_reason = $3, updated_at = NOW()
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(next.as_str())
        .bind(user_id)
        .bind(&input.reason)
        .bind(transfer_id)
        .bind(TransferAction::Reject.required_status().as_str())
        .execute(&mut *tx)
        .await?;
        ensure_transitioned(result.rows_affected(), TransferAction::Reject)?;

        let rejected = fetch_transfer(&mut tx, company_id, transfer_id).await?;
        tx.commit().await?;

        tracing::info!(transfer_number = %rejected.transfer_number, "Transfer rejected");
        Ok(rejected)
    }

    /// Complete an approved transfer: decrement the source, credit or create
    /// the product at the destination and close the transfer, atomically.
    pub async fn complete_transfer(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        transfer_id: Uuid,
    ) -> AppResult<TransferCompletion> {
        let mut tx = self.db.begin().await?;

        let action = TransferAction::Complete;
        let transfer = lock_transfer(&mut tx, company_id, transfer_id).await?;
        let next = action.apply(transfer.status()?)?;
        let scope = TenantScope::load(&mut *tx, company_id).await?;

        if action.rechecks_stock() {
            let available =
                source_stock(&mut tx, transfer.product_id, transfer.from_store_id, true).await?;
            ensure_stock_covers(available, transfer.quantity)?;
        }

        let source_movement = ledger::apply_stock_delta(
            &mut *tx,
            &scope,
            user_id,
            StockDelta::new(
                EntityKind::Product,
                transfer.product_id,
                -transfer.quantity,
                MovementType::Transfer,
                ReferenceType::TransferOut,
            )
            .reference(transfer.id)
            .notes(format!(
                "Transfer to {} - {}",
                transfer.to_store_name.as_deref().unwrap_or("store"),
                transfer.transfer_number
            )),
        )
        .await?;

        let from_name = transfer.from_store_name.as_deref().unwrap_or("store");
        let incoming = |product_id: Uuid, suffix: &str| {
            StockDelta::new(
                EntityKind::Product,
                product_id,
                transfer.quantity,
                MovementType::Transfer,
                ReferenceType::TransferIn,
            )
            .reference(transfer.id)
            .notes(format!(
                "Transfer from {} - {}{}",
                from_name, transfer.transfer_number, suffix
            ))
        };

        let existing = find_destination_product(&mut tx, transfer.product_id, transfer.to_store_id).await?;
        let (destination_product_id, created, destination_movement) = match existing {
            Some(product_id) => {
                let movement =
                    ledger::apply_stock_delta(&mut *tx, &scope, user_id, incoming(product_id, ""))
                        .await?;
                (product_id, false, movement)
            }
            None => {
                let product_id = clone_product(
                    &mut tx,
                    transfer.product_id,
                    transfer.to_store_id,
                    transfer.quantity,
                    user_id,
                )
                .await?;
                let movement = ledger::record_opening_stock(
                    &mut *tx,
                    transfer.to_store_id,
                    user_id,
                    incoming(product_id, " (New product)"),
                )
                .await?;
                (product_id, true, movement)
            }
        };

        let result = sqlx::query(
            r#"
            UPDATE inventory_transfers
            SET status = $1, received_by = $2, received_at = NOW(), updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(next.as_str())
        .bind(user_id)
        .bind(transfer_id)
        .bind(action.required_status().as_str())
        .execute(&mut *tx)
        .await?;
        ensure_transitioned(result.rows_affected(), action)?;

        let completed = fetch_transfer(&mut tx, company_id, transfer_id).await?;
        tx.commit().await?;

        tracing::info!(
            transfer_number = %completed.transfer_number,
            destination_product_id = %destination_product_id,
            created_destination_product = created,
            "Transfer completed"
        );

        Ok(TransferCompletion {
            transfer: completed,
            destination_product_id,
            created_destination_product: created,
            source_movement,
            destination_movement,
        })
    }
}

async fn fetch_transfer(
    conn: &mut PgConnection,
    company_id: Uuid,
    transfer_id: Uuid,
) -> AppResult<InventoryTransfer> {
    let sql = format!("{TRANSFER_SELECT} WHERE t.id = $1 AND t.company_id = $2");
    sqlx::query_as::<_, InventoryTransfer>(&sql)
        .bind(transfer_id)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Transfer".to_string()))
}

async fn lock_transfer(
    conn: &mut PgConnection,
    company_id: Uuid,
    transfer_id: Uuid,
) -> AppResult<LockedTransfer> {
    sqlx::query_as::<_, LockedTransfer>(
        r#"
        SELECT t.id, t.transfer_number, t.from_store_id, fs.name AS from_store_name,
               t.to_store_id, ts.name AS to_store_name, t.product_id, t.quantity, t.status
        FROM inventory_transfers t
        LEFT JOIN stores fs ON fs.id = t.from_store_id
        LEFT JOIN stores ts ON ts.id = t.to_store_id
        WHERE t.id = $1 AND t.company_id = $2
        FOR UPDATE OF t
        "#,
    )
    .bind(transfer_id)
    .bind(company_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Transfer".to_string()))
}

/// Stock of the product in the transfer's source store
async fn source_stock(
    conn: &mut PgConnection,
    product_id: Uuid,
    from_store_id: Uuid,
    lock: bool,
) -> AppResult<Decimal> {
    let sql = format!(
        "SELECT COALESCE(stock_quantity, 0) FROM products WHERE id = $1 AND store_id = $2{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    sqlx::query_scalar::<_, Decimal>(&sql)
        .bind(product_id)
        .bind(from_store_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

/// Same-SKU product in the destination store. Products without a SKU never match.
async fn find_destination_product(
    conn: &mut PgConnection,
    source_product_id: Uuid,
    to_store_id: Uuid,
) -> AppResult<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT d.id
        FROM products s
        JOIN products d ON d.sku = s.sku AND d.store_id = $2
        WHERE s.id = $1 AND s.sku IS NOT NULL
        ORDER BY d.is_active DESC, d.created_at
        LIMIT 1
        "#,
    )
    .bind(source_product_id)
    .bind(to_store_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

/// Copy the catalogue fields of the source product into the destination store
async fn clone_product(
    conn: &mut PgConnection,
    source_product_id: Uuid,
    to_store_id: Uuid,
    quantity: Decimal,
    user_id: Uuid,
) -> AppResult<Uuid> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO products (
            store_id, category_id, name, description, sku, barcode,
            default_price, manila_price, delivery_price, wholesale_price,
            stock_quantity, min_stock_level, max_stock_level, unit, weight, dimensions,
            image_url, images, is_active, is_featured, tags, created_by
        )
        SELECT $1, category_id, name, description, sku, barcode,
               default_price, manila_price, delivery_price, wholesale_price,
               $2, min_stock_level, max_stock_level, unit, weight, dimensions,
               image_url, images, TRUE, is_featured, tags, $3
        FROM products
        WHERE id = $4
        RETURNING id
        "#,
    )
    .bind(to_store_id)
    .bind(quantity)
    .bind(user_id)
    .bind(source_product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    Ok(id)
}

/// A conditional status update that matched nothing lost a race with another transition
fn ensure_transitioned(rows_affected: u64, action: TransferAction) -> AppResult<()> {
    if rows_affected == 0 {
        Err(AppError::InvalidState(format!(
            "Transfer is no longer {}; cannot {} it",
            action.required_status(),
            action.verb()
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_number_format() {
        let number = generate_transfer_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TRF");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_lost_race_is_invalid_state() {
        assert!(ensure_transitioned(1, TransferAction::Approve).is_ok());
        assert!(matches!(
            ensure_transitioned(0, TransferAction::Complete),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn test_create_input_requires_positive_quantity() {
        let input = CreateTransferInput {
            from_store_id: Uuid::new_v4(),
            to_store_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: Decimal::ZERO,
            reason: None,
            notes: None,
        };
        assert!(input.validate().is_err());
    }

    mod db {
        use super::*;
        use crate::services::test_support::*;

        struct Fixture {
            service: TransferService,
            company_id: Uuid,
            user_id: Uuid,
            main: Uuid,
            branch: Uuid,
        }

        async fn fixture(pool: &PgPool) -> Fixture {
            let company_id = company(pool, "Bakery Co").await;
            Fixture {
                service: TransferService::new(pool.clone()),
                company_id,
                user_id: Uuid::new_v4(),
                main: store(pool, company_id, "Main").await,
                branch: store(pool, company_id, "Branch").await,
            }
        }

        impl Fixture {
            fn input(&self, product_id: Uuid, quantity: &str) -> CreateTransferInput {
                CreateTransferInput {
                    from_store_id: self.main,
                    to_store_id: self.branch,
                    product_id,
                    quantity: dec(quantity),
                    reason: None,
                    notes: None,
                }
            }

            async fn transfer_and_complete(&self, product_id: Uuid, quantity: &str) -> TransferCompletion {
                let (company_id, user_id) = (self.company_id, self.user_id);
                let created = self
                    .service
                    .create_transfer(company_id, user_id, self.input(product_id, quantity))
                    .await
                    .unwrap();
                self.service
                    .approve_transfer(company_id, user_id, created.id)
                    .await
                    .unwrap();
                self.service
                    .complete_transfer(company_id, user_id, created.id)
                    .await
                    .unwrap()
            }
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn test_completion_credits_existing_sku(pool: PgPool) {
            let f = fixture(&pool).await;
            let source = product(&pool, f.main, "Croissant", Some("CR-1"), "20").await;
            let destination = product(&pool, f.branch, "Croissant", Some("CR-1"), "3").await;

            let completion = f.transfer_and_complete(source, "5").await;

            assert!(!completion.created_destination_product);
            assert_eq!(completion.destination_product_id, destination);
            assert_eq!(completion.transfer.status, "completed");
            assert_eq!(product_stock(&pool, source).await, dec("15"));
            assert_eq!(product_stock(&pool, destination).await, dec("8"));

            assert_eq!(completion.source_movement.previous_stock, dec("20"));
            assert_eq!(completion.source_movement.new_stock, dec("15"));
            assert_eq!(completion.destination_movement.previous_stock, dec("3"));
            assert_eq!(completion.destination_movement.new_stock, dec("8"));
            assert_eq!(
                count(
                    &pool,
                    "SELECT COUNT(*) FROM products WHERE store_id = $1 AND sku = 'CR-1'",
                    f.branch
                )
                .await,
                1
            );
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn test_completion_clones_missing_sku_once(pool: PgPool) {
            let f = fixture(&pool).await;
            let source = product(&pool, f.main, "Green Tea", Some("TEA-9"), "20").await;

            let first = f.transfer_and_complete(source, "5").await;
            assert!(first.created_destination_product);
            assert_eq!(product_stock(&pool, first.destination_product_id).await, dec("5"));
            assert_eq!(first.destination_movement.previous_stock, Decimal::ZERO);
            assert_eq!(first.destination_movement.new_stock, dec("5"));
            assert_eq!(
                first.destination_movement.reference_type.as_deref(),
                Some("transfer_in")
            );

            let second = f.transfer_and_complete(source, "2").await;
            assert!(!second.created_destination_product);
            assert_eq!(second.destination_product_id, first.destination_product_id);
            assert_eq!(product_stock(&pool, first.destination_product_id).await, dec("7"));
            assert_eq!(product_stock(&pool, source).await, dec("13"));

            assert_eq!(
                count(
                    &pool,
                    "SELECT COUNT(*) FROM products WHERE store_id = $1 AND sku = 'TEA-9'",
                    f.branch
                )
                .await,
                1
            );
        }

        #[sqlx::test(migrations = "./migrations")]
        async fn test_foreign_company_sees_not_found(pool: PgPool) {
            let f = fixture(&pool).await;
            let source = product(&pool, f.main, "Bagel", Some("BG-1"), "10").await;
            let transfer = f
                .service
                .create_transfer(f.company_id, f.user_id, f.input(source, "4"))
                .await
                .unwrap();

            let other = company(&pool, "Rival Co").await;
            store(&pool, other, "Rival Main").await;
            let intruder = Uuid::new_v4();

            assert!(matches!(
                f.service.get_transfer(other, transfer.id).await,
                Err(AppError::NotFound(_))
            ));
            assert!(matches!(
                f.service.approve_transfer(other, intruder, transfer.id).await,
                Err(AppError::NotFound(_))
            ));
            assert!(matches!(
                f.service
                    .reject_transfer(other, intruder, transfer.id, RejectTransferInput::default())
                    .await,
                Err(AppError::NotFound(_))
            ));
            assert!(matches!(
                f.service.create_transfer(other, intruder, f.input(source, "1")).await,
                Err(AppError::NotFound(_))
            ));
            assert!(f
                .service
                .list_transfers(other, TransferQuery::default())
                .await
                .unwrap()
                .is_empty());

            let untouched = f.service.get_transfer(f.company_id, transfer.id).await.unwrap();
            assert_eq!(untouched.status, "pending");
            assert_eq!(product_stock(&pool, source).await, dec("10"));
        }
    }
}
