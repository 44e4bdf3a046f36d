//! Stock ledger persistence
//!
//! The only code path that writes `stock_quantity`. Each call locks the
//! entity row, plans the change with [`shared::plan_stock_change`], stores the
//! new head and appends exactly one movement row. All functions take a
//! connection borrowed from the caller's transaction so workflows can compose
//! several ledger entries atomically.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    plan_stock_change, EntityKind, MovementType, NegativeStockPolicy, ReferenceType, StockChange,
};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::tenancy::TenantScope;

/// One signed change to an entity's stock
#[derive(Debug, Clone)]
pub struct StockDelta {
    pub kind: EntityKind,
    pub entity_id: Uuid,
    pub delta: Decimal,
    pub movement_type: MovementType,
    pub reference_type: ReferenceType,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub policy: NegativeStockPolicy,
}

impl StockDelta {
    pub fn new(
        kind: EntityKind,
        entity_id: Uuid,
        delta: Decimal,
        movement_type: MovementType,
        reference_type: ReferenceType,
    ) -> Self {
        Self {
            kind,
            entity_id,
            delta,
            movement_type,
            reference_type,
            reference_id: None,
            notes: None,
            policy: NegativeStockPolicy::Reject,
        }
    }

    pub fn reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn policy(mut self, policy: NegativeStockPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Persisted movement row, for either ledger
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub store_id: Uuid,
    pub movement_type: String,
    pub quantity: Decimal,
    pub previous_stock: Decimal,
    pub new_stock: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub unit_cost: Option<Decimal>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Movement about to be appended
struct NewMovement<'a> {
    kind: EntityKind,
    entity_id: Uuid,
    store_id: Uuid,
    movement_type: MovementType,
    change: StockChange,
    reference_type: ReferenceType,
    reference_id: Option<Uuid>,
    unit_cost: Option<Decimal>,
    notes: Option<&'a str>,
    actor_id: Uuid,
}

/// Row lock on the stock-bearing entity
#[derive(Debug, FromRow)]
struct LockedStock {
    store_id: Uuid,
    stock_quantity: Decimal,
    unit_cost: Option<Decimal>,
}

/// Apply a signed stock change and record its movement.
///
/// The entity must live in one of the tenant's stores, otherwise `NotFound`.
pub async fn apply_stock_delta(
    conn: &mut PgConnection,
    scope: &TenantScope,
    actor_id: Uuid,
    delta: StockDelta,
) -> AppResult<StockMovement> {
    if !delta.movement_type.applies_to(delta.kind) {
        return Err(AppError::Internal(format!(
            "movement type '{}' is not valid for {}",
            delta.movement_type.as_str(),
            delta.kind.label().to_lowercase()
        )));
    }

    let locked = lock_stock(conn, scope, delta.kind, delta.entity_id).await?;
    let change = plan_stock_change(locked.stock_quantity, delta.delta, delta.policy)?;

    let update = format!(
        "UPDATE {} SET stock_quantity = $1, updated_at = NOW() WHERE id = $2",
        delta.kind.table()
    );
    sqlx::query(&update)
        .bind(change.new_stock)
        .bind(delta.entity_id)
        .execute(&mut *conn)
        .await?;

    let movement = insert_movement(
        conn,
        NewMovement {
            kind: delta.kind,
            entity_id: delta.entity_id,
            store_id: locked.store_id,
            movement_type: delta.movement_type,
            change,
            reference_type: delta.reference_type,
            reference_id: delta.reference_id,
            unit_cost: locked.unit_cost,
            notes: delta.notes.as_deref(),
            actor_id,
        },
    )
    .await?;

    tracing::debug!(
        kind = delta.kind.label(),
        entity_id = %delta.entity_id,
        previous = %change.previous_stock,
        new = %change.new_stock,
        movement_type = delta.movement_type.as_str(),
        "Stock updated"
    );

    Ok(movement)
}

/// Record the opening movement of a row created with stock already in it.
/// Used when a transfer lands in a store that had no matching product.
pub async fn record_opening_stock(
    conn: &mut PgConnection,
    store_id: Uuid,
    actor_id: Uuid,
    delta: StockDelta,
) -> AppResult<StockMovement> {
    let change = plan_stock_change(Decimal::ZERO, delta.delta, NegativeStockPolicy::Reject)?;
    insert_movement(
        conn,
        NewMovement {
            kind: delta.kind,
            entity_id: delta.entity_id,
            store_id,
            movement_type: delta.movement_type,
            change,
            reference_type: delta.reference_type,
            reference_id: delta.reference_id,
            unit_cost: None,
            notes: delta.notes.as_deref(),
            actor_id,
        },
    )
    .await
}

async fn lock_stock(
    conn: &mut PgConnection,
    scope: &TenantScope,
    kind: EntityKind,
    entity_id: Uuid,
) -> AppResult<LockedStock> {
    let cost_column = match kind {
        EntityKind::Ingredient => "unit_cost",
        EntityKind::Product => "NULL::numeric",
    };
    let sql = format!(
        r#"
        SELECT store_id, COALESCE(stock_quantity, 0) AS stock_quantity, {cost_column} AS unit_cost
        FROM {table}
        WHERE id = $1 AND store_id = ANY($2)
        FOR UPDATE
        "#,
        table = kind.table(),
    );

    sqlx::query_as::<_, LockedStock>(&sql)
        .bind(entity_id)
        .bind(scope.store_ids())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(kind.label().to_string()))
}

async fn insert_movement(
    conn: &mut PgConnection,
    movement: NewMovement<'_>,
) -> AppResult<StockMovement> {
    let (cost_column, cost_value, cost_returning) = match movement.kind {
        EntityKind::Ingredient => (", unit_cost", ", $11", "unit_cost"),
        EntityKind::Product => ("", "", "NULL::numeric AS unit_cost"),
    };
    let sql = format!(
        r#"
        INSERT INTO {table} (
            {fk}, store_id, movement_type, quantity, previous_stock, new_stock,
            reference_type, reference_id, notes, created_by{cost_column}
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10{cost_value})
        RETURNING id, {fk} AS entity_id, store_id, movement_type, quantity, previous_stock,
                  new_stock, reference_type, reference_id, {cost_returning}, notes,
                  created_by, created_at
        "#,
        table = movement.kind.movement_table(),
        fk = movement.kind.movement_fk(),
    );

    let mut query = sqlx::query_as::<_, StockMovement>(&sql)
        .bind(movement.entity_id)
        .bind(movement.store_id)
        .bind(movement.movement_type.as_str())
        .bind(movement.change.quantity)
        .bind(movement.change.previous_stock)
        .bind(movement.change.new_stock)
        .bind(movement.reference_type.as_str())
        .bind(movement.reference_id)
        .bind(movement.notes)
        .bind(movement.actor_id);
    if movement.kind == EntityKind::Ingredient {
        query = query.bind(movement.unit_cost);
    }

    Ok(query.fetch_one(&mut *conn).await?)
}
