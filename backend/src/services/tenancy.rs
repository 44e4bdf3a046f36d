//! Tenant scoping
//!
//! A caller only ever sees the stores of its own company. Every service
//! resolves this set first and filters all lookups through it.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// The stores a company owns
#[derive(Debug, Clone)]
pub struct TenantScope {
    pub company_id: Uuid,
    store_ids: Vec<Uuid>,
}

impl TenantScope {
    /// Load the store set for a company
    pub async fn load<'e, E>(executor: E, company_id: Uuid) -> AppResult<Self>
    where
        E: PgExecutor<'e>,
    {
        let store_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM stores WHERE company_id = $1 ORDER BY created_at",
        )
        .bind(company_id)
        .fetch_all(executor)
        .await?;

        Ok(Self::new(company_id, store_ids))
    }

    pub fn new(company_id: Uuid, store_ids: Vec<Uuid>) -> Self {
        Self {
            company_id,
            store_ids,
        }
    }

    pub fn store_ids(&self) -> &[Uuid] {
        &self.store_ids
    }

    pub fn contains(&self, store_id: Uuid) -> bool {
        self.store_ids.contains(&store_id)
    }

    /// Foreign stores are reported exactly like missing ones
    pub fn ensure_store(&self, store_id: Uuid) -> AppResult<()> {
        if self.contains(store_id) {
            Ok(())
        } else {
            Err(AppError::NotFound("Store".to_string()))
        }
    }

    /// Narrow to a single store when the client asks for one
    pub fn narrow(&self, store_id: Option<Uuid>) -> AppResult<Vec<Uuid>> {
        match store_id {
            Some(id) => {
                self.ensure_store(id)?;
                Ok(vec![id])
            }
            None => Ok(self.store_ids.clone()),
        }
    }
}
