//! Business-rule rejections raised by the pure domain layer

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::TransferStatus;

/// Per-ingredient shortfall reported when a recipe cannot be satisfied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortage {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    pub needed: Decimal,
    pub available: Decimal,
    pub shortage: Decimal,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("Quantity has more than {max_scale} decimal places")]
    QuantityTooPrecise { max_scale: u32 },

    #[error("Insufficient stock. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient ingredients ({} short)", shortages.len())]
    InsufficientIngredients { shortages: Vec<Shortage> },

    #[error("Cannot {action} transfer with status: {current}")]
    InvalidTransition {
        action: &'static str,
        current: TransferStatus,
    },

    #[error("Cannot transfer to the same store")]
    SameStore,
}
