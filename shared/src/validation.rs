//! Validation utilities for the POS inventory platform

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::DomainError;
use crate::ledger::fits_stock_scale;

/// Quantities moved through the ledger must be strictly positive and storable
/// without rounding
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than 0");
    }
    if !fits_stock_scale(quantity) {
        return Err("Quantity has more than 4 decimal places");
    }
    Ok(())
}

/// Produced and sold units are whole numbers
pub fn validate_whole_units(quantity: Decimal) -> Result<(), &'static str> {
    validate_positive_quantity(quantity)?;
    if quantity.fract().is_zero() {
        Ok(())
    } else {
        Err("Quantity must be a whole number of units")
    }
}

/// A transfer must move stock between two different stores
pub fn validate_transfer_stores(from_store_id: Uuid, to_store_id: Uuid) -> Result<(), DomainError> {
    if from_store_id == to_store_id {
        Err(DomainError::SameStore)
    } else {
        Ok(())
    }
}

/// Stock must cover a requested quantity. Used by every transfer step.
pub fn ensure_stock_covers(available: Decimal, requested: Decimal) -> Result<(), DomainError> {
    if available >= requested {
        Ok(())
    } else {
        Err(DomainError::InsufficientStock {
            available,
            requested,
        })
    }
}

/// Recipe line quantity: positive, non-empty unit
pub fn validate_recipe_line(quantity_needed: Decimal, unit: &str) -> Result<(), &'static str> {
    if quantity_needed <= Decimal::ZERO {
        return Err("quantity_needed must be greater than 0");
    }
    if !fits_stock_scale(quantity_needed) {
        return Err("quantity_needed has more than 4 decimal places");
    }
    if unit.trim().is_empty() {
        return Err("unit is required");
    }
    Ok(())
}
