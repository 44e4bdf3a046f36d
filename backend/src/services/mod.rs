//! Business logic services for the POS inventory server

pub mod inventory;
pub mod ledger;
pub mod manufacturing;
pub mod pos;
pub mod recipe;
pub mod tenancy;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

pub use inventory::InventoryService;
pub use manufacturing::ManufacturingService;
pub use pos::PosService;
pub use recipe::RecipeService;
pub use transfer::TransferService;

use rust_decimal::Decimal;
use validator::ValidationError;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Milliseconds since the Unix epoch
pub(crate) fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Random uppercase alphanumeric code, drawn from a v4 UUID (at most 16 characters)
pub(crate) fn random_code(len: usize) -> String {
    uuid::Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(len)
        .map(|b| CODE_ALPHABET[usize::from(*b) % CODE_ALPHABET.len()] as char)
        .collect()
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// `validator` hook for strictly positive quantities
pub(crate) fn positive_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    shared::validate_positive_quantity(*quantity).map_err(|msg| validation_error("positive", msg))
}

/// `validator` hook for whole, positive unit counts
pub(crate) fn whole_units(quantity: &Decimal) -> Result<(), ValidationError> {
    shared::validate_whole_units(*quantity).map_err(|msg| validation_error("whole_units", msg))
}
