//! Shared domain types and rules for the POS inventory platform
//!
//! Everything in this crate is pure: no I/O, no database access. The backend
//! persists what these functions decide, and the WASM module exposes the same
//! rules to the POS frontend so previews never disagree with the server.

pub mod availability;
pub mod error;
pub mod ledger;
pub mod models;
pub mod types;
pub mod validation;

pub use availability::*;
pub use error::*;
pub use ledger::*;
pub use models::*;
pub use types::*;
pub use validation::*;
