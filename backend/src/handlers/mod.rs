//! HTTP handlers for the POS inventory API

pub mod health;
pub mod ingredient;
pub mod inventory;
pub mod manufacturing;
pub mod pos;
pub mod recipe;
pub mod transfer;

pub use health::*;
pub use ingredient::*;
pub use inventory::*;
pub use manufacturing::*;
pub use pos::*;
pub use recipe::*;
pub use transfer::*;
