//! Domain models for the POS inventory core

mod movement;
mod transfer;
mod user;

pub use movement::*;
pub use transfer::*;
pub use user::*;
