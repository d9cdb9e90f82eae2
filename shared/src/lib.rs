//! Shared types and models for the Household Pantry platform
//!
//! This crate holds the domain models and the pure planning logic (unit
//! conversion, demand aggregation, FIFO allocation) shared between the
//! backend, the browser front end (via WASM) and the tests.

pub mod conversion;
pub mod cooking;
pub mod demand;
pub mod fifo;
pub mod forecast;
pub mod models;
pub mod planning;
pub mod rounding;
pub mod types;
pub mod validation;

pub use conversion::*;
pub use models::*;
pub use rounding::*;
pub use types::*;
pub use validation::*;
