//! HTTP request handlers

pub mod health;
pub mod inventory;
pub mod recipes;
pub mod shopping;
pub mod units;

pub use health::*;
pub use inventory::*;
pub use recipes::*;
pub use shopping::*;
pub use units::*;
