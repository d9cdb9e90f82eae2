//! Domain models for the Household Pantry platform

mod article;
mod batch;
mod recipe;
mod shopping;
mod unit;

pub use article::*;
pub use batch::*;
pub use recipe::*;
pub use shopping::*;
pub use unit::*;

/// Error returned when a stored enum tag does not match any known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
