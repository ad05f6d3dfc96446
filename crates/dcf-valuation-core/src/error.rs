use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    /// Gordon growth is undefined unless the discount rate exceeds terminal growth.
    #[error("Degenerate assumption: discount rate ({discount_rate}) must exceed terminal growth rate ({terminal_growth})")]
    DegenerateAssumption {
        discount_rate: Decimal,
        terminal_growth: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    /// A value left the range `Decimal` can represent.
    #[error("Arithmetic overflow in {context}")]
    Overflow { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ValuationError {
    fn from(e: serde_json::Error) -> Self {
        ValuationError::SerializationError(e.to_string())
    }
}

pub(crate) fn overflow(context: &str) -> ValuationError {
    ValuationError::Overflow {
        context: context.into(),
    }
}
