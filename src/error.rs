//! Error kinds shared by the pricing, signal and PnL layers.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid rate: 1 + {rate} * {tenor_days}/360 is not positive")]
    InvalidRate { rate: f64, tenor_days: u32 },

    #[error("Division by zero: theoretical forward is zero")]
    DivideByZero,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing data on {date}: {what}")]
    MissingData { date: NaiveDate, what: String },

    #[error("Invalid price {value} for {what}")]
    InvalidPrice { what: String, value: f64 },
}

pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Short machine-friendly tag, used in failure records and CSV output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRate { .. } => "invalid_rate",
            Self::DivideByZero => "divide_by_zero",
            Self::Configuration(_) => "configuration",
            Self::MissingData { .. } => "missing_data",
            Self::InvalidPrice { .. } => "invalid_price",
        }
    }
}
