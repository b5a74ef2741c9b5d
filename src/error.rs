//! Core error taxonomy
//!
//! Every rejected operation maps to exactly one variant with a stable code
//! string, so the request layer can translate failures without string
//! matching. All variants are terminal for the triggering request; the core
//! never retries internally.

use thiserror::Error;

/// Errors returned by the money-match core services
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or out-of-range input, user-correctable
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Referenced entity does not exist
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Duplicate creation (second dispute on a match, reused idempotency key)
    #[error("{message}")]
    Conflict { code: String, message: String },

    /// State-machine guard violation (wrong status, not a participant, ...)
    #[error("{message}")]
    BusinessLogic { code: String, message: String },

    /// Insufficient balance or gateway failure
    #[error("{message}")]
    Payment { code: String, message: String },

    /// Caller lacks rights for the action
    #[error("{0}")]
    Authorization(String),

    /// Storage or infrastructure failure, not user-correctable
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn business(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BusinessLogic {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn payment(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Payment {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn insufficient_balance(required_cents: i64, available_cents: i64) -> Self {
        Self::Payment {
            code: "INSUFFICIENT_BALANCE".to_string(),
            message: format!(
                "Insufficient balance. Required: ${:.2}, Available: ${:.2}",
                required_cents as f64 / 100.0,
                available_cents as f64 / 100.0
            ),
        }
    }

    /// Stable machine-readable code for the request layer
    pub fn code(&self) -> &str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { code, .. } => code,
            Self::BusinessLogic { code, .. } => code,
            Self::Payment { code, .. } => code,
            Self::Authorization(_) => "NOT_AUTHORIZED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<diesel::result::Error> for CoreError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Internal(anyhow::Error::new(err).context("database operation failed"))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            CoreError::insufficient_balance(500, 100).code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(
            CoreError::business("INVALID_MATCH_STATE", "nope").code(),
            "INVALID_MATCH_STATE"
        );
        assert_eq!(CoreError::validation("bad").code(), "VALIDATION_ERROR");
        assert_eq!(CoreError::not_found("Match", "x").code(), "NOT_FOUND");
    }

    #[test]
    fn insufficient_balance_message_formats_dollars() {
        let err = CoreError::insufficient_balance(500, 250);
        assert_eq!(
            err.to_string(),
            "Insufficient balance. Required: $5.00, Available: $2.50"
        );
    }
}
