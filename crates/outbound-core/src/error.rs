//! # Error Types
//!
//! Domain-specific error types for outbound-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  outbound-core errors (this file)                                      │
//! │  └── CoreError        - Allocation / cart rule violations              │
//! │                                                                         │
//! │  outbound-engine errors (separate crate)                               │
//! │  └── EngineError      - Lookup, channel, and submission failures       │
//! │                                                                         │
//! │  Flow: CoreError → EngineError → caller / UI layer                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, merge key, quantities)
//! 3. Errors are enum variants, never String
//! 4. Outcomes that are not failures (shortfall, capped edits) are NOT
//!    errors - they are signal values on the happy path

use thiserror::Error;

use crate::types::MergeKey;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent rule violations rejected before any state change.
/// Partial allocation and cap-clamped edits are deliberately absent:
/// both are first-class results, not failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A requested or edited quantity was zero or negative.
    ///
    /// ## When This Occurs
    /// - `allocate` called with `required_quantity <= 0`
    /// - `update_quantity` called with a non-positive quantity
    #[error("Invalid quantity {quantity} for {context}: must be positive")]
    InvalidQuantity { quantity: i64, context: String },

    /// A cart edit referenced a merge key with no matching line.
    #[error("No cart line for {key}")]
    LineNotFound { key: MergeKey },
}

impl CoreError {
    /// Shorthand for the invalid-quantity case.
    pub fn invalid_quantity(quantity: i64, context: impl Into<String>) -> Self {
        CoreError::InvalidQuantity {
            quantity,
            context: context.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_quantity_message() {
        let err = CoreError::invalid_quantity(0, "allocation of 129092-red-M");
        assert_eq!(
            err.to_string(),
            "Invalid quantity 0 for allocation of 129092-red-M: must be positive"
        );
    }

    #[test]
    fn test_line_not_found_message() {
        let err = CoreError::LineNotFound {
            key: MergeKey::new("129092-red-M", "A-01", "red", "M"),
        };
        assert_eq!(err.to_string(), "No cart line for 129092-red-M@A-01 [red/M]");
    }
}
