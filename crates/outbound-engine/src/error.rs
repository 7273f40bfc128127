//! # Engine Error Types
//!
//! Error types for the async pipeline.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Lookup      │  │     Submission          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  StockQuery*    │  │  SubmitFailed           │ │
//! │  │  ConfigLoad     │  │  CodeLookup     │  │  (per line, never       │ │
//! │  │                 │  │                 │  │   rolled back)          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Plumbing     │  │     Domain      │                              │
//! │  │                 │  │                 │                              │
//! │  │  ChannelClosed  │  │  Core(#[from])  │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookup failures are non-fatal by design: the engine proceeds with zero
//! known stock (full shortfall) and a warning instead of blocking a scan.

use thiserror::Error;

use outbound_core::CoreError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type covering all async pipeline failures.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// The stock locator returned an error for a SKU.
    ///
    /// Distinguishable from "confirmed empty": an empty stock list is a
    /// successful answer, this is not.
    #[error("Stock query failed for {sku}: {reason}")]
    StockQueryFailed { sku: String, reason: String },

    /// The stock locator did not answer within the configured timeout.
    #[error("Stock query for {sku} timed out after {timeout_ms}ms")]
    StockQueryTimeout { sku: String, timeout_ms: u64 },

    /// Remote resolution of an unparseable scan code failed.
    #[error("Code lookup failed for '{code}': {reason}")]
    CodeLookupFailed { code: String, reason: String },

    // =========================================================================
    // Submission Errors
    // =========================================================================
    /// One line's outbound mutation was rejected by the backend.
    ///
    /// Per-line and aggregated by the caller; one line's failure never
    /// blocks or reverts sibling lines' success.
    #[error("Submission failed for {sku} at {location}: {reason}")]
    SubmitFailed {
        sku: String,
        location: String,
        reason: String,
    },

    // =========================================================================
    // Plumbing Errors
    // =========================================================================
    /// A command or response channel closed unexpectedly.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Core rule violation (wraps CoreError).
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// True if the pipeline should degrade (zero known stock) rather than
    /// surface this as a hard failure.
    pub fn is_degradable_lookup(&self) -> bool {
        matches!(
            self,
            EngineError::StockQueryFailed { .. } | EngineError::StockQueryTimeout { .. }
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
