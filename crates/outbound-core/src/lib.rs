//! # outbound-core: Pure Business Logic for the Outbound Allocation Engine
//!
//! This crate is the **heart** of the outbound pipeline. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Outbound Pipeline Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Scanner Hardware / UI Layer                     │   │
//! │  │        (excluded - produces a stream of decoded strings)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ScanEvent stream                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                outbound-engine (async layer)                    │   │
//! │  │    ScanIntake ──► StockLocator ──► CartService ──► Submitter    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ outbound-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ allocation │  │   cart    │  │  parser   │  │   │
//! │  │   │ CartLine  │  │  allocate  │  │ CartStore │  │ParsedCode │  │   │
//! │  │   │ MergeKey  │  │ shortfall  │  │ merge pass│  │  split    │  │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO RUNTIME • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ScanEvent, LocationStock, CartLine, etc.)
//! - [`parser`] - Scan code parsing (product-color-size)
//! - [`allocation`] - Greedy multi-location allocation
//! - [`cart`] - Pending outbound cart with merge-key uniqueness
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Network, file system, and runtime access is FORBIDDEN here
//! 3. **Integer Quantities**: All stock math is i64, never floats
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use outbound_core::allocation::{allocate, AllocationOrder};
//! use outbound_core::types::{AllocationRequest, LocationStock};
//!
//! let request = AllocationRequest::new("129092-yellow-XXL", 22);
//! let stocks = vec![
//!     LocationStock::new("L1", 13),
//!     LocationStock::new("L2", 8),
//! ];
//!
//! let result = allocate(&request, &stocks, AllocationOrder::LargestFirst).unwrap();
//! assert_eq!(result.total_allocated, 21);
//! assert_eq!(result.shortfall, 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod cart;
pub mod error;
pub mod parser;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use outbound_core::CartStore` instead of
// `use outbound_core::cart::CartStore`

pub use allocation::{allocate, AllocationOrder};
pub use cart::{CartSnapshot, CartStore, UpdateOutcome};
pub use error::{CoreError, CoreResult};
pub use parser::parse_scan_code;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Delimiter separating product code, color, and size in a scanned code.
///
/// ## Format
/// `<product>-<color>-<size>[-<extra>...]`, e.g. `129092-黄色-XXL`.
/// Codes that do not match are resolved by a remote lookup instead.
pub const SCAN_CODE_DELIMITER: char = '-';

/// Minimum number of non-empty segments for a locally parseable scan code.
pub const MIN_SCAN_CODE_SEGMENTS: usize = 3;
