//! # Domain Types
//!
//! Core domain types used throughout the outbound pipeline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ScanEvent     │   │  LocationStock  │   │    CartLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  code           │   │  location       │   │  id (UUID)      │       │
//! │  │  received_at    │   │  quantity       │   │  sku, location  │       │
//! │  └─────────────────┘   └─────────────────┘   │  color, size    │       │
//! │                                              │  quantity       │       │
//! │  ┌─────────────────┐   ┌─────────────────┐   └─────────────────┘       │
//! │  │   ParsedCode    │   │AllocationRequest│                             │
//! │  │  ─────────────  │   │  ─────────────  │   ┌─────────────────┐       │
//! │  │  product_code   │   │  sku            │   │    MergeKey     │       │
//! │  │  color, size    │   │  required_qty   │   │ (sku, location, │       │
//! │  └─────────────────┘   └─────────────────┘   │  color, size)   │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycles
//! - `ScanEvent` is consumed by intake and discarded immediately.
//! - `CartLine` is created by allocation output or a manual edit, mutated by
//!   quantity edits and reconciliation, and destroyed by removal, by being
//!   folded into a sibling during a merge pass, or by a confirmed submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Scan Event
// =============================================================================

/// A single decoded string arriving from the scanner stream.
///
/// Ephemeral: produced by the external scanner collaborator, consumed by
/// intake, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    /// The raw decoded string.
    pub code: String,

    /// When the scan arrived at intake.
    pub received_at: DateTime<Utc>,
}

impl ScanEvent {
    /// Creates a scan event stamped with the current time.
    pub fn new(code: impl Into<String>) -> Self {
        ScanEvent {
            code: code.into(),
            received_at: Utc::now(),
        }
    }
}

// =============================================================================
// Parsed Code
// =============================================================================

/// A scan code split into its product/color/size components.
///
/// Produced by [`crate::parser::parse_scan_code`] for locally parseable
/// codes, or by a remote lookup for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCode {
    /// Product identifier, e.g. `129092`.
    pub product_code: String,

    /// Color variant, e.g. `黄色`.
    pub color: String,

    /// Size variant, e.g. `XXL`.
    pub size: String,
}

impl ParsedCode {
    pub fn new(
        product_code: impl Into<String>,
        color: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        ParsedCode {
            product_code: product_code.into(),
            color: color.into(),
            size: size.into(),
        }
    }

    /// Returns the canonical SKU code for this variant.
    ///
    /// A SKU is a concrete color+size variant of a product, identified by
    /// the `product-color-size` code. This is the key used for stock
    /// lookups and cart merging.
    pub fn sku(&self) -> String {
        format!("{}-{}-{}", self.product_code, self.color, self.size)
    }
}

// =============================================================================
// Location Stock
// =============================================================================

/// A per-location stock snapshot returned by the stock locator.
///
/// Only positive quantities are meaningful for allocation; the allocator
/// filters non-positive entries defensively regardless of what the
/// locator returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStock {
    /// Storage slot code, e.g. `A-03-12`.
    pub location: String,

    /// Units of the queried SKU currently held at this location.
    pub quantity: i64,
}

impl LocationStock {
    pub fn new(location: impl Into<String>, quantity: i64) -> Self {
        LocationStock {
            location: location.into(),
            quantity,
        }
    }

    /// True if this entry can contribute to an allocation.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.quantity > 0
    }
}

// =============================================================================
// Allocation Request
// =============================================================================

/// A request to allocate `required_quantity` units of one SKU across
/// warehouse locations.
///
/// The variant metadata (`color`, `size`, `product_name`, ...) is stamped
/// onto every cart line the allocator emits, so a request built from a
/// parsed scan carries the full merge-key context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// SKU code being allocated.
    pub sku: String,

    /// Total units requested. Must be positive.
    pub required_quantity: i64,

    /// Display name stamped onto emitted lines (defaults to the SKU code).
    pub product_name: String,

    /// Color component of the merge key.
    pub color: String,

    /// Size component of the merge key.
    pub size: String,

    /// Optional batch identifier carried through to submission.
    pub batch: Option<String>,

    /// Optional product image URL for UI layers.
    pub image_url: Option<String>,
}

impl AllocationRequest {
    /// Creates a bare request with no variant metadata.
    pub fn new(sku: impl Into<String>, required_quantity: i64) -> Self {
        let sku = sku.into();
        AllocationRequest {
            product_name: sku.clone(),
            sku,
            required_quantity,
            color: String::new(),
            size: String::new(),
            batch: None,
            image_url: None,
        }
    }

    /// Creates a request for a parsed scan code.
    pub fn from_parsed(parsed: &ParsedCode, required_quantity: i64) -> Self {
        AllocationRequest {
            sku: parsed.sku(),
            required_quantity,
            product_name: parsed.product_code.clone(),
            color: parsed.color.clone(),
            size: parsed.size.clone(),
            batch: None,
            image_url: None,
        }
    }

    /// Sets the display name stamped onto emitted lines.
    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = name.into();
        self
    }

    /// Sets the batch identifier carried through to submission.
    pub fn with_batch(mut self, batch: impl Into<String>) -> Self {
        self.batch = Some(batch.into());
        self
    }
}

// =============================================================================
// Merge Key
// =============================================================================

/// The `(sku, location, color, size)` tuple that uniquely identifies one
/// cart line.
///
/// ## Core Invariant
/// At most one [`CartLine`] per merge key may exist in a cart at any time.
/// Rescanning the same variant at the same location accumulates quantity
/// on the existing line instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergeKey {
    pub sku: String,
    pub location: String,
    pub color: String,
    pub size: String,
}

impl MergeKey {
    pub fn new(
        sku: impl Into<String>,
        location: impl Into<String>,
        color: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        MergeKey {
            sku: sku.into(),
            location: location.into(),
            color: color.into(),
            size: size.into(),
        }
    }
}

impl std::fmt::Display for MergeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{} [{}/{}]",
            self.sku, self.location, self.color, self.size
        )
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One pending outbound line: a quantity of one SKU leaving one location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Unique identifier (UUID v4). Stable across edits, gone when the
    /// line is merged away or removed.
    pub id: String,

    /// SKU code.
    pub sku: String,

    /// Display name shown to the operator.
    pub product_name: String,

    /// Storage slot the quantity will leave from.
    pub location: String,

    /// Units on this line. Always positive; a line reaching zero is
    /// removed, never kept as a placeholder.
    pub quantity: i64,

    /// Color component of the merge key.
    pub color: String,

    /// Size component of the merge key.
    pub size: String,

    /// Optional batch identifier carried through to submission.
    pub batch: Option<String>,

    /// Optional product image URL for UI layers.
    pub image_url: Option<String>,

    /// When this line was first created.
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a line for one location from an allocation request.
    pub fn from_request(
        request: &AllocationRequest,
        location: impl Into<String>,
        quantity: i64,
    ) -> Self {
        CartLine {
            id: Uuid::new_v4().to_string(),
            sku: request.sku.clone(),
            product_name: request.product_name.clone(),
            location: location.into(),
            quantity,
            color: request.color.clone(),
            size: request.size.clone(),
            batch: request.batch.clone(),
            image_url: request.image_url.clone(),
            added_at: Utc::now(),
        }
    }

    /// Returns the merge key identifying this line.
    pub fn merge_key(&self) -> MergeKey {
        MergeKey {
            sku: self.sku.clone(),
            location: self.location.clone(),
            color: self.color.clone(),
            size: self.size.clone(),
        }
    }

    /// True if `other` belongs to the same `(sku, color, size)` group,
    /// irrespective of location. Redistribution operates on groups.
    pub fn same_group(&self, other: &CartLine) -> bool {
        self.sku == other.sku && self.color == other.color && self.size == other.size
    }
}

// =============================================================================
// Allocation Result
// =============================================================================

/// The outcome of allocating one request across locations.
///
/// ## Invariant
/// `total_allocated + shortfall == required_quantity` of the originating
/// request, always.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    /// One line per location that contributed stock, in consumption order.
    pub lines: Vec<CartLine>,

    /// Units covered by known stock.
    pub total_allocated: i64,

    /// Units that could not be covered. A positive shortfall is a
    /// first-class outcome ("allocated 29 of 50"), not an error.
    pub shortfall: i64,
}

impl AllocationResult {
    /// True if the full requested quantity was covered.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.shortfall == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
