//! # Pending Outbound Cart
//!
//! Holds the current set of pending outbound lines, enforces uniqueness by
//! merge key, and applies quantity edits with stock-cap validation.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CartStore Operations                               │
//! │                                                                         │
//! │  Trigger                  Operation                State Change         │
//! │  ───────                  ─────────                ────────────         │
//! │                                                                         │
//! │  Scan allocated ────────► add(line) ─────────────► merge or push front  │
//! │                                                                         │
//! │  Operator edits qty ────► update_quantity() ─────► set, clamped to cap  │
//! │                                                                         │
//! │  Operator deletes ──────► remove(key) ───────────► line dropped         │
//! │                                                                         │
//! │  Submission succeeds ───► clear() ───────────────► cart emptied         │
//! │                                                                         │
//! │  After every mutation ──► merge_duplicates() ────► same-key lines fold  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - No two lines ever share a merge key
//! - Every line has `quantity > 0` (a line reaching 0 is removed, not kept
//!   as a zero-quantity placeholder)
//! - Order is insertion order: newest-first for freshly added lines,
//!   preserved position for merged lines

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{CartLine, LocationStock, MergeKey};

// =============================================================================
// Update Outcome
// =============================================================================

/// Result of a quantity edit.
///
/// A capped edit is NOT a failure: the edit is applied at the cap and the
/// caller is told, so the operator sees "clamped to 13" instead of a
/// silently accepted over-commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum UpdateOutcome {
    /// The requested quantity was applied as-is.
    Applied { quantity: i64 },

    /// The requested quantity exceeded the known stock cap for the line's
    /// `(sku, location)` and was clamped.
    Capped { requested: i64, cap: i64 },
}

// =============================================================================
// Cart Store
// =============================================================================

/// The mutable set of pending outbound lines.
///
/// Pure data structure: all I/O, concurrency, and reconciliation policy
/// live in the engine crate. The engine serializes every mutation through
/// a single owner task, so `CartStore` itself needs no locking.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    /// Lines, newest-first. Unique by merge key.
    lines: Vec<CartLine>,

    /// Known per-location stock caps, keyed by `(sku, location)`.
    /// Refreshed from the latest locator snapshot for each SKU.
    caps: HashMap<(String, String), i64>,
}

impl CartStore {
    /// Creates an empty cart.
    pub fn new() -> Self {
        CartStore::default()
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Adds a line, merging on insert.
    ///
    /// ## Behavior
    /// - A line with the same merge key exists: its quantity is incremented
    ///   by `line.quantity` and it keeps its position. This is how
    ///   rescanning the same SKU/color/size/location accumulates count
    ///   instead of creating duplicates.
    /// - Otherwise the line is inserted at the front (newest-first).
    pub fn add(&mut self, line: CartLine) -> CoreResult<()> {
        if line.quantity <= 0 {
            return Err(CoreError::invalid_quantity(
                line.quantity,
                format!("cart line {}", line.merge_key()),
            ));
        }

        let key = line.merge_key();
        if let Some(existing) = self.lines.iter_mut().find(|l| l.merge_key() == key) {
            existing.quantity += line.quantity;
            return Ok(());
        }

        self.lines.insert(0, line);
        Ok(())
    }

    /// Sets a line's quantity, clamping to the known stock cap.
    ///
    /// ## Behavior
    /// - `quantity <= 0` → `InvalidQuantity`, no state change
    /// - Unknown key → `LineNotFound`
    /// - A cap is known for the line's `(sku, location)` and the requested
    ///   quantity exceeds it → applied at the cap, reported as `Capped`
    pub fn update_quantity(&mut self, key: &MergeKey, quantity: i64) -> CoreResult<UpdateOutcome> {
        if quantity <= 0 {
            return Err(CoreError::invalid_quantity(
                quantity,
                format!("edit of {key}"),
            ));
        }

        let cap = self.cap_for(&key.sku, &key.location);
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.merge_key() == *key)
            .ok_or_else(|| CoreError::LineNotFound { key: key.clone() })?;

        match cap {
            Some(cap) if quantity > cap => {
                line.quantity = cap;
                Ok(UpdateOutcome::Capped {
                    requested: quantity,
                    cap,
                })
            }
            _ => {
                line.quantity = quantity;
                Ok(UpdateOutcome::Applied { quantity })
            }
        }
    }

    /// Removes the line with the given key. No-op if absent.
    pub fn remove(&mut self, key: &MergeKey) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| l.merge_key() == *key)?;
        Some(self.lines.remove(index))
    }

    /// Removes the line with the given id. No-op if absent.
    ///
    /// Used by submission, which tracks lines by id across the async
    /// round-trip rather than by (mutable) merge key.
    pub fn remove_by_id(&mut self, id: &str) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| l.id == id)?;
        Some(self.lines.remove(index))
    }

    /// Empties the cart. Used after a fully-successful submission.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Removes and returns every line of one `(sku, color, size)` group,
    /// preserving order. This is the first half of redistribution.
    pub fn remove_group(&mut self, sku: &str, color: &str, size: &str) -> Vec<CartLine> {
        let (group, rest): (Vec<CartLine>, Vec<CartLine>) = self
            .lines
            .drain(..)
            .partition(|l| l.sku == sku && l.color == color && l.size == size);
        self.lines = rest;
        group
    }

    // -------------------------------------------------------------------------
    // Merge Pass
    // -------------------------------------------------------------------------

    /// Folds lines sharing a merge key into the first occurrence, summing
    /// quantities. Returns the number of lines folded away.
    ///
    /// Idempotent: running it twice in a row produces the same cart. This
    /// guards against races where asynchronous product-detail loads insert
    /// the same logical item more than once before `add`'s uniqueness
    /// check can apply.
    pub fn merge_duplicates(&mut self) -> usize {
        let mut seen: HashMap<MergeKey, usize> = HashMap::new();
        let mut merged = Vec::with_capacity(self.lines.len());
        let mut folded = 0;

        for line in self.lines.drain(..) {
            match seen.get(&line.merge_key()) {
                Some(&index) => {
                    let kept: &mut CartLine = &mut merged[index];
                    kept.quantity += line.quantity;
                    folded += 1;
                }
                None => {
                    seen.insert(line.merge_key(), merged.len());
                    merged.push(line);
                }
            }
        }

        self.lines = merged;
        folded
    }

    // -------------------------------------------------------------------------
    // Stock Caps
    // -------------------------------------------------------------------------

    /// Records per-location caps for one SKU from a locator snapshot.
    /// Non-positive entries are ignored.
    pub fn set_stock_caps(&mut self, sku: &str, stocks: &[LocationStock]) {
        for stock in stocks.iter().filter(|s| s.is_positive()) {
            self.caps
                .insert((sku.to_string(), stock.location.clone()), stock.quantity);
        }
    }

    /// Returns the known cap for `(sku, location)`, if any.
    pub fn cap_for(&self, sku: &str, location: &str) -> Option<i64> {
        self.caps
            .get(&(sku.to_string(), location.to_string()))
            .copied()
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// All lines, newest-first.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// The line with the given key, if present.
    pub fn get(&self, key: &MergeKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.merge_key() == *key)
    }

    /// Total quantity across all lines of one `(sku, color, size)` group.
    pub fn group_total(&self, sku: &str, color: &str, size: &str) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.sku == sku && l.color == color && l.size == size)
            .map(|l| l.quantity)
            .sum()
    }

    /// Number of lines in the cart.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// True if the cart holds no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Serializable snapshot for UI layers.
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            lines: self.lines.clone(),
            line_count: self.line_count(),
            total_quantity: self.total_quantity(),
        }
    }
}

// =============================================================================
// Cart Snapshot
// =============================================================================

/// Read-only view of the cart for external consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub line_count: usize,
    pub total_quantity: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AllocationRequest;

    fn line(sku: &str, location: &str, color: &str, size: &str, qty: i64) -> CartLine {
        let request = AllocationRequest {
            sku: sku.to_string(),
            required_quantity: qty,
            product_name: sku.to_string(),
            color: color.to_string(),
            size: size.to_string(),
            batch: None,
            image_url: None,
        };
        CartLine::from_request(&request, location, qty)
    }

    fn key(sku: &str, location: &str, color: &str, size: &str) -> MergeKey {
        MergeKey::new(sku, location, color, size)
    }

    #[test]
    fn test_add_new_line_goes_to_front() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        cart.add(line("B", "L2", "blue", "S", 3)).unwrap();

        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.lines()[0].sku, "B"); // newest first
        assert_eq!(cart.lines()[1].sku, "A");
    }

    #[test]
    fn test_add_same_key_merges_never_grows() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        cart.add(line("A", "L1", "red", "M", 3)).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 8);
    }

    #[test]
    fn test_add_merged_line_keeps_position() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        cart.add(line("B", "L2", "blue", "S", 3)).unwrap();
        // Rescan of A merges into its existing (older) position
        cart.add(line("A", "L1", "red", "M", 2)).unwrap();

        assert_eq!(cart.lines()[0].sku, "B");
        assert_eq!(cart.lines()[1].sku, "A");
        assert_eq!(cart.lines()[1].quantity, 7);
    }

    #[test]
    fn test_add_rejects_non_positive_quantity() {
        let mut cart = CartStore::new();
        let err = cart.add(line("A", "L1", "red", "M", 0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidQuantity { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_different_location_is_a_different_line() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        cart.add(line("A", "L2", "red", "M", 5)).unwrap();
        assert_eq!(cart.line_count(), 2);
    }

    #[test]
    fn test_update_quantity_applies_within_cap() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        cart.set_stock_caps("A", &[LocationStock::new("L1", 13)]);

        let outcome = cart
            .update_quantity(&key("A", "L1", "red", "M"), 10)
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied { quantity: 10 });
        assert_eq!(cart.lines()[0].quantity, 10);
    }

    #[test]
    fn test_update_quantity_clamps_to_cap() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        cart.set_stock_caps("A", &[LocationStock::new("L1", 13)]);

        let outcome = cart
            .update_quantity(&key("A", "L1", "red", "M"), 50)
            .unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::Capped {
                requested: 50,
                cap: 13
            }
        );
        assert_eq!(cart.lines()[0].quantity, 13);
    }

    #[test]
    fn test_update_quantity_without_known_cap_is_uncapped() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();

        let outcome = cart
            .update_quantity(&key("A", "L1", "red", "M"), 500)
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied { quantity: 500 });
    }

    #[test]
    fn test_update_quantity_rejects_non_positive() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();

        let err = cart
            .update_quantity(&key("A", "L1", "red", "M"), 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidQuantity { .. }));
        // Rejected before any state change
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn test_update_quantity_unknown_key() {
        let mut cart = CartStore::new();
        let err = cart
            .update_quantity(&key("A", "L1", "red", "M"), 5)
            .unwrap_err();
        assert!(matches!(err, CoreError::LineNotFound { .. }));
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let mut cart = CartStore::new();
        assert!(cart.remove(&key("A", "L1", "red", "M")).is_none());
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        assert!(cart.remove(&key("A", "L1", "red", "M")).is_some());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_merge_duplicates_folds_race_inserted_lines() {
        let mut cart = CartStore::new();
        // Simulate the async race: two same-key lines inserted bypassing
        // add's uniqueness check.
        cart.lines.push(line("A", "L1", "red", "M", 5));
        cart.lines.push(line("A", "L1", "red", "M", 3));

        let folded = cart.merge_duplicates();
        assert_eq!(folded, 1);
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity, 8);
    }

    #[test]
    fn test_merge_duplicates_is_idempotent() {
        let mut cart = CartStore::new();
        cart.lines.push(line("A", "L1", "red", "M", 5));
        cart.lines.push(line("B", "L2", "blue", "S", 2));
        cart.lines.push(line("A", "L1", "red", "M", 3));

        cart.merge_duplicates();
        let after_first: Vec<(MergeKey, i64)> = cart
            .lines()
            .iter()
            .map(|l| (l.merge_key(), l.quantity))
            .collect();

        let folded_again = cart.merge_duplicates();
        let after_second: Vec<(MergeKey, i64)> = cart
            .lines()
            .iter()
            .map(|l| (l.merge_key(), l.quantity))
            .collect();

        assert_eq!(folded_again, 0);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_merge_duplicates_keeps_first_occurrence_position() {
        let mut cart = CartStore::new();
        cart.lines.push(line("A", "L1", "red", "M", 5));
        cart.lines.push(line("B", "L2", "blue", "S", 2));
        cart.lines.push(line("A", "L1", "red", "M", 3));

        cart.merge_duplicates();
        assert_eq!(cart.lines()[0].sku, "A");
        assert_eq!(cart.lines()[0].quantity, 8);
        assert_eq!(cart.lines()[1].sku, "B");
    }

    #[test]
    fn test_remove_group_pulls_all_locations() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        cart.add(line("A", "L2", "red", "M", 3)).unwrap();
        cart.add(line("A", "L1", "blue", "M", 9)).unwrap();

        let group = cart.remove_group("A", "red", "M");
        assert_eq!(group.len(), 2);
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].color, "blue");
    }

    #[test]
    fn test_group_total_spans_locations() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        cart.add(line("A", "L2", "red", "M", 3)).unwrap();
        cart.add(line("B", "L1", "red", "M", 100)).unwrap();
        assert_eq!(cart.group_total("A", "red", "M"), 8);
    }

    #[test]
    fn test_clear_and_snapshot() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();
        cart.add(line("B", "L2", "blue", "S", 2)).unwrap();

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.line_count, 2);
        assert_eq!(snapshot.total_quantity, 7);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut cart = CartStore::new();
        cart.add(line("A", "L1", "red", "M", 5)).unwrap();

        let json = serde_json::to_value(cart.snapshot()).unwrap();
        assert_eq!(json["lineCount"], 1);
        assert_eq!(json["totalQuantity"], 5);
        assert_eq!(json["lines"][0]["sku"], "A");
        assert_eq!(json["lines"][0]["productName"], "A");
        assert_eq!(json["lines"][0]["quantity"], 5);
        assert!(json["lines"][0]["addedAt"].is_string());
    }
}
