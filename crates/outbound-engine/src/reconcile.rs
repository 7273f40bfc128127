//! # Reconciliation Service
//!
//! Keeps the cart consistent after every mutation. Two duties:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Reconciliation Duties                             │
//! │                                                                         │
//! │  1. MERGE PASS (after every mutation)                                   │
//! │     Fold lines sharing a merge key into one, summing quantities.        │
//! │     Idempotent. Guards the race where async product-detail loads        │
//! │     insert the same logical item twice before add's uniqueness          │
//! │     check applies.                                                      │
//! │                                                                         │
//! │  2. REDISTRIBUTION (edit exceeds the line's location cap)               │
//! │     The operator types 50 into one location's box:                      │
//! │       new total = 50 + rest of the (sku, color, size) group             │
//! │       remove the whole group                                            │
//! │       re-allocate the total against a fresh stock snapshot              │
//! │       insert the freshly computed lines                                 │
//! │     The order silently spreads across every location with stock.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both passes are synchronous cart transforms; the cart service owns the
//! async parts (fresh locator queries, staleness checks) and calls in here
//! with the snapshot already in hand.

use tracing::{debug, info};

use outbound_core::{
    allocate, AllocationOrder, AllocationRequest, AllocationResult, CartLine, CartStore,
    CoreError, CoreResult, LocationStock, MergeKey,
};

// =============================================================================
// Reconciler
// =============================================================================

/// Cart consistency passes, parameterized by allocation policy.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    order: AllocationOrder,
}

impl Reconciler {
    pub fn new(order: AllocationOrder) -> Self {
        Reconciler { order }
    }

    /// Runs the merge pass. Returns the number of lines folded away.
    pub fn merge(&self, cart: &mut CartStore) -> usize {
        let folded = cart.merge_duplicates();
        if folded > 0 {
            info!(folded, "Merge pass folded duplicate cart lines");
        } else {
            debug!("Merge pass found no duplicates");
        }
        folded
    }

    /// Re-spreads one `(sku, color, size)` group across locations after an
    /// edit pushed the line at `key` to `desired_line_quantity`.
    ///
    /// ## Behavior
    /// - New group total = `desired_line_quantity` + the rest of the group
    ///   as it stands NOW (a scan merged between scheduling and commit is
    ///   counted, not lost)
    /// - The whole group is removed and re-allocated against `stocks`
    /// - Caps are refreshed from the same snapshot
    ///
    /// Errors with `LineNotFound` if the edited line is gone; the caller
    /// treats that as a stale request and discards it.
    pub fn redistribute(
        &self,
        cart: &mut CartStore,
        key: &MergeKey,
        desired_line_quantity: i64,
        stocks: &[LocationStock],
    ) -> CoreResult<AllocationResult> {
        let edited = cart
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::LineNotFound { key: key.clone() })?;

        let new_total = desired_line_quantity
            + cart.group_total(&edited.sku, &edited.color, &edited.size)
            - edited.quantity;

        cart.set_stock_caps(&key.sku, stocks);

        let removed = cart.remove_group(&edited.sku, &edited.color, &edited.size);
        debug!(
            sku = %edited.sku,
            removed = removed.len(),
            new_total,
            "Redistributing group"
        );

        let request = request_from_line(&edited, new_total);
        let result = allocate(&request, stocks, self.order)?;

        // Reverse so the first allocated location ends up frontmost.
        for line in result.lines.iter().rev() {
            cart.add(line.clone())?;
        }
        self.merge(cart);

        info!(
            sku = %edited.sku,
            lines = result.lines.len(),
            allocated = result.total_allocated,
            shortfall = result.shortfall,
            "Redistribution complete"
        );

        Ok(result)
    }
}

/// Rebuilds an allocation request carrying an existing line's metadata.
fn request_from_line(line: &CartLine, required_quantity: i64) -> AllocationRequest {
    AllocationRequest {
        sku: line.sku.clone(),
        required_quantity,
        product_name: line.product_name.clone(),
        color: line.color.clone(),
        size: line.size.clone(),
        batch: line.batch.clone(),
        image_url: line.image_url.clone(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_cart() -> (CartStore, MergeKey) {
        let mut cart = CartStore::new();
        let request = AllocationRequest {
            sku: "129092-red-M".into(),
            required_quantity: 5,
            product_name: "129092".into(),
            color: "red".into(),
            size: "M".into(),
            batch: None,
            image_url: None,
        };
        cart.add(CartLine::from_request(&request, "L1", 5)).unwrap();
        let key = MergeKey::new("129092-red-M", "L1", "red", "M");
        (cart, key)
    }

    fn stocks() -> Vec<LocationStock> {
        vec![
            LocationStock::new("L1", 13),
            LocationStock::new("L2", 8),
            LocationStock::new("L3", 5),
            LocationStock::new("L4", 3),
        ]
    }

    #[test]
    fn test_redistribute_spreads_across_locations() {
        let (mut cart, key) = seeded_cart();
        let reconciler = Reconciler::new(AllocationOrder::LargestFirst);

        // Operator types 50 into L1's quantity box; total stock is 29.
        let result = reconciler.redistribute(&mut cart, &key, 50, &stocks()).unwrap();

        assert_eq!(result.total_allocated, 29);
        assert_eq!(result.shortfall, 21);
        assert_eq!(cart.line_count(), 4);
        assert_eq!(cart.group_total("129092-red-M", "red", "M"), 29);
        // First allocated location is frontmost
        assert_eq!(cart.lines()[0].location, "L1");
        assert_eq!(cart.lines()[0].quantity, 13);
    }

    #[test]
    fn test_redistribute_counts_other_group_lines() {
        let (mut cart, key) = seeded_cart();
        // A second line of the same group at another location
        let request = AllocationRequest {
            sku: "129092-red-M".into(),
            required_quantity: 4,
            product_name: "129092".into(),
            color: "red".into(),
            size: "M".into(),
            batch: None,
            image_url: None,
        };
        cart.add(CartLine::from_request(&request, "L2", 4)).unwrap();

        let reconciler = Reconciler::new(AllocationOrder::LargestFirst);
        // Edited line 5 → 10, plus the L2 line's 4 → group total 14
        let result = reconciler.redistribute(&mut cart, &key, 10, &stocks()).unwrap();

        assert_eq!(result.total_allocated, 14);
        assert_eq!(result.shortfall, 0);
        assert_eq!(cart.group_total("129092-red-M", "red", "M"), 14);
        // 13 from L1, 1 from L2
        assert_eq!(cart.line_count(), 2);
    }

    #[test]
    fn test_redistribute_refreshes_caps() {
        let (mut cart, key) = seeded_cart();
        let reconciler = Reconciler::new(AllocationOrder::LargestFirst);
        reconciler.redistribute(&mut cart, &key, 20, &stocks()).unwrap();

        assert_eq!(cart.cap_for("129092-red-M", "L1"), Some(13));
        assert_eq!(cart.cap_for("129092-red-M", "L2"), Some(8));
    }

    #[test]
    fn test_redistribute_missing_line_is_stale() {
        let mut cart = CartStore::new();
        let reconciler = Reconciler::new(AllocationOrder::LargestFirst);
        let key = MergeKey::new("129092-red-M", "L1", "red", "M");

        let err = reconciler
            .redistribute(&mut cart, &key, 10, &stocks())
            .unwrap_err();
        assert!(matches!(err, CoreError::LineNotFound { .. }));
    }

    #[test]
    fn test_redistribute_against_empty_snapshot_empties_group() {
        // Confirmed-empty stock (not a failure) legitimately allocates
        // nothing: full shortfall, group gone.
        let (mut cart, key) = seeded_cart();
        let reconciler = Reconciler::new(AllocationOrder::LargestFirst);

        let result = reconciler.redistribute(&mut cart, &key, 10, &[]).unwrap();
        assert_eq!(result.shortfall, 10);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_merge_reports_folds() {
        let (mut cart, _) = seeded_cart();
        let reconciler = Reconciler::new(AllocationOrder::LargestFirst);
        assert_eq!(reconciler.merge(&mut cart), 0);
    }
}
