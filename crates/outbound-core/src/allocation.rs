//! # Allocation Engine
//!
//! Splits a requested quantity of one SKU across the warehouse locations
//! that hold partial stock.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Greedy Largest-Location-First                          │
//! │                                                                         │
//! │   required = 20     stocks: L1=13  L2=8  L3=5  L4=3                    │
//! │                                                                         │
//! │   1. Drop non-positive entries                                          │
//! │   2. Stable sort by quantity descending (ties keep input order)         │
//! │   3. Walk the sorted list, taking min(remaining, qty) per location      │
//! │                                                                         │
//! │      L1: take 13   remaining 7                                          │
//! │      L2: take 7    remaining 0   ← stop                                 │
//! │                                                                         │
//! │   Result: 2 lines, total_allocated=20, shortfall=0                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Largest-first minimizes the number of resulting cart lines and is
//! deterministic; it is not claimed to be globally optimal across multiple
//! concurrent SKU allocations. The sort key is isolated in
//! [`AllocationOrder`] so a different warehouse policy (e.g. oldest stock
//! first) can swap it without touching the walk.
//!
//! This is the only place business quantity math happens. Pure,
//! side-effect-free, unit-testable without any cart or transport.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{AllocationRequest, AllocationResult, CartLine, LocationStock};

// =============================================================================
// Allocation Order
// =============================================================================

/// The policy deciding which locations are consumed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationOrder {
    /// Consume the fullest location first. Minimizes line count.
    #[default]
    LargestFirst,
}

impl AllocationOrder {
    /// Sorts candidate stocks into consumption order.
    ///
    /// Sorting must be stable: locations with equal quantities keep their
    /// input order, which keeps allocation deterministic for a given
    /// locator snapshot.
    fn sort(&self, stocks: &mut [LocationStock]) {
        match self {
            AllocationOrder::LargestFirst => {
                stocks.sort_by(|a, b| b.quantity.cmp(&a.quantity));
            }
        }
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Allocates `request.required_quantity` units across `stocks`.
///
/// ## Preconditions
/// - `required_quantity > 0`, else `InvalidQuantity`
/// - Entries with `quantity <= 0` are discarded before sorting
///
/// ## Postconditions
/// - `total_allocated + shortfall == required_quantity`
/// - One line per consumed location, in consumption order
/// - No location has positive stock → empty lines, full shortfall
pub fn allocate(
    request: &AllocationRequest,
    stocks: &[LocationStock],
    order: AllocationOrder,
) -> CoreResult<AllocationResult> {
    if request.required_quantity <= 0 {
        return Err(CoreError::invalid_quantity(
            request.required_quantity,
            format!("allocation of {}", request.sku),
        ));
    }

    let mut candidates: Vec<LocationStock> = stocks
        .iter()
        .filter(|s| s.is_positive())
        .cloned()
        .collect();
    order.sort(&mut candidates);

    let mut remaining = request.required_quantity;
    let mut lines = Vec::new();

    for stock in &candidates {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(stock.quantity);
        if take > 0 {
            lines.push(CartLine::from_request(request, &stock.location, take));
            remaining -= take;
        }
    }

    Ok(AllocationResult {
        lines,
        total_allocated: request.required_quantity - remaining,
        shortfall: remaining,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stocks() -> Vec<LocationStock> {
        vec![
            LocationStock::new("L1", 13),
            LocationStock::new("L2", 8),
            LocationStock::new("L3", 5),
            LocationStock::new("L4", 3),
        ]
    }

    fn request(qty: i64) -> AllocationRequest {
        AllocationRequest::new("129092-red-M", qty)
    }

    #[test]
    fn test_allocate_covered_request_splits_two_locations() {
        let result = allocate(&request(20), &stocks(), AllocationOrder::LargestFirst).unwrap();

        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].location, "L1");
        assert_eq!(result.lines[0].quantity, 13);
        assert_eq!(result.lines[1].location, "L2");
        assert_eq!(result.lines[1].quantity, 7);
        assert_eq!(result.total_allocated, 20);
        assert_eq!(result.shortfall, 0);
        assert!(result.is_complete());
    }

    #[test]
    fn test_allocate_over_capacity_drains_everything() {
        // Total stock 29, request 50 → shortfall 21
        let result = allocate(&request(50), &stocks(), AllocationOrder::LargestFirst).unwrap();

        assert_eq!(result.lines.len(), 4);
        let quantities: Vec<(String, i64)> = result
            .lines
            .iter()
            .map(|l| (l.location.clone(), l.quantity))
            .collect();
        assert_eq!(
            quantities,
            vec![
                ("L1".into(), 13),
                ("L2".into(), 8),
                ("L3".into(), 5),
                ("L4".into(), 3),
            ]
        );
        assert_eq!(result.total_allocated, 29);
        assert_eq!(result.shortfall, 21);
    }

    #[test]
    fn test_allocate_conservation_invariant() {
        for qty in [1, 5, 13, 14, 29, 30, 100] {
            let result = allocate(&request(qty), &stocks(), AllocationOrder::LargestFirst).unwrap();
            assert_eq!(result.total_allocated + result.shortfall, qty);
            let line_sum: i64 = result.lines.iter().map(|l| l.quantity).sum();
            assert_eq!(line_sum, result.total_allocated);
        }
    }

    #[test]
    fn test_allocate_first_line_is_largest_location() {
        let result = allocate(&request(3), &stocks(), AllocationOrder::LargestFirst).unwrap();
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].location, "L1");
        assert_eq!(result.lines[0].quantity, 3);
    }

    #[test]
    fn test_allocate_stable_tie_break_on_input_order() {
        let tied = vec![
            LocationStock::new("B", 5),
            LocationStock::new("A", 5),
            LocationStock::new("C", 5),
        ];
        let result = allocate(&request(12), &tied, AllocationOrder::LargestFirst).unwrap();
        let order: Vec<&str> = result.lines.iter().map(|l| l.location.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_allocate_discards_non_positive_stock() {
        let mixed = vec![
            LocationStock::new("EMPTY", 0),
            LocationStock::new("NEG", -3),
            LocationStock::new("L1", 4),
        ];
        let result = allocate(&request(10), &mixed, AllocationOrder::LargestFirst).unwrap();
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].location, "L1");
        assert_eq!(result.total_allocated, 4);
        assert_eq!(result.shortfall, 6);
    }

    #[test]
    fn test_allocate_no_stock_is_full_shortfall() {
        let result = allocate(&request(7), &[], AllocationOrder::LargestFirst).unwrap();
        assert!(result.lines.is_empty());
        assert_eq!(result.total_allocated, 0);
        assert_eq!(result.shortfall, 7);
    }

    #[test]
    fn test_allocate_rejects_non_positive_quantity() {
        for qty in [0, -5] {
            let err = allocate(&request(qty), &stocks(), AllocationOrder::LargestFirst)
                .unwrap_err();
            assert!(matches!(err, CoreError::InvalidQuantity { .. }));
        }
    }

    #[test]
    fn test_allocate_stamps_variant_metadata() {
        let req = AllocationRequest::from_parsed(
            &crate::types::ParsedCode::new("129092", "黄色", "XXL"),
            5,
        )
        .with_batch("B-2024-11");
        let result = allocate(&req, &stocks(), AllocationOrder::LargestFirst).unwrap();
        let line = &result.lines[0];
        assert_eq!(line.sku, "129092-黄色-XXL");
        assert_eq!(line.color, "黄色");
        assert_eq!(line.size, "XXL");
        assert_eq!(line.batch.as_deref(), Some("B-2024-11"));
    }
}
