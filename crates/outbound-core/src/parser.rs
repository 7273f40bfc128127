//! # Scan Code Parser
//!
//! Parses a scanned string into its product/color/size components.
//!
//! ## Code Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Scan Code Format                                  │
//! │                                                                         │
//! │   129092-黄色-XXL                                                       │
//! │   ──────┬──┬───┬──                                                      │
//! │         │  │   └── size                                                 │
//! │         │  └────── color                                                │
//! │         └───────── product code                                         │
//! │                                                                         │
//! │   Additional `-`-separated segments after the third are ignored.        │
//! │   Fewer than 3 non-empty segments → not locally parseable → the        │
//! │   caller falls back to a remote product/SKU lookup.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pure and deterministic: no I/O, no side effects, no guessing. A code
//! that does not match the format yields `None` rather than a botched
//! best-effort split.

use crate::types::ParsedCode;
use crate::{MIN_SCAN_CODE_SEGMENTS, SCAN_CODE_DELIMITER};

/// Parses a scanned code into `ParsedCode`, or `None` if the format does
/// not match.
///
/// ## Behavior
/// - Splits on [`SCAN_CODE_DELIMITER`]
/// - Requires at least [`MIN_SCAN_CODE_SEGMENTS`] non-empty segments
/// - Segments beyond the third are ignored
/// - `None` signals the caller to resolve the code remotely
pub fn parse_scan_code(code: &str) -> Option<ParsedCode> {
    let segments: Vec<&str> = code
        .split(SCAN_CODE_DELIMITER)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() < MIN_SCAN_CODE_SEGMENTS {
        return None;
    }

    Some(ParsedCode::new(segments[0], segments[1], segments[2]))
}

// =============================================================================
// Unit Tests
// =============================================================================
