//! # Stock Locator Boundary
//!
//! The external-collaborator interface the engine consumes for stock
//! queries and remote code resolution.
//!
//! ## Failure Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Locator Failure Handling                            │
//! │                                                                         │
//! │  locate(sku) ──► Ok(vec![])        confirmed empty → full shortfall    │
//! │              ──► Ok(stocks)        allocate against snapshot            │
//! │              ──► Err(..)/timeout   zero KNOWN stock → full shortfall    │
//! │                                    + warning; never a silent retry,     │
//! │                                    never an indefinite block            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine always consumes real locator output; the in-memory
//! implementation below is test/demo wiring only and is never substituted
//! implicitly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use outbound_core::{LocationStock, ParsedCode};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Stock Locator Trait
// =============================================================================

/// Async boundary to the warehouse backend.
///
/// Implementations may be remote (REST, gRPC) or in-memory; the engine
/// only requires that failures be distinguishable from confirmed-empty
/// stock, and filters non-positive quantities defensively regardless.
#[async_trait]
pub trait StockLocator: Send + Sync {
    /// Returns current per-location stock for a SKU.
    async fn locate(&self, sku: &str) -> EngineResult<Vec<LocationStock>>;

    /// Resolves a scan code that did not match the local
    /// `product-color-size` format.
    async fn resolve_code(&self, code: &str) -> EngineResult<ParsedCode>;
}

/// Runs a stock query with the configured timeout.
///
/// Timeouts are mapped to `StockQueryTimeout` so callers can degrade to
/// zero known stock without distinguishing hang from refusal.
pub async fn locate_with_timeout(
    locator: &Arc<dyn StockLocator>,
    sku: &str,
    timeout_ms: u64,
) -> EngineResult<Vec<LocationStock>> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), locator.locate(sku)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::StockQueryTimeout {
            sku: sku.to_string(),
            timeout_ms,
        }),
    }
}

// =============================================================================
// In-Memory Locator (tests and the simulate binary)
// =============================================================================

/// In-memory stock locator for tests and the demo driver.
#[derive(Default)]
pub struct MemoryStockLocator {
    /// Per-SKU stock snapshots.
    stocks: RwLock<HashMap<String, Vec<LocationStock>>>,

    /// Remote code resolutions for unparseable scans.
    codes: RwLock<HashMap<String, ParsedCode>>,

    /// SKUs whose queries fail, for degraded-path tests.
    failing: RwLock<HashSet<String>>,
}

impl MemoryStockLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds stock for one SKU.
    pub async fn set_stock(&self, sku: impl Into<String>, stocks: Vec<LocationStock>) {
        self.stocks.write().await.insert(sku.into(), stocks);
    }

    /// Seeds a remote resolution for an unparseable code.
    pub async fn set_code(&self, code: impl Into<String>, parsed: ParsedCode) {
        self.codes.write().await.insert(code.into(), parsed);
    }

    /// Makes every query for `sku` fail, for degraded-path tests.
    pub async fn fail_sku(&self, sku: impl Into<String>) {
        self.failing.write().await.insert(sku.into());
    }

    /// Clears a simulated failure so later queries succeed again.
    pub async fn recover_sku(&self, sku: &str) {
        self.failing.write().await.remove(sku);
    }
}

#[async_trait]
impl StockLocator for MemoryStockLocator {
    async fn locate(&self, sku: &str) -> EngineResult<Vec<LocationStock>> {
        if self.failing.read().await.contains(sku) {
            return Err(EngineError::StockQueryFailed {
                sku: sku.to_string(),
                reason: "simulated backend failure".into(),
            });
        }

        Ok(self
            .stocks
            .read()
            .await
            .get(sku)
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_code(&self, code: &str) -> EngineResult<ParsedCode> {
        self.codes
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| EngineError::CodeLookupFailed {
                code: code.to_string(),
                reason: "unknown code".into(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
