//! # Submission Boundary
//!
//! The external collaborator executing the actual outbound transactions.
//!
//! ## Non-Atomic By Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Per-Line Submission                               │
//! │                                                                         │
//! │  Cart line ──► submit_line ──► Ok   line removed from cart             │
//! │  Cart line ──► submit_line ──► Err  line STAYS in cart, siblings       │
//! │                                     continue                            │
//! │                                                                         │
//! │  Partial success across lines is expected and reported line-by-line.    │
//! │  One line's failure never blocks or reverts another's success.          │
//! │  The cart is cleared only when every line went through.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use outbound_core::CartLine;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Outbound Request
// =============================================================================

/// One independent outbound mutation: a quantity of one SKU leaving one
/// location, attributed to an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub sku: String,
    pub location: String,
    pub quantity: i64,
    pub operator_id: String,
    pub batch: Option<String>,
}

impl OutboundRequest {
    /// Builds the mutation request for one cart line.
    pub fn from_line(line: &CartLine, operator_id: impl Into<String>) -> Self {
        OutboundRequest {
            sku: line.sku.clone(),
            location: line.location.clone(),
            quantity: line.quantity,
            operator_id: operator_id.into(),
            batch: line.batch.clone(),
        }
    }
}

// =============================================================================
// Submitter Trait
// =============================================================================

/// Async boundary executing outbound mutations, one line at a time.
#[async_trait]
pub trait OutboundSubmitter: Send + Sync {
    /// Submits one line. An `Err` affects only this line.
    async fn submit_line(&self, request: &OutboundRequest) -> EngineResult<()>;
}

// =============================================================================
// Submission Report
// =============================================================================

/// One line that failed to submit, kept in the cart for retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedLine {
    pub line: CartLine,
    pub reason: String,
}

/// Aggregated per-line outcomes of one submission run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionReport {
    /// Number of lines attempted.
    pub submitted: usize,

    /// Ids of lines accepted by the backend (removed from the cart).
    pub succeeded: Vec<String>,

    /// Lines the backend rejected (still in the cart).
    pub failed: Vec<FailedLine>,
}

impl SubmissionReport {
    /// True if every attempted line went through.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// =============================================================================
// In-Memory Submitter (tests and the simulate binary)
// =============================================================================

/// Records submissions in memory; can reject configured locations.
#[derive(Default)]
pub struct MemorySubmitter {
    accepted: Mutex<Vec<OutboundRequest>>,
    rejected_locations: Mutex<HashSet<String>>,
}

impl MemorySubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes submissions for `location` fail, for partial-success tests.
    pub async fn reject_location(&self, location: impl Into<String>) {
        self.rejected_locations.lock().await.insert(location.into());
    }

    /// Requests accepted so far, in submission order.
    pub async fn accepted(&self) -> Vec<OutboundRequest> {
        self.accepted.lock().await.clone()
    }
}

#[async_trait]
impl OutboundSubmitter for MemorySubmitter {
    async fn submit_line(&self, request: &OutboundRequest) -> EngineResult<()> {
        if self.rejected_locations.lock().await.contains(&request.location) {
            return Err(EngineError::SubmitFailed {
                sku: request.sku.clone(),
                location: request.location.clone(),
                reason: "simulated backend rejection".into(),
            });
        }

        self.accepted.lock().await.push(request.clone());
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
