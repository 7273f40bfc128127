//! # Cart Service
//!
//! The single logical owner of the pending outbound cart. Every mutation
//! is a command on its channel and is applied serially by one task.
//!
//! ## Ownership Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       CartService Ownership                             │
//! │                                                                         │
//! │  ScanIntake ───┐                                                        │
//! │                │   commands (mpsc)   ┌──────────────────────────────┐   │
//! │  UI edits ─────┼────────────────────►│  CartService task            │   │
//! │                │                     │                              │   │
//! │  Redistribution┘                     │  • owns CartStore            │   │
//! │  lookups (spawned,                   │  • applies mutations one     │   │
//! │  results marshalled                  │    at a time                 │   │
//! │  back as commands)                   │  • merge pass after every    │   │
//! │                                      │    mutation                  │   │
//! │                                      │  • per-key epochs drop stale │   │
//! │                                      │    lookup results            │   │
//! │                                      └──────────────────────────────┘   │
//! │                                                                         │
//! │  Serializing mutations here is what prevents a lost update between a    │
//! │  scan-triggered allocation and a concurrent manual edit.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use outbound_core::{
    allocate, AllocationRequest, CartLine, CartSnapshot, CartStore, CoreError, LocationStock,
    MergeKey, UpdateOutcome,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::locator::{locate_with_timeout, StockLocator};
use crate::reconcile::Reconciler;
use crate::submit::{FailedLine, OutboundRequest, OutboundSubmitter, SubmissionReport};

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Trait for surfacing cart signals to a UI layer.
pub trait OutboundEventEmitter: Send + Sync {
    /// The cart contents changed.
    fn cart_changed(&self, snapshot: &CartSnapshot);

    /// An edit was clamped to the known location cap.
    fn quantity_capped(&self, key: &MergeKey, requested: i64, cap: i64);

    /// An allocation covered only part of the requested quantity
    /// ("allocated 29 of 50 requested").
    fn partial_allocation(&self, sku: &str, allocated: i64, shortfall: i64);

    /// A stock query failed; allocation proceeded with zero known stock.
    fn stock_query_failed(&self, sku: &str, reason: &str);
}

/// No-op event emitter for headless use and tests.
pub struct NoOpEmitter;

impl OutboundEventEmitter for NoOpEmitter {
    fn cart_changed(&self, _snapshot: &CartSnapshot) {}
    fn quantity_capped(&self, _key: &MergeKey, _requested: i64, _cap: i64) {}
    fn partial_allocation(&self, _sku: &str, _allocated: i64, _shortfall: i64) {}
    fn stock_query_failed(&self, _sku: &str, _reason: &str) {}
}

// =============================================================================
// Edit Outcome
// =============================================================================

/// Result of a quantity edit as seen by the caller.
///
/// Over-cap edits always take the redistribution path, so the direct
/// answer is never a clamp; when a redistribution lookup later fails and
/// the edit degrades to a clamp, that surfaces through
/// [`OutboundEventEmitter::quantity_capped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum EditOutcome {
    /// Applied as requested.
    Applied { quantity: i64 },

    /// The edit exceeded the line's location cap; the group is being
    /// re-spread across locations against a fresh stock snapshot.
    Redistributing { requested: i64 },
}

// =============================================================================
// Commands
// =============================================================================

enum CartCommand {
    /// A scan completed its lookup pipeline; allocate and add.
    CommitScan {
        request: AllocationRequest,
        stocks: Vec<LocationStock>,
        query_failed: bool,
    },

    /// A manual line add (UI pick of sku/location/quantity).
    AddLine {
        line: CartLine,
        respond: oneshot::Sender<EngineResult<()>>,
    },

    UpdateQuantity {
        key: MergeKey,
        quantity: i64,
        respond: oneshot::Sender<EngineResult<EditOutcome>>,
    },

    /// A redistribution lookup finished; apply unless stale.
    CommitRedistribution {
        key: MergeKey,
        desired_quantity: i64,
        stocks: EngineResult<Vec<LocationStock>>,
        epoch: u64,
    },

    Remove {
        key: MergeKey,
        respond: oneshot::Sender<bool>,
    },

    Clear {
        respond: oneshot::Sender<()>,
    },

    Snapshot {
        respond: oneshot::Sender<CartSnapshot>,
    },

    Submit {
        respond: oneshot::Sender<EngineResult<SubmissionReport>>,
    },

    Shutdown,
}

// =============================================================================
// Cart Service
// =============================================================================

/// Owner task for all cart mutations.
pub struct CartService {
    config: Arc<EngineConfig>,
    locator: Arc<dyn StockLocator>,
    submitter: Arc<dyn OutboundSubmitter>,
    emitter: Arc<dyn OutboundEventEmitter>,
    reconciler: Reconciler,
    cart: CartStore,

    /// Per-merge-key epochs, bumped whenever a mutation deletes or
    /// rebuilds the line behind that key. An in-flight redistribution
    /// lookup captures its line's epoch at scheduling time; a mismatch at
    /// commit means the line was deleted or rebuilt meanwhile and the
    /// result is discarded. Mutations to unrelated lines leave the epoch
    /// alone, so they never cancel a valid edit.
    line_epochs: HashMap<MergeKey, u64>,

    command_rx: mpsc::Receiver<CartCommand>,
    command_tx: mpsc::Sender<CartCommand>,
}

/// Handle for driving a running CartService.
#[derive(Clone)]
pub struct CartServiceHandle {
    command_tx: mpsc::Sender<CartCommand>,
}

impl CartService {
    /// Creates a service and its handle.
    pub fn new(
        config: Arc<EngineConfig>,
        locator: Arc<dyn StockLocator>,
        submitter: Arc<dyn OutboundSubmitter>,
    ) -> (Self, CartServiceHandle) {
        Self::with_emitter(config, locator, submitter, Arc::new(NoOpEmitter))
    }

    /// Creates a service with a custom event emitter.
    pub fn with_emitter(
        config: Arc<EngineConfig>,
        locator: Arc<dyn StockLocator>,
        submitter: Arc<dyn OutboundSubmitter>,
        emitter: Arc<dyn OutboundEventEmitter>,
    ) -> (Self, CartServiceHandle) {
        let (command_tx, command_rx) = mpsc::channel(64);

        let service = CartService {
            reconciler: Reconciler::new(config.allocation.order),
            config,
            locator,
            submitter,
            emitter,
            cart: CartStore::new(),
            line_epochs: HashMap::new(),
            command_rx,
            command_tx: command_tx.clone(),
        };

        let handle = CartServiceHandle { command_tx };
        (service, handle)
    }

    /// Runs the command loop. Spawn this as a background task.
    pub async fn run(mut self) {
        info!("Cart service starting");

        while let Some(command) = self.command_rx.recv().await {
            match command {
                CartCommand::CommitScan {
                    request,
                    stocks,
                    query_failed,
                } => self.handle_commit_scan(request, stocks, query_failed),

                CartCommand::AddLine { line, respond } => {
                    let result = self.handle_add_line(line);
                    let _ = respond.send(result);
                }

                CartCommand::UpdateQuantity {
                    key,
                    quantity,
                    respond,
                } => {
                    let result = self.handle_update_quantity(key, quantity);
                    let _ = respond.send(result);
                }

                CartCommand::CommitRedistribution {
                    key,
                    desired_quantity,
                    stocks,
                    epoch,
                } => self.handle_commit_redistribution(key, desired_quantity, stocks, epoch),

                CartCommand::Remove { key, respond } => {
                    let removed = self.cart.remove(&key).is_some();
                    if removed {
                        self.bump_epoch(&key);
                        debug!(%key, "Removed cart line");
                        self.after_mutation();
                    }
                    let _ = respond.send(removed);
                }

                CartCommand::Clear { respond } => {
                    let keys: Vec<MergeKey> =
                        self.cart.lines().iter().map(|l| l.merge_key()).collect();
                    self.cart.clear();
                    for key in &keys {
                        self.bump_epoch(key);
                    }
                    info!("Cart cleared");
                    self.after_mutation();
                    let _ = respond.send(());
                }

                CartCommand::Snapshot { respond } => {
                    let _ = respond.send(self.cart.snapshot());
                }

                CartCommand::Submit { respond } => {
                    let result = self.handle_submit().await;
                    let _ = respond.send(result);
                }

                CartCommand::Shutdown => {
                    info!("Cart service shutting down");
                    break;
                }
            }
        }

        info!("Cart service stopped");
    }

    /// Merge pass + change notification, run after every mutation.
    fn after_mutation(&mut self) {
        self.reconciler.merge(&mut self.cart);
        self.emitter.cart_changed(&self.cart.snapshot());
    }

    fn epoch_of(&self, key: &MergeKey) -> u64 {
        self.line_epochs.get(key).copied().unwrap_or(0)
    }

    fn bump_epoch(&mut self, key: &MergeKey) {
        *self.line_epochs.entry(key.clone()).or_insert(0) += 1;
    }

    // -------------------------------------------------------------------------
    // Scan commits
    // -------------------------------------------------------------------------

    fn handle_commit_scan(
        &mut self,
        request: AllocationRequest,
        stocks: Vec<LocationStock>,
        query_failed: bool,
    ) {
        if query_failed {
            warn!(sku = %request.sku, "Stock query failed, allocating against zero known stock");
            self.emitter
                .stock_query_failed(&request.sku, "stock query failed");
        } else {
            self.cart.set_stock_caps(&request.sku, &stocks);
        }

        let result = match allocate(&request, &stocks, self.config.allocation.order) {
            Ok(result) => result,
            Err(e) => {
                error!(sku = %request.sku, error = %e, "Scan allocation rejected");
                return;
            }
        };

        // Reverse so the first consumed location ends up frontmost.
        for line in result.lines.iter().rev() {
            if let Err(e) = self.cart.add(line.clone()) {
                error!(sku = %line.sku, error = %e, "Failed to add allocated line");
            }
        }

        if result.shortfall > 0 {
            info!(
                sku = %request.sku,
                allocated = result.total_allocated,
                shortfall = result.shortfall,
                "Partial allocation"
            );
            self.emitter
                .partial_allocation(&request.sku, result.total_allocated, result.shortfall);
        }

        self.after_mutation();
    }

    fn handle_add_line(&mut self, line: CartLine) -> EngineResult<()> {
        self.cart.add(line)?;
        self.after_mutation();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Quantity edits
    // -------------------------------------------------------------------------

    fn handle_update_quantity(
        &mut self,
        key: MergeKey,
        quantity: i64,
    ) -> EngineResult<EditOutcome> {
        if quantity <= 0 {
            return Err(CoreError::invalid_quantity(quantity, format!("edit of {key}")).into());
        }

        if self.cart.get(&key).is_none() {
            return Err(CoreError::LineNotFound { key }.into());
        }

        // Over the line's location cap → the location cannot supply the
        // edit alone; schedule a redistribution against fresh stock.
        if let Some(cap) = self.cart.cap_for(&key.sku, &key.location) {
            if quantity > cap {
                self.schedule_redistribution(key, quantity);
                return Ok(EditOutcome::Redistributing {
                    requested: quantity,
                });
            }
        }

        let outcome = self.cart.update_quantity(&key, quantity)?;
        self.after_mutation();

        // The cap table behind cap_for is the same one the store clamps
        // against, so an edit that passed the check above applies verbatim.
        let applied = match outcome {
            UpdateOutcome::Applied { quantity } => quantity,
            UpdateOutcome::Capped { cap, .. } => cap,
        };
        Ok(EditOutcome::Applied { quantity: applied })
    }

    /// Spawns the redistribution lookup; the result is marshalled back as
    /// a command and applied by this task, unless the cart moved on.
    fn schedule_redistribution(&self, key: MergeKey, desired_quantity: i64) {
        let locator = self.locator.clone();
        let command_tx = self.command_tx.clone();
        let timeout_ms = self.config.stock.query_timeout_ms;
        let epoch = self.epoch_of(&key);

        info!(%key, desired_quantity, "Scheduling redistribution");

        tokio::spawn(async move {
            let stocks = locate_with_timeout(&locator, &key.sku, timeout_ms).await;
            let command = CartCommand::CommitRedistribution {
                key,
                desired_quantity,
                stocks,
                epoch,
            };
            if command_tx.send(command).await.is_err() {
                debug!("Cart service gone, dropping redistribution result");
            }
        });
    }

    fn handle_commit_redistribution(
        &mut self,
        key: MergeKey,
        desired_quantity: i64,
        stocks: EngineResult<Vec<LocationStock>>,
        epoch: u64,
    ) {
        // The line was deleted or rebuilt since the lookup was scheduled.
        if epoch != self.epoch_of(&key) {
            warn!(%key, "Discarding stale redistribution result");
            return;
        }

        let stocks = match stocks {
            Ok(stocks) => stocks,
            Err(e) => {
                // Degrade: keep the group, clamp the edit to the known cap.
                warn!(%key, error = %e, "Redistribution lookup failed, clamping edit instead");
                self.emitter.stock_query_failed(&key.sku, &e.to_string());

                match self.cart.update_quantity(&key, desired_quantity) {
                    Ok(UpdateOutcome::Capped { requested, cap }) => {
                        self.emitter.quantity_capped(&key, requested, cap);
                    }
                    Ok(UpdateOutcome::Applied { .. }) => {}
                    Err(e) => {
                        warn!(%key, error = %e, "Clamp fallback skipped");
                        return;
                    }
                }
                self.after_mutation();
                return;
            }
        };

        // The whole group is about to be removed and rebuilt, so any other
        // in-flight lookup for a sibling line becomes stale too.
        let group_keys: Vec<MergeKey> = self
            .cart
            .lines()
            .iter()
            .filter(|l| l.sku == key.sku && l.color == key.color && l.size == key.size)
            .map(|l| l.merge_key())
            .collect();

        match self
            .reconciler
            .redistribute(&mut self.cart, &key, desired_quantity, &stocks)
        {
            Ok(result) => {
                for group_key in &group_keys {
                    self.bump_epoch(group_key);
                }
                if result.shortfall > 0 {
                    self.emitter.partial_allocation(
                        &key.sku,
                        result.total_allocated,
                        result.shortfall,
                    );
                }
                self.emitter.cart_changed(&self.cart.snapshot());
            }
            Err(CoreError::LineNotFound { key }) => {
                warn!(%key, "Edited line vanished before redistribution, discarding");
            }
            Err(e) => {
                error!(%key, error = %e, "Redistribution failed");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Submission
    // -------------------------------------------------------------------------

    /// Submits every line, oldest first, one independent mutation per line.
    async fn handle_submit(&mut self) -> EngineResult<SubmissionReport> {
        let lines: Vec<CartLine> = self.cart.lines().iter().rev().cloned().collect();
        let mut report = SubmissionReport {
            submitted: lines.len(),
            ..Default::default()
        };

        info!(lines = lines.len(), "Submitting cart");

        for line in lines {
            let request = OutboundRequest::from_line(&line, &self.config.session.operator_id);
            match self.submitter.submit_line(&request).await {
                Ok(()) => {
                    self.cart.remove_by_id(&line.id);
                    self.bump_epoch(&line.merge_key());
                    report.succeeded.push(line.id);
                }
                Err(e) => {
                    warn!(
                        sku = %line.sku,
                        location = %line.location,
                        error = %e,
                        "Line submission failed, keeping line in cart"
                    );
                    report.failed.push(FailedLine {
                        line,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.is_complete() {
            self.cart.clear();
            info!(submitted = report.submitted, "Cart submitted in full");
        } else {
            warn!(
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Partial submission, failed lines kept for retry"
            );
        }

        self.after_mutation();
        Ok(report)
    }
}

// =============================================================================
// Handle
// =============================================================================

impl CartServiceHandle {
    /// Marshals a completed scan lookup onto the owner task.
    pub(crate) async fn commit_scan(
        &self,
        request: AllocationRequest,
        stocks: Vec<LocationStock>,
        query_failed: bool,
    ) -> EngineResult<()> {
        self.command_tx
            .send(CartCommand::CommitScan {
                request,
                stocks,
                query_failed,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed("cart command channel".into()))
    }

    /// Adds a manually composed line (UI pick of sku/location/quantity).
    pub async fn add_line(&self, line: CartLine) -> EngineResult<()> {
        let (respond, rx) = oneshot::channel();
        self.send(CartCommand::AddLine { line, respond }).await?;
        self.recv(rx).await?
    }

    /// Sets a line's quantity. Over-cap edits trigger redistribution.
    pub async fn update_quantity(
        &self,
        key: MergeKey,
        quantity: i64,
    ) -> EngineResult<EditOutcome> {
        let (respond, rx) = oneshot::channel();
        self.send(CartCommand::UpdateQuantity {
            key,
            quantity,
            respond,
        })
        .await?;
        self.recv(rx).await?
    }

    /// Removes a line. Returns whether anything was removed.
    pub async fn remove(&self, key: MergeKey) -> EngineResult<bool> {
        let (respond, rx) = oneshot::channel();
        self.send(CartCommand::Remove { key, respond }).await?;
        self.recv(rx).await
    }

    /// Empties the cart.
    pub async fn clear(&self) -> EngineResult<()> {
        let (respond, rx) = oneshot::channel();
        self.send(CartCommand::Clear { respond }).await?;
        self.recv(rx).await
    }

    /// Current cart contents.
    pub async fn snapshot(&self) -> EngineResult<CartSnapshot> {
        let (respond, rx) = oneshot::channel();
        self.send(CartCommand::Snapshot { respond }).await?;
        self.recv(rx).await
    }

    /// Submits every line and reports per-line outcomes.
    pub async fn submit(&self) -> EngineResult<SubmissionReport> {
        let (respond, rx) = oneshot::channel();
        self.send(CartCommand::Submit { respond }).await?;
        self.recv(rx).await?
    }

    /// Stops the service loop.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(CartCommand::Shutdown).await;
    }

    async fn send(&self, command: CartCommand) -> EngineResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| EngineError::ChannelClosed("cart command channel".into()))
    }

    async fn recv<T>(&self, rx: oneshot::Receiver<T>) -> EngineResult<T> {
        rx.await
            .map_err(|_| EngineError::ChannelClosed("cart response channel".into()))
    }
}

// =============================================================================
// Tests
// =============================================================================
