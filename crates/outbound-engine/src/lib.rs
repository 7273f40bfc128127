//! # outbound-engine: Async Runtime for the Outbound Allocation Pipeline
//!
//! This crate wires the pure logic of `outbound-core` into a running
//! pipeline: scanner events in, allocated cart mutations and outbound
//! submissions out.
//!
//! ## Pipeline Topology
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        outbound-engine Topology                         │
//! │                                                                         │
//! │   scanner stream                                                        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   ┌──────────┐  dedup + bounded   ┌─────────────┐                       │
//! │   │ScanIntake│──spawned lookups──►│StockLocator │ (async boundary)      │
//! │   └──────────┘                    └──────┬──────┘                       │
//! │                                          │ stocks                       │
//! │                                          ▼                              │
//! │                                   ┌─────────────┐                       │
//! │   UI edits ──────commands────────►│ CartService │ single owner task     │
//! │                                   └──────┬──────┘                       │
//! │                                          │ submit                       │
//! │                                          ▼                              │
//! │                                   ┌─────────────┐                       │
//! │                                   │  Submitter  │ (async boundary)      │
//! │                                   └─────────────┘                       │
//! │                                                                         │
//! │   All cart state lives inside the CartService task. Everything else     │
//! │   talks to it through its handle.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - TOML + environment configuration
//! - [`intake`] - Scanner stream intake (dedup, lookup bounding)
//! - [`locator`] - Stock locator boundary and timeout handling
//! - [`cart_service`] - The cart owner task and its handle
//! - [`reconcile`] - Merge passes and cross-location redistribution
//! - [`submit`] - Outbound submission boundary and reporting
//! - [`error`] - Engine error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart_service;
pub mod config;
pub mod error;
pub mod intake;
pub mod locator;
pub mod reconcile;
pub mod submit;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart_service::{
    CartService, CartServiceHandle, EditOutcome, NoOpEmitter, OutboundEventEmitter,
};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use intake::{ScanIntake, ScanIntakeHandle};
pub use locator::{locate_with_timeout, MemoryStockLocator, StockLocator};
pub use reconcile::Reconciler;
pub use submit::{
    FailedLine, MemorySubmitter, OutboundRequest, OutboundSubmitter, SubmissionReport,
};
