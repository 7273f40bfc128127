//! # Scan Intake
//!
//! Front door for the scanner stream. Debounces repeated codes, bounds
//! concurrent stock lookups, and hands completed lookups to the cart
//! service as allocation commits.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Scan Pipeline                                │
//! │                                                                     │
//! │  scanner ──► dedup window ──► semaphore permit ──► spawned lookup   │
//! │              (serial)         (defer, not drop)                      │
//! │                                                                     │
//! │  spawned lookup:                                                    │
//! │    parse code locally ── else ── resolve via locator                │
//! │    locate stock (with timeout; failure → zero known stock)          │
//! │    commit to cart service                                           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dedup happens in the serial intake loop, before any spawn, so two
//! identical bounce events can never both pass the window check.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use outbound_core::{parse_scan_code, AllocationRequest, ParsedCode, ScanEvent};

use crate::cart_service::CartServiceHandle;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::locator::{locate_with_timeout, StockLocator};

// =============================================================================
// Scan Intake
// =============================================================================

/// Consumes the scanner event stream and drives the per-scan pipeline.
pub struct ScanIntake {
    config: Arc<EngineConfig>,
    locator: Arc<dyn StockLocator>,
    cart: CartServiceHandle,

    /// Bounds in-flight lookups; acquired before spawning so overflow
    /// scans wait in the channel instead of being dropped.
    lookup_permits: Arc<Semaphore>,

    /// Last accepted timestamp per code, for the dedup window.
    last_accepted: HashMap<String, DateTime<Utc>>,

    event_rx: mpsc::Receiver<ScanEvent>,
}

/// Handle for feeding scans into a running intake.
#[derive(Clone)]
pub struct ScanIntakeHandle {
    event_tx: mpsc::Sender<ScanEvent>,
}

impl ScanIntake {
    /// Creates an intake and its handle.
    pub fn new(
        config: Arc<EngineConfig>,
        locator: Arc<dyn StockLocator>,
        cart: CartServiceHandle,
    ) -> (Self, ScanIntakeHandle) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let lookup_permits = Arc::new(Semaphore::new(config.scan.max_inflight_lookups));

        let intake = ScanIntake {
            config,
            locator,
            cart,
            lookup_permits,
            last_accepted: HashMap::new(),
            event_rx,
        };

        (intake, ScanIntakeHandle { event_tx })
    }

    /// Runs the intake loop until the event channel closes.
    pub async fn run(mut self) {
        info!(
            dedup_window_ms = self.config.scan.dedup_window_ms,
            max_inflight = self.config.scan.max_inflight_lookups,
            "Scan intake starting"
        );

        while let Some(event) = self.event_rx.recv().await {
            if !self.accept(&event) {
                debug!(code = %event.code, "Dropping duplicate scan inside dedup window");
                continue;
            }

            // Waits here under burst load rather than shedding the scan.
            let permit = match self.lookup_permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            tokio::spawn(process_scan(
                event,
                self.config.clone(),
                self.locator.clone(),
                self.cart.clone(),
                permit,
            ));
        }

        info!("Scan intake stopped");
    }

    /// Records `event` as accepted unless an identical code already landed
    /// within the dedup window. Entries past the window can never dedup
    /// anything again, so they are evicted on the same pass to keep the
    /// map bounded over a long scanning session.
    fn accept(&mut self, event: &ScanEvent) -> bool {
        if self.is_duplicate(event) {
            return false;
        }

        let window = self.config.scan.dedup_window_ms as i64;
        self.last_accepted
            .retain(|_, seen| (event.received_at - *seen).num_milliseconds() < window);
        self.last_accepted
            .insert(event.code.clone(), event.received_at);
        true
    }

    /// True if an identical code was accepted within the dedup window.
    fn is_duplicate(&self, event: &ScanEvent) -> bool {
        let window = self.config.scan.dedup_window_ms as i64;
        match self.last_accepted.get(&event.code) {
            Some(previous) => {
                let elapsed = (event.received_at - *previous).num_milliseconds();
                elapsed >= 0 && elapsed < window
            }
            None => false,
        }
    }
}

/// The per-scan pipeline: resolve the code, look up stock, commit.
async fn process_scan(
    event: ScanEvent,
    config: Arc<EngineConfig>,
    locator: Arc<dyn StockLocator>,
    cart: CartServiceHandle,
    _permit: OwnedSemaphorePermit,
) {
    let parsed = match resolve_code(&event.code, &locator).await {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(code = %event.code, error = %e, "Scan rejected: unresolvable code");
            return;
        }
    };

    let sku = parsed.sku();
    let request = AllocationRequest::from_parsed(&parsed, config.scan.default_quantity);

    let (stocks, query_failed) =
        match locate_with_timeout(&locator, &sku, config.stock.query_timeout_ms).await {
            Ok(stocks) => (stocks, false),
            Err(e) => {
                warn!(%sku, error = %e, "Stock lookup failed for scan");
                (Vec::new(), true)
            }
        };

    if let Err(e) = cart.commit_scan(request, stocks, query_failed).await {
        warn!(%sku, error = %e, "Dropping scan commit: cart service gone");
    }
}

/// Splits the code locally; codes without the `product-color-size` shape
/// fall through to the remote resolver.
async fn resolve_code(
    code: &str,
    locator: &Arc<dyn StockLocator>,
) -> Result<ParsedCode, EngineError> {
    if let Some(parsed) = parse_scan_code(code) {
        return Ok(parsed);
    }
    debug!(%code, "Code not locally parseable, resolving remotely");
    locator.resolve_code(code).await
}

impl ScanIntakeHandle {
    /// Feeds one scan event. Applies backpressure when intake is behind.
    pub async fn scan_event(&self, event: ScanEvent) -> Result<(), EngineError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| EngineError::ChannelClosed("scan event channel".into()))
    }

    /// Feeds a raw code, stamped with the current time.
    pub async fn scan(&self, code: impl Into<String>) -> Result<(), EngineError> {
        self.scan_event(ScanEvent::new(code)).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart_service::CartService;
    use crate::locator::MemoryStockLocator;
    use crate::submit::MemorySubmitter;
    use chrono::Duration as ChronoDuration;
    use outbound_core::{CartSnapshot, LocationStock};
    use std::time::Duration;

    const SKU: &str = "129092-red-M";

    async fn spawn_pipeline() -> (ScanIntakeHandle, CartServiceHandle, Arc<MemoryStockLocator>)
    {
        let config = Arc::new(EngineConfig::default());
        let locator = Arc::new(MemoryStockLocator::new());
        let submitter = Arc::new(MemorySubmitter::new());

        let (service, cart) = CartService::new(config.clone(), locator.clone(), submitter);
        tokio::spawn(service.run());

        let (intake, handle) = ScanIntake::new(config, locator.clone(), cart.clone());
        tokio::spawn(intake.run());

        (handle, cart, locator)
    }

    async fn wait_for_total(cart: &CartServiceHandle, expected: i64) -> CartSnapshot {
        for _ in 0..200 {
            let snapshot = cart.snapshot().await.unwrap();
            if snapshot.total_quantity == expected {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cart never reached total quantity {expected}");
    }

    #[tokio::test]
    async fn test_scan_flows_into_cart() {
        let (intake, cart, locator) = spawn_pipeline().await;
        locator
            .set_stock(SKU, vec![LocationStock::new("L1", 10)])
            .await;

        intake.scan("129092-red-M").await.unwrap();

        let snapshot = wait_for_total(&cart, 1).await;
        assert_eq!(snapshot.lines[0].sku, SKU);
        assert_eq!(snapshot.lines[0].location, "L1");
    }

    #[tokio::test]
    async fn test_bounce_events_inside_window_are_dropped() {
        let (intake, cart, locator) = spawn_pipeline().await;
        locator
            .set_stock(SKU, vec![LocationStock::new("L1", 10)])
            .await;

        let first = ScanEvent::new("129092-red-M");
        let bounce = ScanEvent {
            code: first.code.clone(),
            received_at: first.received_at + ChronoDuration::milliseconds(30),
        };

        intake.scan_event(first).await.unwrap();
        intake.scan_event(bounce).await.unwrap();

        // Only the first event may land
        let snapshot = wait_for_total(&cart, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let settled = cart.snapshot().await.unwrap();
        assert_eq!(settled.total_quantity, snapshot.total_quantity);
        assert_eq!(settled.line_count, 1);
    }

    #[tokio::test]
    async fn test_rescan_after_window_accumulates() {
        let (intake, cart, locator) = spawn_pipeline().await;
        locator
            .set_stock(SKU, vec![LocationStock::new("L1", 10)])
            .await;

        let first = ScanEvent::new("129092-red-M");
        let rescan = ScanEvent {
            code: first.code.clone(),
            received_at: first.received_at + ChronoDuration::milliseconds(250),
        };

        intake.scan_event(first).await.unwrap();
        intake.scan_event(rescan).await.unwrap();

        let snapshot = wait_for_total(&cart, 2).await;
        assert_eq!(snapshot.line_count, 1);
        assert_eq!(snapshot.lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_unresolvable_code_is_skipped() {
        let (intake, cart, _) = spawn_pipeline().await;

        // Bare product code, no remote resolution registered
        intake.scan("129092").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = cart.snapshot().await.unwrap();
        assert_eq!(snapshot.line_count, 0);
    }

    #[tokio::test]
    async fn test_unparseable_code_resolves_remotely() {
        let (intake, cart, locator) = spawn_pipeline().await;
        let parsed = ParsedCode::new("129092", "red", "M");
        locator.set_code("9919817", parsed).await;
        locator
            .set_stock(SKU, vec![LocationStock::new("L1", 10)])
            .await;

        intake.scan("9919817").await.unwrap();

        let snapshot = wait_for_total(&cart, 1).await;
        assert_eq!(snapshot.lines[0].sku, SKU);
    }

    #[tokio::test]
    async fn test_failed_lookup_adds_nothing_but_does_not_crash() {
        let (intake, cart, locator) = spawn_pipeline().await;
        locator.fail_sku(SKU).await;

        intake.scan("129092-red-M").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Zero known stock → full shortfall, empty cart, intake still alive
        let snapshot = cart.snapshot().await.unwrap();
        assert_eq!(snapshot.line_count, 0);

        locator.recover_sku(SKU).await;
        locator
            .set_stock(SKU, vec![LocationStock::new("L1", 10)])
            .await;
        let rescan = ScanEvent {
            code: "129092-red-M".into(),
            received_at: Utc::now() + ChronoDuration::seconds(5),
        };
        intake.scan_event(rescan).await.unwrap();
        wait_for_total(&cart, 1).await;
    }

    #[test]
    fn test_dedup_map_evicts_expired_entries() {
        let config = Arc::new(EngineConfig::default());
        let locator = Arc::new(MemoryStockLocator::new());
        let submitter = Arc::new(MemorySubmitter::new());
        let (_service, cart) = CartService::new(config.clone(), locator.clone(), submitter);
        let (mut intake, _handle) = ScanIntake::new(config, locator, cart);

        // 50 distinct codes, 40ms apart: far more than fit in one 100ms
        // window, so old entries must have been evicted along the way
        let base = Utc::now();
        for i in 0..50 {
            let event = ScanEvent {
                code: format!("10{i:02}-red-M"),
                received_at: base + ChronoDuration::milliseconds(i * 40),
            };
            assert!(intake.accept(&event));
        }
        assert!(intake.last_accepted.len() <= 3);

        // Eviction never breaks dedup for codes still inside the window
        let bounce = ScanEvent {
            code: "1049-red-M".into(),
            received_at: base + ChronoDuration::milliseconds(49 * 40 + 30),
        };
        assert!(!intake.accept(&bounce));
    }

    #[tokio::test]
    async fn test_burst_of_distinct_codes_all_land() {
        let (intake, cart, locator) = spawn_pipeline().await;

        // More codes than lookup permits; none may be shed
        for i in 0..25 {
            let sku = format!("10{i:02}-red-M");
            locator
                .set_stock(&sku, vec![LocationStock::new("L1", 10)])
                .await;
            intake.scan(format!("10{i:02}-red-M")).await.unwrap();
        }

        let snapshot = wait_for_total(&cart, 25).await;
        assert_eq!(snapshot.line_count, 25);
    }
}
