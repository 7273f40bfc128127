//! # Engine Configuration
//!
//! Configuration for the outbound pipeline.
//!
//! ## Design
//! Session context (operator id) and tuning knobs are carried in an
//! explicit config object passed into intake and the cart service at
//! construction time; there is no global mutable session state.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     OUTBOUND_OPERATOR_ID=op-042                                        │
//! │     OUTBOUND_STOCK_TIMEOUT_MS=5000                                     │
//! │                                                                         │
//! │  2. TOML Config File (outbound.toml)                                   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # outbound.toml
//! [session]
//! operator_id = "op-042"
//!
//! [scan]
//! dedup_window_ms = 100      # identical scans inside this window are noise
//! max_inflight_lookups = 10  # concurrent stock lookups; excess scans wait
//! default_quantity = 1       # units requested per accepted scan
//!
//! [stock]
//! query_timeout_ms = 3000
//!
//! [allocation]
//! order = "largest_first"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use outbound_core::AllocationOrder;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session context for this operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Operator identifier stamped onto every submitted line.
    #[serde(default = "default_operator_id")]
    pub operator_id: String,
}

fn default_operator_id() -> String {
    "unknown-operator".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            operator_id: default_operator_id(),
        }
    }
}

// =============================================================================
// Scan Settings
// =============================================================================

/// Scan intake behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// An identical code within this window of the previous scan is
    /// treated as repeated transport noise and ignored. A true rescan
    /// after the window is always accepted.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_ms: u64,

    /// Bound on simultaneous stock lookups. Scans beyond the bound are
    /// deferred, never dropped, so burst input survives.
    #[serde(default = "default_max_inflight")]
    pub max_inflight_lookups: usize,

    /// Units requested per accepted scan.
    #[serde(default = "default_scan_quantity")]
    pub default_quantity: i64,
}

fn default_dedup_window() -> u64 {
    100
}
fn default_max_inflight() -> usize {
    10
}
fn default_scan_quantity() -> i64 {
    1
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            dedup_window_ms: default_dedup_window(),
            max_inflight_lookups: default_max_inflight(),
            default_quantity: default_scan_quantity(),
        }
    }
}

// =============================================================================
// Stock Settings
// =============================================================================

/// Stock locator behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSettings {
    /// Explicit timeout on every stock query. On timeout the allocation
    /// proceeds against zero known stock rather than hanging.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_ms: u64,
}

fn default_query_timeout() -> u64 {
    3000
}

impl Default for StockSettings {
    fn default() -> Self {
        StockSettings {
            query_timeout_ms: default_query_timeout(),
        }
    }
}

// =============================================================================
// Allocation Settings
// =============================================================================

/// Allocation policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationSettings {
    /// Location consumption order.
    #[serde(default)]
    pub order: AllocationOrder,
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Session context.
    #[serde(default)]
    pub session: SessionConfig,

    /// Scan intake settings.
    #[serde(default)]
    pub scan: ScanSettings,

    /// Stock locator settings.
    #[serde(default)]
    pub stock: StockSettings,

    /// Allocation policy.
    #[serde(default)]
    pub allocation: AllocationSettings,
}

impl EngineConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file
    /// 3. Environment variables
    pub fn load(config_path: Option<&Path>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| EngineError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)
                    .map_err(|e| EngineError::ConfigLoadFailed(e.to_string()))?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.session.operator_id.is_empty() {
            return Err(EngineError::InvalidConfig(
                "operator_id must not be empty".into(),
            ));
        }

        if self.scan.max_inflight_lookups == 0 {
            return Err(EngineError::InvalidConfig(
                "max_inflight_lookups must be greater than 0".into(),
            ));
        }

        if self.scan.default_quantity <= 0 {
            return Err(EngineError::InvalidConfig(
                "default_quantity must be positive".into(),
            ));
        }

        if self.stock.query_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "query_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("OUTBOUND_OPERATOR_ID") {
            debug!(operator_id = %id, "Overriding operator id from environment");
            self.session.operator_id = id;
        }

        if let Ok(ms) = std::env::var("OUTBOUND_STOCK_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                debug!(timeout_ms = ms, "Overriding stock timeout from environment");
                self.stock.query_timeout_ms = ms;
            }
        }

        if let Ok(ms) = std::env::var("OUTBOUND_DEDUP_WINDOW_MS") {
            if let Ok(ms) = ms.parse() {
                debug!(window_ms = ms, "Overriding dedup window from environment");
                self.scan.dedup_window_ms = ms;
            }
        }

        if let Ok(n) = std::env::var("OUTBOUND_MAX_INFLIGHT") {
            if let Ok(n) = n.parse() {
                debug!(max_inflight = n, "Overriding lookup bound from environment");
                self.scan.max_inflight_lookups = n;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_behavior() {
        let config = EngineConfig::default();
        assert_eq!(config.scan.dedup_window_ms, 100);
        assert_eq!(config.scan.max_inflight_lookups, 10);
        assert_eq!(config.scan.default_quantity, 1);
        assert_eq!(config.stock.query_timeout_ms, 3000);
        assert_eq!(config.allocation.order, AllocationOrder::LargestFirst);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_toml_with_partial_sections() {
        let config: EngineConfig = toml::from_str(
            r#"
            [session]
            operator_id = "op-042"

            [stock]
            query_timeout_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.session.operator_id, "op-042");
        assert_eq!(config.stock.query_timeout_ms, 500);
        // Unspecified sections keep defaults
        assert_eq!(config.scan.max_inflight_lookups, 10);
    }

    #[test]
    fn test_validate_rejects_zero_inflight_bound() {
        let mut config = EngineConfig::default();
        config.scan.max_inflight_lookups = 0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_positive_scan_quantity() {
        let mut config = EngineConfig::default();
        config.scan.default_quantity = 0;
        assert!(config.validate().is_err());
    }
}
