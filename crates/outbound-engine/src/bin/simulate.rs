//! # Outbound Pipeline Simulator
//!
//! Drives the full scan-to-submission pipeline against in-memory stock,
//! for development and demos.
//!
//! ## Usage
//! ```bash
//! # Run the scripted scenario
//! cargo run -p outbound-engine --bin simulate
//!
//! # With a config file
//! cargo run -p outbound-engine --bin simulate -- --config ./outbound.toml
//!
//! # Verbose engine logs
//! RUST_LOG=debug cargo run -p outbound-engine --bin simulate
//! ```
//!
//! ## Scenario
//! 1. Seed per-location stock for a few SKUs
//! 2. Scan a parseable code twice (second within the bounce window)
//! 3. Scan an opaque code that resolves remotely
//! 4. Scan a code with no stock anywhere (full shortfall)
//! 5. Edit a line past its location cap (triggers redistribution)
//! 6. Submit, with one location rejected by the backend

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use outbound_core::{LocationStock, MergeKey, ParsedCode};
use outbound_engine::{
    CartService, EngineConfig, MemoryStockLocator, MemorySubmitter, ScanIntake,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Outbound Pipeline Simulator");
                println!();
                println!("Usage: simulate [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Engine config file (TOML)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = Arc::new(EngineConfig::load(config_path.as_deref())?);

    println!("📦 Outbound Pipeline Simulator");
    println!("==============================");
    println!("Operator: {}", config.session.operator_id);
    println!();

    // Seed in-memory stock
    let locator = Arc::new(MemoryStockLocator::new());
    locator
        .set_stock(
            "129092-黄色-XXL",
            vec![
                LocationStock::new("A-03-12", 13),
                LocationStock::new("B-01-04", 8),
                LocationStock::new("C-07-09", 5),
                LocationStock::new("D-02-01", 3),
            ],
        )
        .await;
    locator
        .set_stock("233104-red-M", vec![LocationStock::new("A-05-02", 40)])
        .await;
    locator
        .set_code("6941428", ParsedCode::new("233104", "red", "M"))
        .await;

    println!("✓ Seeded stock for 2 SKUs across 5 locations");

    // Backend that rejects one location, to show a partial submission
    let submitter = Arc::new(MemorySubmitter::new());
    submitter.reject_location("B-01-04").await;

    let (service, cart) = CartService::new(config.clone(), locator.clone(), submitter.clone());
    tokio::spawn(service.run());

    let (intake, scanner) = ScanIntake::new(config, locator, cart.clone());
    tokio::spawn(intake.run());

    println!("✓ Cart service and scan intake running");
    println!();

    // --- Scans ---------------------------------------------------------------

    println!("▶ Scanning 129092-黄色-XXL twice in quick succession (bounce)");
    scanner.scan("129092-黄色-XXL").await?;
    scanner.scan("129092-黄色-XXL").await?;

    println!("▶ Scanning opaque code 6941428 (resolves remotely)");
    scanner.scan("6941428").await?;

    println!("▶ Scanning 999999-blue-S (no stock anywhere)");
    scanner.scan("999999-blue-S").await?;

    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = cart.snapshot().await?;
    println!();
    println!("Cart after scans ({} lines):", snapshot.line_count);
    for line in &snapshot.lines {
        println!(
            "  {:<18} {:>3} × {:<10} ({}/{})",
            line.sku, line.quantity, line.location, line.color, line.size
        );
    }

    // --- Over-cap edit -------------------------------------------------------

    println!();
    println!("▶ Editing 129092-黄色-XXL @ A-03-12 to 25 units (cap is 13)");
    let key = MergeKey::new("129092-黄色-XXL", "A-03-12", "黄色", "XXL");
    let outcome = cart.update_quantity(key, 25).await?;
    println!("  Edit outcome: {outcome:?}");

    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = cart.snapshot().await?;
    println!();
    println!("Cart after redistribution ({} lines):", snapshot.line_count);
    for line in &snapshot.lines {
        println!(
            "  {:<18} {:>3} × {:<10}",
            line.sku, line.quantity, line.location
        );
    }

    // --- Submission ----------------------------------------------------------

    println!();
    println!("▶ Submitting cart (backend rejects location B-01-04)");
    let report = cart.submit().await?;

    println!();
    println!(
        "Submission: {} attempted, {} succeeded, {} failed",
        report.submitted,
        report.succeeded.len(),
        report.failed.len()
    );
    for failed in &report.failed {
        println!(
            "  ⚠ kept in cart: {} @ {} ({})",
            failed.line.sku, failed.line.location, failed.reason
        );
    }

    let snapshot = cart.snapshot().await?;
    println!();
    if report.is_complete() {
        println!("✓ Cart cleared after full submission");
    } else {
        println!(
            "⚠ Partial submission: {} line(s) kept for retry",
            snapshot.line_count
        );
    }

    println!();
    println!("Accepted by backend:");
    for request in submitter.accepted().await {
        println!(
            "  {:<18} {:>3} × {:<10} operator={}",
            request.sku, request.quantity, request.location, request.operator_id
        );
    }

    cart.shutdown().await;
    println!();
    println!("✓ Simulation complete");

    Ok(())
}
