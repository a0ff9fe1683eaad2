//! # tatylu-report
//!
//! Generates a sales report snapshot from the order database and prints it
//! as JSON.
//!
//! ## Usage
//! ```bash
//! # Generate and save a snapshot
//! cargo run -p tatylu-orders --bin tatylu-report
//!
//! # Print without saving
//! cargo run -p tatylu-orders --bin tatylu-report -- --no-save
//!
//! # Another database
//! DATABASE_PATH=/tmp/tatylu.db cargo run -p tatylu-orders --bin tatylu-report
//! ```

use std::sync::Arc;

use tracing::info;

use tatylu_db::{Database, DbConfig};
use tatylu_orders::{init_tracing, LogMailer, OrderConfig, OrderService, PostCommitNotifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut save = true;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--no-save" => save = false,
            "--help" | "-h" => {
                println!("Usage: tatylu-report [--no-save]");
                println!();
                println!("Environment:");
                println!("  DATABASE_PATH   SQLite database file (default: ./tatylu.db)");
                println!("  RUST_LOG        Log filter");
                return Ok(());
            }
            other => return Err(format!("Unknown argument: {}", other).into()),
        }
    }

    let config = OrderConfig::load()?;
    info!(database = %config.database_path, "Opening order database");

    let db = Database::new(DbConfig::new(&config.database_path)).await?;
    let notifier = PostCommitNotifier::spawn(
        Arc::new(LogMailer),
        config.email_from.clone(),
        config.notification_queue_capacity,
    );
    let service = OrderService::new(db.clone(), config, notifier.clone());

    let snapshot = service.generate_report(save).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    notifier.shutdown().await;
    db.close().await;
    Ok(())
}
