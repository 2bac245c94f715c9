//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise open -> add batch -> allocate -> commit -> get against a real
//!   SQLite database.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `allocation [DB_PATH]` (in-memory when omitted). Set
//! `ALLOCATION_LOG_DIR` to an absolute path to enable file logging.

use allocation_core::db::{open_db, open_db_in_memory};
use allocation_core::{
    core_version, default_log_level, init_logging, AllocationService, BatchRepository,
    SqliteBatchRepository,
};
use std::error::Error;
use std::process::ExitCode;

const DEMO_BATCH: &str = "batch-001";
const DEMO_SKU: &str = "SMALL-TABLE";
const DEMO_ORDER: &str = "order-001";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("allocation error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("ALLOCATION_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    let mut conn = match std::env::args().nth(1) {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };

    let tx = conn.transaction()?;
    let reference = {
        let service = AllocationService::new(SqliteBatchRepository::try_new(&tx)?);
        service.add_batch(DEMO_BATCH, DEMO_SKU, 20, None)?;
        service.allocate(DEMO_ORDER, DEMO_SKU, 2)?
    };
    tx.commit()?;

    let batch = SqliteBatchRepository::try_new(&conn)?.get(&reference)?;
    let mut orders: Vec<&str> = batch
        .allocations()
        .iter()
        .map(|line| line.orderid.as_str())
        .collect();
    orders.sort_unstable();

    println!("allocation_core version={}", core_version());
    println!(
        "batch reference={} sku={} available={} allocations={}",
        batch.reference,
        batch.sku,
        batch.available_quantity(),
        orders.join(",")
    );
    Ok(())
}
