//! Tracing subscriber setup. Grounded on the teacher's `logging.rs`
//! (`EnvFilter` falling back to a crate-scoped default, a compact
//! `FmtSubscriber`), adapted to take the resolved `--loglevel`/`-v`/`-q`
//! flags instead of a hardcoded `RUST_LOG` default.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::LogLevel;

/// Resolves `--loglevel` plus repeatable `-v`/`-q` into a single level,
/// then initializes the global `tracing` subscriber. `RUST_LOG`, if set,
/// always wins (matches the teacher's `try_from_default_env` precedence).
pub fn init_logging(base: LogLevel, verbose: u8, quiet: u8) -> Result<(), Box<dyn std::error::Error>> {
    let levels = ["error", "warn", "info", "debug", "trace"];
    let base_idx = levels.iter().position(|l| *l == base.as_filter_str()).unwrap_or(2);
    let shifted = (base_idx as i64 + verbose as i64 - quiet as i64).clamp(0, levels.len() as i64 - 1) as usize;
    let resolved = levels[shifted];

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("dht_sim={resolved}")));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;

    tracing::debug!(level = resolved, "logging initialized");
    Ok(())
}
