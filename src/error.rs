//! Error taxonomy (SPEC_FULL.md §7).
//!
//! Grounded on the teacher's `governance.rs`/`secure_transport.rs` style --
//! a `thiserror`-derived enum rather than the hand-written `impl
//! fmt::Display` the teacher's own top-level `error.rs` used -- because the
//! derive is the idiom the rest of the pack reaches for and there is no
//! reason here to hand-roll `Display`/`Error` impls.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// A request's reply never arrived within the node's `max_timeout`.
    #[error("peer request timed out")]
    PeerTimeout,

    /// A client's end-to-end request never completed within its deadline.
    #[error("client request started at t={start_time} timed out")]
    ClientTimeout { start_time: f64 },

    /// A CLI flag or derived parameter is out of range (exit code 2, per
    /// SPEC_FULL.md §6).
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize trace: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;
