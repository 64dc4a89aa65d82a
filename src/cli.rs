//! Command-line surface (spec.md §6), an external collaborator the core
//! does not depend on beyond producing a [`SimConfig`].
//!
//! Grounded on the teacher's `cli.rs`: a top-level `#[derive(Parser)]`
//! struct with `#[arg(long, default_value = "...")]` fields and
//! `ValueEnum` choices for closed options.

use clap::Parser;

use crate::config::{DhtKind, LogLevel, PlotExt};

#[derive(Parser, Debug, Clone)]
#[command(name = "dht-sim", about = "Discrete-event simulator for Chord and Kademlia under churn")]
pub struct Cli {
    /// Random seed. If omitted, one is drawn from the OS RNG and logged
    /// (see `--seed-log`) so the run can be reproduced afterwards.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Bootstrap population size.
    #[arg(long, default_value_t = 16)]
    pub nodes: usize,

    /// Virtual-time budget for the run phase.
    #[arg(long = "max-time", default_value_t = 1000.0)]
    pub max_time: f64,

    /// Log verbosity.
    #[arg(long, value_enum, default_value = "info")]
    pub loglevel: LogLevel,

    /// Client arrival mean (lower = faster).
    #[arg(long, default_value_t = 5.0)]
    pub rate: f64,

    /// Export format for the optional plot (not produced by this crate;
    /// carried through for downstream plotting collaborators).
    #[arg(long, value_enum, default_value = "png")]
    pub ext: PlotExt,

    /// Kademlia lookup parallelism.
    #[arg(long, default_value_t = 3)]
    pub alpha: usize,

    /// Kademlia bucket size / Chord per-node identity count.
    #[arg(long, default_value_t = 4)]
    pub k: usize,

    /// Per-node receive-queue capacity.
    #[arg(long, default_value_t = 8)]
    pub capacity: usize,

    /// Size of the key universe.
    #[arg(long, default_value_t = 1000)]
    pub nkeys: usize,

    /// Overlay to simulate.
    #[arg(long, value_enum)]
    pub dht: DhtKind,

    /// Multiplier on join arrival intensity (0 disables joins).
    #[arg(long, default_value_t = 1.0)]
    pub joinrate: f64,

    /// Multiplier on crash intensity (0 disables crashes).
    #[arg(long, default_value_t = 1.0)]
    pub crashrate: f64,

    /// Emit the resolved seed at `info` level on start (ambient addition,
    /// SPEC_FULL.md §6).
    #[arg(long, default_value_t = true)]
    pub seed_log: bool,

    /// Output trace file path.
    #[arg(long, default_value = "trace.json")]
    pub output: std::path::PathBuf,

    /// Increase verbosity (repeatable), layered on top of `--loglevel`.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Decrease verbosity (repeatable).
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}
