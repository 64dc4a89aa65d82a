//! CLI entry point: parse arguments, resolve a [`SimConfig`], run the
//! simulation for whichever overlay was selected, and write the trace
//! (spec.md §6).

use clap::Parser;

use dht_sim::chord::ChordNode;
use dht_sim::config::{DhtKind, SimConfig, DEFAULT_ID_BITS};
use dht_sim::kad::KademliaNode;
use dht_sim::{cli::Cli, logging, SimError, SimulatorDriver, Trace};

/// Ambient per-node timing defaults not exposed on the CLI (SPEC_FULL.md
/// §6, "ambient stack"). Chosen so a default-configuration run completes in
/// a reasonable number of virtual-time units relative to `--max-time`'s
/// default of 1000.0.
const MEAN_SERVICE_TIME: f64 = 0.05;
const MAX_TIMEOUT: f64 = 5.0;
const CLIENT_TIMEOUT_MULTIPLIER: f64 = 3.0;
const STABILIZE_PERIOD: f64 = 10.0;
const UPDATE_FINGER_PERIOD: f64 = 15.0;
const PERIOD_MIN_CAP: f64 = 1.0;
const JOIN_LAMBDA1: f64 = 0.1;
const JOIN_LAMBDA2: f64 = 0.02;
const JOIN_MIX_P: f64 = 0.5;
const CRASH_LOGNORMAL_MEAN: f64 = 4.0;
const CRASH_LOGNORMAL_SIGMA: f64 = 0.5;
const ZIPF_ALPHA: f64 = 1.0;

fn resolve_config(cli: &Cli) -> SimConfig {
    SimConfig {
        seed: cli.seed.unwrap_or_else(rand::random),
        nodes: cli.nodes,
        max_time: cli.max_time,
        loglevel: cli.loglevel,
        rate: cli.rate,
        ext: cli.ext,
        alpha: cli.alpha,
        k: cli.k,
        capacity: cli.capacity,
        nkeys: cli.nkeys,
        dht: cli.dht,
        joinrate: cli.joinrate,
        crashrate: cli.crashrate,
        id_bits: DEFAULT_ID_BITS,
        mean_service_time: MEAN_SERVICE_TIME,
        max_timeout: MAX_TIMEOUT,
        client_timeout_multiplier: CLIENT_TIMEOUT_MULTIPLIER,
        stabilize_period: STABILIZE_PERIOD,
        update_finger_period: UPDATE_FINGER_PERIOD,
        period_min_cap: PERIOD_MIN_CAP,
        join_lambda1: JOIN_LAMBDA1,
        join_lambda2: JOIN_LAMBDA2,
        join_mix_p: JOIN_MIX_P,
        crash_lognormal_mean: CRASH_LOGNORMAL_MEAN,
        crash_lognormal_sigma: CRASH_LOGNORMAL_SIGMA,
        zipf_keys: false,
        zipf_alpha: ZIPF_ALPHA,
    }
}

fn run(cli: Cli) -> Result<(), SimError> {
    let cfg = resolve_config(&cli);
    cfg.validate()?;

    logging::init_logging(cfg.loglevel, cli.verbose, cli.quiet).ok();
    if cli.seed_log {
        tracing::info!(seed = cfg.seed, "resolved run seed");
    }

    let collector = match cfg.dht {
        DhtKind::Chord => SimulatorDriver::<ChordNode>::new(cfg.clone()).run(),
        DhtKind::Kad => SimulatorDriver::<KademliaNode>::new(cfg.clone()).run(),
    };

    let trace = Trace::from_collector(&collector);
    trace.write_to(&cli.output)?;
    tracing::info!(path = %cli.output.display(), "trace written");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        let code = match err {
            SimError::Config(_) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}
