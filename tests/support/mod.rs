//! Shared fixtures for the scenario/property integration tests (spec.md §8).
//! Kept minimal and duplicated in spirit from the unit-test `test_config`
//! helpers inside `chord::node`/`kad::node` -- integration tests can't reach
//! those private helpers, so this is the one place the test-only defaults
//! live for everything under `tests/`.

use dht_sim::config::{DhtKind, LogLevel, PlotExt, SimConfig};

pub fn chord_config(nodes: usize, k: usize) -> SimConfig {
    SimConfig {
        seed: 1,
        nodes,
        max_time: 1000.0,
        loglevel: LogLevel::Error,
        rate: 5.0,
        ext: PlotExt::Png,
        alpha: 3,
        k,
        capacity: 8,
        nkeys: 100,
        dht: DhtKind::Chord,
        joinrate: 1.0,
        crashrate: 1.0,
        id_bits: 16,
        mean_service_time: 0.01,
        max_timeout: 5.0,
        client_timeout_multiplier: 3.0,
        stabilize_period: 10.0,
        update_finger_period: 10.0,
        period_min_cap: 1.0,
        join_lambda1: 1.0,
        join_lambda2: 1.0,
        join_mix_p: 0.5,
        crash_lognormal_mean: 1.0,
        crash_lognormal_sigma: 1.0,
        zipf_keys: false,
        zipf_alpha: 1.0,
    }
}

pub fn kad_config(nodes: usize, k: usize, alpha: usize) -> SimConfig {
    SimConfig {
        seed: 1,
        nodes,
        max_time: 1000.0,
        loglevel: LogLevel::Error,
        rate: 5.0,
        ext: PlotExt::Png,
        alpha,
        k,
        capacity: 8,
        nkeys: 100,
        dht: DhtKind::Kad,
        joinrate: 1.0,
        crashrate: 1.0,
        id_bits: 16,
        mean_service_time: 0.01,
        max_timeout: 5.0,
        client_timeout_multiplier: 3.0,
        stabilize_period: 10.0,
        update_finger_period: 10.0,
        period_min_cap: 1.0,
        join_lambda1: 1.0,
        join_lambda2: 1.0,
        join_mix_p: 0.5,
        crash_lognormal_mean: 1.0,
        crash_lognormal_sigma: 1.0,
        zipf_keys: false,
        zipf_alpha: 1.0,
    }
}
