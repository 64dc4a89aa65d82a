//! Scenario 6 (spec.md §8): running the same config with the same seed
//! twice yields byte-identical JSON output.

mod support;

use dht_sim::output::Trace;
use dht_sim::SimulatorDriver;

#[test]
fn same_seed_same_config_yields_identical_trace_json() {
    let mut cfg = support::chord_config(8, 2);
    cfg.max_time = 40.0;
    cfg.rate = 10.0;
    cfg.joinrate = 2.0;
    cfg.crashrate = 0.5;

    let collector_a = SimulatorDriver::<dht_sim::ChordNode>::new(cfg.clone()).run();
    let collector_b = SimulatorDriver::<dht_sim::ChordNode>::new(cfg).run();

    let json_a = serde_json::to_string_pretty(&Trace::from_collector(&collector_a)).unwrap();
    let json_b = serde_json::to_string_pretty(&Trace::from_collector(&collector_b)).unwrap();

    assert_eq!(json_a, json_b);
}
