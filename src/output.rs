//! Serializes the collected trace to the exact JSON shape spec.md §6
//! prescribes. Grounded on the teacher's JSON-producing modules
//! (`database.rs`/`file_storage.rs` used `serde_json` the same way: build a
//! plain serde-derived struct, then `serde_json::to_writer`/`to_string`).

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::collector::DataCollector;
use crate::error::SimResult;

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// The exact on-disk shape of spec.md §6's JSON document. Tuples serialize
/// as JSON arrays under `serde`, so the field types below are already
/// byte-exact to the spec without any custom `Serialize` impl.
#[derive(Debug, Serialize)]
pub struct Trace {
    pub timed_out_requests: Vec<f64>,
    pub client_requests: Vec<(f64, f64, i64)>,
    pub queue_load: HashMap<String, Vec<(f64, usize)>>,
    pub joined_time: HashMap<String, f64>,
    pub crashed_time: HashMap<String, f64>,
    pub returned_value: Vec<(f64, String, Option<String>)>,
    pub true_value: Vec<(f64, String, Option<String>)>,
    pub failed_to_join: Vec<f64>,
}

impl Trace {
    pub fn from_collector(c: &DataCollector) -> Trace {
        Trace {
            timed_out_requests: c.timed_out_requests.iter().copied().map(round2).collect(),
            client_requests: c
                .client_requests
                .iter()
                .map(|r| (round2(r.start_time), round2(r.latency), r.hops))
                .collect(),
            queue_load: c
                .queue_load
                .iter()
                .map(|(name, points)| {
                    let rounded = points.iter().map(|(t, q)| (round2(*t), *q)).collect();
                    (name.clone(), rounded)
                })
                .collect(),
            joined_time: c.joined_time.iter().map(|(name, t)| (name.clone(), round2(*t))).collect(),
            crashed_time: c.crashed_time.iter().map(|(name, t)| (name.clone(), round2(*t))).collect(),
            returned_value: c
                .returned_value
                .iter()
                .map(|r| (round2(r.time), r.key.clone(), r.value.clone()))
                .collect(),
            true_value: c
                .true_value
                .iter()
                .map(|r| (round2(r.time), r.key.clone(), r.value.clone()))
                .collect(),
            failed_to_join: c.failed_to_join.iter().copied().map(round2).collect(),
        }
    }

    pub fn write_to(&self, path: &Path) -> SimResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_decimals() {
        let mut c = DataCollector::new();
        c.record_timed_out(1.23456);
        let trace = Trace::from_collector(&c);
        assert_eq!(trace.timed_out_requests, vec![1.23]);
    }

    #[test]
    fn serializes_client_requests_as_tuples() {
        let mut c = DataCollector::new();
        c.record_client_success(0.0, 1.5, 2);
        let trace = Trace::from_collector(&c);
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["client_requests"][0], serde_json::json!([0.0, 1.5, 2]));
    }
}
