//! Data collector (spec.md §4, component 4): an append-only trace of timed
//! events, cleared between the build and run phases of the simulator driver
//! (spec.md §4.8).

use std::collections::HashMap;

use crate::ids::Id;

#[derive(Debug, Clone)]
pub struct ClientRequestRecord {
    pub start_time: f64,
    pub latency: f64,
    pub hops: i64,
}

#[derive(Debug, Clone)]
pub struct ValueRecord {
    pub time: f64,
    pub key: String,
    pub value: Option<String>,
}

/// Append-only trace of simulation events. One instance is shared (via
/// `Rc<RefCell<_>>`) across the whole run; `DataCollector::clear` discards
/// everything recorded during the build (join) phase before the run phase
/// starts, per spec.md §4.8.
#[derive(Debug, Clone, Default)]
pub struct DataCollector {
    pub timed_out_requests: Vec<f64>,
    pub client_requests: Vec<ClientRequestRecord>,
    pub queue_load: HashMap<String, Vec<(f64, usize)>>,
    pub joined_time: HashMap<String, f64>,
    pub crashed_time: HashMap<String, f64>,
    pub returned_value: Vec<ValueRecord>,
    pub true_value: Vec<ValueRecord>,
    pub failed_to_join: Vec<f64>,
}

impl DataCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards everything recorded so far. Called once, between the build
    /// and run phases.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn record_queue_load(&mut self, node_name: &str, time: f64, queue_len: usize) {
        self.queue_load
            .entry(node_name.to_string())
            .or_default()
            .push((time, queue_len));
    }

    pub fn record_client_success(&mut self, start_time: f64, latency: f64, hops: i64) {
        self.client_requests.push(ClientRequestRecord {
            start_time,
            latency,
            hops,
        });
    }

    pub fn record_timed_out(&mut self, start_time: f64) {
        self.timed_out_requests.push(start_time);
    }

    pub fn record_joined(&mut self, node_name: &str, time: f64) {
        self.joined_time.insert(node_name.to_string(), time);
    }

    pub fn record_crashed(&mut self, node_name: &str, time: f64) {
        self.crashed_time.insert(node_name.to_string(), time);
    }

    pub fn record_returned_value(&mut self, time: f64, key: Id, value: Option<String>) {
        self.returned_value.push(ValueRecord {
            time,
            key: key.to_string(),
            value,
        });
    }

    pub fn record_true_value(&mut self, time: f64, key: Id, value: Option<String>) {
        self.true_value.push(ValueRecord {
            time,
            key: key.to_string(),
            value,
        });
    }

    pub fn record_failed_to_join(&mut self, time: f64) {
        self.failed_to_join.push(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_discards_everything() {
        let mut dc = DataCollector::new();
        dc.record_timed_out(1.0);
        dc.record_joined("n0", 0.5);
        dc.clear();
        assert!(dc.timed_out_requests.is_empty());
        assert!(dc.joined_time.is_empty());
    }

    #[test]
    fn queue_load_accumulates_per_node() {
        let mut dc = DataCollector::new();
        dc.record_queue_load("n0", 1.0, 1);
        dc.record_queue_load("n0", 1.2, 2);
        dc.record_queue_load("n1", 1.0, 1);
        assert_eq!(dc.queue_load["n0"].len(), 2);
        assert_eq!(dc.queue_load["n1"].len(), 1);
    }
}
