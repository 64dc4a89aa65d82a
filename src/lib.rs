//! Discrete-event simulator for structured P2P overlays (Chord, Kademlia)
//! under churn, queueing, and geography-derived latency (spec.md §1).
//!
//! The crate is organized the way the simulation itself is layered: a
//! seeded random source and event kernel at the bottom (`rng`, `kernel`),
//! the overlay-agnostic node runtime on top of that (`node`), the two
//! concrete overlays built on the node runtime (`chord`, `kad`), and the
//! churn/workload drivers built on top of those (`net`, `client`, `sim`).

pub mod chord;
pub mod cli;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod ids;
pub mod kad;
pub mod kernel;
pub mod location;
pub mod logging;
pub mod net;
pub mod node;
pub mod output;
pub mod packet;
pub mod rng;
pub mod sim;

pub use chord::ChordNode;
pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use kad::KademliaNode;
pub use output::Trace;
pub use sim::SimulatorDriver;
