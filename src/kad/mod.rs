//! Kademlia overlay (spec.md §4.6).

pub mod node;

pub use node::KademliaNode;
