//! Chord overlay (spec.md §4.5).

pub mod node;

pub use node::ChordNode;
