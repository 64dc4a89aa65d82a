//! Simulator driver (spec.md §4.8): sequences the build and run phases.

pub mod driver;

pub use driver::SimulatorDriver;
