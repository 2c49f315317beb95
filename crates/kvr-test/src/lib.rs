//! KVR Test Harness - Simulation and invariant checking
//!
//! This crate provides:
//! - Seeded flaky compositor, scripted tracking and headless runtime doubles
//! - Pairing checker for the stereo submission invariants
//! - Deterministic cadence simulation (tracking vs. per-eye render rates)
//! - Threaded stress runs with concurrent eye callbacks

pub mod mock;
pub mod checker;
pub mod simulator;
pub mod stress;

pub use mock::*;
pub use checker::*;
pub use simulator::*;
pub use stress::*;
