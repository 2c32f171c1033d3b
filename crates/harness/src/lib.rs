//! Operational drill harness.
//!
//! Spawns isolated instances of the drilled service, health-gates them,
//! probes them over HTTP, and turns the outcome into reports. All pure
//! evaluation logic lives in `opsdrill-core`.

pub mod config;
pub mod env;
pub mod error;
pub mod probe;
pub mod process;
pub mod runner;
pub mod scenarios;
pub mod span;
