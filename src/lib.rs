//! Randomized memory-consistency testbench for Axi4Shared memory slaves.
//!
//! A [`checker::Axi4SharedChecker`] issues random reads and writes on an Axi4Shared bus,
//! mirrors every write into a reference memory and compares every read response against
//! it. A [`phase::PhaseManager`] runs the checker together with its background tasks
//! against a global deadline and a coverage goal. Everything runs on a small
//! discrete-event [`sim::Simulator`] with a single-threaded, deterministic executor.

pub mod axi;
pub mod checker;
pub mod clock;
pub mod config;
pub mod coverage;
pub mod error;
pub mod executor;
pub mod harness;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod phase;
pub mod prelude;
pub mod report;
pub mod signal;
pub mod sim;
mod tb_obj;
mod trigger;
pub mod utils;

pub use error::{TaskResult, TbError, TbResult};
pub use executor::{CancelToken, JoinHandle};
pub use harness::run_axi4shared;
