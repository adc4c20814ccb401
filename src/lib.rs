//! Deterministic day-schedule reschedule engine and task-state machine.
//!
//! The crate is organized the way the domain separates responsibility (§2):
//! pure time arithmetic (`time`), pure validators (`validators`), the pure
//! reschedule engine (`engine`), the mutating task-state machine
//! (`state_machine`) built on top of a generic persistence contract
//! (`store`), and the ambient stack (`error`, `config`, `logging`) that
//! wraps all of it.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod state_machine;
pub mod store;
pub mod suggestion;
pub mod time;
pub mod validators;
