//! Pipeline entry points for watcher operations.
//!
//! - `decide` / `next_state`: rising-edge state machine
//! - `run_check`: one scheduled fetch → detect → alert → persist cycle

pub mod check;
pub mod transition;

pub use check::{CheckOutcome, run_check};
pub use transition::{NotificationAction, decide, next_state};
