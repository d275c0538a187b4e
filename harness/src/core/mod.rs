//! Pure, deterministic trial logic: no I/O, fully testable in isolation.

pub mod goal;
pub mod ledger;
pub mod state;
pub mod task;
pub mod transcript;
pub mod types;
