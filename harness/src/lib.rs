//! Stateful orchestration harness for agent trip-booking trials.
//!
//! This crate drives a goal-directed agent through a bounded decision loop,
//! intercepting every requested action before and after it executes. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (ledger, transcript, trial state,
//!   goal predicate). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (config, agent processes, mock
//!   inventory, booking persistence). Isolated to enable mocking in tests.
//!
//! Orchestration modules ([`turn`], [`looping`]) coordinate core logic with
//! I/O to implement one trial.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod turn;
