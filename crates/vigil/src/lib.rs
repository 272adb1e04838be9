//! Fleet orchestration for the account keepalive daemon.
//!
//! The binary wires three layers together:
//! - [`accounts`]: load and validate the tabular account list
//! - [`supervisor`]: one account's concurrent job set, with terminal
//!   detection, sibling cancellation, and pause persistence
//! - [`fleet`]: spawn one supervisor per eligible account and fan in

pub mod accounts;
pub mod fleet;
pub mod supervisor;
