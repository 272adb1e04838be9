//! Durable cross-run account state.
//!
//! Two human-inspectable JSON documents back the fleet:
//! - `paused_accounts.json`: accounts retired by a terminal credential
//!   failure, excluded from future runs
//! - `daily_completions.json`: per-account, per-UTC-day completion markers
//!   for deadline-style jobs
//!
//! Reads fail open (an unreadable file means "no durable record") and
//! writes are best-effort: a storage failure degrades the run, it never
//! crashes it.

mod error;
mod store;
mod types;

pub use error::StoreError;
pub use store::{COMPLETIONS_FILE, PAUSED_FILE, StateStore};
pub use types::{JobKind, PausedAccount};
