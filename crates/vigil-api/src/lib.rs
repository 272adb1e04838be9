//! Remote operation client for the network service.
//!
//! This crate performs one classified remote call per operation:
//! - Bounded retry with a fixed inter-attempt delay
//! - Credential expiry (401) and forbidden (403) short-circuit all retries
//! - Every outcome is a [`JobResult`] variant, never a sentinel value

mod client;
mod error;
mod types;

pub use client::ApiClient;
pub use error::ApiError;
pub use types::{
    Account, Claim, DailyReward, DailyRewards, Earnings, Heartbeat, JobResult, Mission,
    RewardClaim, TrainingOutcome,
};
