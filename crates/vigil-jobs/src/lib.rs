//! Recurring job loops for one account.
//!
//! Two scheduling disciplines, both running indefinitely per
//! (account, job kind):
//! - Fixed-interval loops (heartbeat ping, earnings poll)
//! - Deadline-style loops (mission sweep, daily reward, training) that run
//!   at most once per UTC calendar day at a randomized instant
//!
//! Cancellation is cooperative: every sleep and every remote call is a
//! suspension point, and a cancelled loop exits at the next one without
//! issuing further remote calls.

pub mod day_window;
mod daily;
mod interval;
mod types;

pub use daily::{
    DayOutcome, TRAINING_MIN_POINTS, claim_daily_reward_once, complete_training_once,
    run_daily_loop, run_daily_reward_loop, run_mission_sweep_loop, run_training_loop,
    sweep_missions_once,
};
pub use interval::{EARNINGS_INTERVAL, PING_INTERVAL, run_earnings_loop, run_ping_loop};
pub use types::{JobContext, JobExit, Terminal, sleep_cancellable, sleep_until};

pub use vigil_store::JobKind;
