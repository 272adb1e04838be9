//! UTC day-window arithmetic shared by every deadline-style job.

use std::time::Duration;

use chrono::{DateTime, Days, TimeZone, Utc};
use rand::Rng;

/// Minimum distance to a same-day retry instant. Keeps a failing job from
/// spinning at the end of a day.
pub const RETRY_FLOOR_SECS: i64 = 60;

/// The next UTC midnight strictly after `now`.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .expect("date in representable range");
    Utc.from_utc_datetime(&tomorrow.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}

/// Time left in the current UTC calendar day.
pub fn remaining_today(now: DateTime<Utc>) -> chrono::Duration {
    next_utc_midnight(now) - now
}

/// A uniformly random instant within the remaining portion of the current
/// UTC day. Never in the past, never past midnight.
pub fn random_instant_in_remainder(now: DateTime<Utc>) -> DateTime<Utc> {
    let remaining = remaining_today(now).num_seconds().max(1);
    let offset = rand::thread_rng().gen_range(0..remaining);
    now + chrono::Duration::seconds(offset)
}

/// A random retry instant at least [`RETRY_FLOOR_SECS`] away, still within
/// the current UTC day. `None` when too little of the day remains.
pub fn random_retry_instant(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let remaining = remaining_today(now).num_seconds();
    if remaining <= RETRY_FLOOR_SECS {
        return None;
    }
    let offset = rand::thread_rng().gen_range(RETRY_FLOOR_SECS..remaining);
    Some(now + chrono::Duration::seconds(offset))
}

/// Random startup delay in `[0, max_secs]`, desynchronizing the fleet.
pub fn startup_jitter(max_secs: u64) -> Duration {
    Duration::from_secs(rand::thread_rng().gen_range(0..=max_secs))
}
