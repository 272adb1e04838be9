//! Account identity and classified operation results.

use serde::{Deserialize, Serialize};

use crate::ApiError;

/// One identity being kept active against the network service.
///
/// Loaded once from the account list and immutable for the lifetime of a
/// run. Uniquely keyed by `uid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Display name.
    pub name: String,
    /// Stable user id.
    pub uid: String,
    /// Browser/device id sent with heartbeats.
    pub browser_id: String,
    /// Opaque bearer credential. Passed through, never parsed or logged.
    pub token: String,
    /// Optional proxy URI (scheme-normalized by the loader).
    pub proxy: Option<String>,
}

impl Account {
    /// Masked uid for log output: first three and last three characters.
    pub fn masked_uid(&self) -> String {
        if self.uid.len() <= 6 {
            return self.uid.clone();
        }
        format!("{}***{}", &self.uid[..3], &self.uid[self.uid.len() - 3..])
    }

    /// Proxy for log output.
    pub fn proxy_display(&self) -> &str {
        self.proxy.as_deref().unwrap_or("no proxy")
    }
}

/// Tagged outcome of one remote operation.
///
/// Callers match exhaustively; a result is never coerced to a boolean.
#[derive(Debug)]
pub enum JobResult<T> {
    /// The operation succeeded with a typed payload.
    Success(T),
    /// The credential is expired (HTTP 401 or in-body code 401). Terminal
    /// for the account; never retried.
    TokenExpired,
    /// The credential is forbidden (HTTP 403). Terminal for the account;
    /// never retried.
    Forbidden,
    /// All attempts failed with a retryable cause.
    Transient(ApiError),
}

impl<T> JobResult<T> {
    /// Map the success payload, preserving the other variants.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> JobResult<U> {
        match self {
            JobResult::Success(t) => JobResult::Success(f(t)),
            JobResult::TokenExpired => JobResult::TokenExpired,
            JobResult::Forbidden => JobResult::Forbidden,
            JobResult::Transient(e) => JobResult::Transient(e),
        }
    }
}

/// Outcome of a claim-style operation whose target may already be claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim<T> {
    /// The claim went through and granted a payload.
    Granted(T),
    /// The service reports the claim as already completed. Success-class:
    /// the day is done, nothing further to do.
    AlreadyClaimed,
}

/// Earnings summary for an account.
#[derive(Debug, Clone, Deserialize)]
pub struct Earnings {
    /// Lifetime point total.
    #[serde(rename = "total_total")]
    pub total_points: i64,
    /// Points earned today.
    #[serde(rename = "today_total")]
    pub today_points: i64,
    /// Uptime today, in minutes.
    #[serde(rename = "today_uptime")]
    pub today_uptime_minutes: i64,
}

impl Earnings {
    /// Uptime today, in hours.
    pub fn today_uptime_hours(&self) -> f64 {
        self.today_uptime_minutes as f64 / 60.0
    }
}

/// Heartbeat acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct Heartbeat {
    /// Network score reported for this node.
    pub score: i64,
}

/// One entry from the mission list.
#[derive(Debug, Clone, Deserialize)]
pub struct Mission {
    pub id: i64,
    pub title: String,
    pub reward_points: i64,
    pub status: String,
}

impl Mission {
    /// Whether this mission can be completed right now.
    pub fn is_claimable(&self) -> bool {
        self.status.eq_ignore_ascii_case("available")
    }
}

/// Daily reward state for the current day.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyRewards {
    /// Set when today's reward was already claimed.
    pub today_claimed: bool,
    /// Individual reward slots.
    #[serde(rename = "list", default)]
    pub rewards: Vec<DailyReward>,
}

/// One daily reward slot.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyReward {
    pub id: i64,
    pub claimed: bool,
}

/// Payload granted by a daily reward claim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RewardClaim {
    #[serde(default)]
    pub soul: i64,
    #[serde(default)]
    pub core: i64,
    #[serde(default)]
    pub blindbox: i64,
}

/// Payload granted by a completed training run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainingOutcome {
    #[serde(default)]
    pub burned_points: i64,
    #[serde(default)]
    pub soul: i64,
    #[serde(default)]
    pub blindbox: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_uid() {
        let account = Account {
            name: "alice".to_string(),
            uid: "1234567890".to_string(),
            browser_id: "b".to_string(),
            token: "t".to_string(),
            proxy: None,
        };
        assert_eq!(account.masked_uid(), "123***890");
    }

    #[test]
    fn test_masked_uid_short() {
        let account = Account {
            name: "bob".to_string(),
            uid: "abc".to_string(),
            browser_id: "b".to_string(),
            token: "t".to_string(),
            proxy: None,
        };
        assert_eq!(account.masked_uid(), "abc");
    }

    #[test]
    fn test_proxy_display() {
        let mut account = Account {
            name: "alice".to_string(),
            uid: "u".to_string(),
            browser_id: "b".to_string(),
            token: "t".to_string(),
            proxy: Some("http://127.0.0.1:8080".to_string()),
        };
        assert_eq!(account.proxy_display(), "http://127.0.0.1:8080");
        account.proxy = None;
        assert_eq!(account.proxy_display(), "no proxy");
    }

    #[test]
    fn test_job_result_map() {
        let result: JobResult<i64> = JobResult::Success(21);
        match result.map(|n| n * 2) {
            JobResult::Success(n) => assert_eq!(n, 42),
            _ => panic!("expected success"),
        }

        let result: JobResult<i64> = JobResult::TokenExpired;
        assert!(matches!(result.map(|n| n * 2), JobResult::TokenExpired));
    }

    #[test]
    fn test_mission_is_claimable() {
        let mission = Mission {
            id: 1,
            title: "Daily check-in".to_string(),
            reward_points: 50,
            status: "AVAILABLE".to_string(),
        };
        assert!(mission.is_claimable());

        let done = Mission {
            status: "completed".to_string(),
            ..mission
        };
        assert!(!done.is_claimable());
    }

    #[test]
    fn test_earnings_uptime_hours() {
        let earnings = Earnings {
            total_points: 100,
            today_points: 10,
            today_uptime_minutes: 90,
        };
        assert!((earnings.today_uptime_hours() - 1.5).abs() < f64::EPSILON);
    }
}
