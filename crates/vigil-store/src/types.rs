//! Durable record types shared across the fleet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_api::Account;

/// One category of recurring work for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Heartbeat ping keeping the node alive.
    Ping,
    /// Earnings poll.
    Earnings,
    /// Daily sweep of claimable missions.
    MissionSweep,
    /// Daily reward claim.
    DailyReward,
    /// Daily training claim.
    Training,
}

impl JobKind {
    /// Stable label used as a completion-record key and in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Ping => "ping",
            JobKind::Earnings => "earnings",
            JobKind::MissionSweep => "mission_sweep",
            JobKind::DailyReward => "daily_reward",
            JobKind::Training => "training",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A persisted record of an account retired by a terminal failure.
///
/// Written exactly once per account and never mutated afterwards. The
/// bearer credential is deliberately not part of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedAccount {
    pub name: String,
    pub browser_id: String,
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub paused_at: DateTime<Utc>,
    pub reason: String,
}

impl PausedAccount {
    /// Snapshot an account's identity with the pause reason.
    pub fn from_account(account: &Account, reason: impl Into<String>) -> Self {
        Self {
            name: account.name.clone(),
            browser_id: account.browser_id.clone(),
            uid: account.uid.clone(),
            proxy: account.proxy.clone(),
            paused_at: Utc::now(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_labels() {
        assert_eq!(JobKind::Ping.label(), "ping");
        assert_eq!(JobKind::MissionSweep.label(), "mission_sweep");
        assert_eq!(JobKind::Training.to_string(), "training");
    }

    #[test]
    fn test_paused_account_snapshot_omits_token() {
        let account = Account {
            name: "alice".to_string(),
            uid: "uid-1".to_string(),
            browser_id: "browser-1".to_string(),
            token: "secret-token".to_string(),
            proxy: None,
        };

        let record = PausedAccount::from_account(&account, "Token Expired (401)");
        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains("alice"));
        assert!(json.contains("Token Expired (401)"));
        assert!(!json.contains("secret-token"));
    }
}
