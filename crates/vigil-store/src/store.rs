//! File-backed state store with serialized writes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vigil_api::Account;

use crate::{JobKind, PausedAccount, StoreError};

/// Paused-accounts document, keyed by account uid.
pub const PAUSED_FILE: &str = "paused_accounts.json";

/// Daily-completions document, keyed by uid, then UTC date, then job kind.
pub const COMPLETIONS_FILE: &str = "daily_completions.json";

/// uid -> date ("YYYY-MM-DD", UTC) -> job-kind label -> completion time.
type Completions = HashMap<String, HashMap<String, HashMap<String, DateTime<Utc>>>>;

/// Durable key-value store for pause records and daily completions.
///
/// The store is the single writer of its files. Writes take one lock held
/// across the whole read-modify-write cycle so concurrent supervisors
/// never interleave; reads go straight to disk and may run concurrently.
pub struct StateStore {
    paused_path: PathBuf,
    completions_path: PathBuf,
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Create a store rooted at `dir`. The directory is created on first
    /// write; nothing is touched before then.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            paused_path: dir.join(PAUSED_FILE),
            completions_path: dir.join(COMPLETIONS_FILE),
            write_lock: Mutex::new(()),
        }
    }

    /// Load all pause records. Unreadable or missing state reads as empty.
    pub async fn load_paused(&self) -> HashMap<String, PausedAccount> {
        self.read_json(&self.paused_path).await
    }

    /// The uids excluded from scheduling.
    pub async fn paused_ids(&self) -> HashSet<String> {
        self.load_paused().await.into_keys().collect()
    }

    /// Persist a pause record for the account.
    ///
    /// First write wins: replaying for an already-paused uid leaves the
    /// original record's reason and timestamp intact.
    pub async fn persist_pause(&self, account: &Account, reason: &str) {
        let _guard = self.write_lock.lock().await;

        let mut paused: HashMap<String, PausedAccount> = self.read_json(&self.paused_path).await;
        if paused.contains_key(&account.uid) {
            debug!(
                account = %account.name,
                uid = %account.masked_uid(),
                "pause record already present, keeping first write"
            );
            return;
        }

        paused.insert(
            account.uid.clone(),
            PausedAccount::from_account(account, reason),
        );

        if let Err(e) = self.write_json(&self.paused_path, &paused).await {
            warn!(
                account = %account.name,
                error = %e,
                "failed to persist pause record"
            );
            return;
        }

        info!(account = %account.name, uid = %account.masked_uid(), reason, "account paused");
    }

    /// Whether the (uid, kind) pair already completed during the current
    /// UTC calendar day.
    pub async fn is_completed_today(&self, uid: &str, kind: JobKind) -> bool {
        let completions: Completions = self.read_json(&self.completions_path).await;
        completions
            .get(uid)
            .and_then(|dates| dates.get(&today_key()))
            .is_some_and(|kinds| kinds.contains_key(kind.label()))
    }

    /// Record a completion for the (uid, kind) pair on the current UTC
    /// calendar day. Idempotent: a replay leaves the existing marker
    /// untouched.
    pub async fn mark_completed_today(&self, uid: &str, kind: JobKind) {
        let _guard = self.write_lock.lock().await;

        let mut completions: Completions = self.read_json(&self.completions_path).await;
        let kinds = completions
            .entry(uid.to_string())
            .or_default()
            .entry(today_key())
            .or_default();

        if kinds.contains_key(kind.label()) {
            return;
        }
        kinds.insert(kind.label().to_string(), Utc::now());

        if let Err(e) = self.write_json(&self.completions_path, &completions).await {
            warn!(uid, job = %kind, error = %e, "failed to persist daily completion");
        }
    }

    /// Read a JSON document, failing open to the default on any error.
    async fn read_json<T: DeserializeOwned + Default>(&self, path: &Path) -> T {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read state file");
                return T::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse state file");
                T::default()
            }
        }
    }

    /// Write a JSON document, pretty-printed for hand inspection.
    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(value)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Completion-map key for the current UTC calendar day.
fn today_key() -> String {
    Utc::now().date_naive().to_string()
}
