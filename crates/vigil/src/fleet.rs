//! Fleet orchestration: one supervisor per eligible account.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use miette::{IntoDiagnostic, Result};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use vigil_store::StateStore;

use crate::accounts;
use crate::supervisor::{AccountOutcome, SupervisorConfig, run_account};

/// Fleet-wide settings, resolved from the CLI.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub accounts_path: PathBuf,
    pub state_dir: PathBuf,
    pub base_url: String,
    pub use_proxy: bool,
    pub with_training: bool,
    pub ping_interval: Duration,
    pub earnings_interval: Duration,
    /// Startup jitter ceiling override; `None` derives it from the job mix.
    pub startup_jitter_secs: Option<u64>,
}

impl FleetConfig {
    fn supervisor_config(&self) -> SupervisorConfig {
        // A larger spread once the claim-heavy training job is in the mix.
        let max_startup_jitter_secs = self
            .startup_jitter_secs
            .unwrap_or(if self.with_training { 200 } else { 100 });

        SupervisorConfig {
            base_url: self.base_url.clone(),
            use_proxy: self.use_proxy,
            with_training: self.with_training,
            ping_interval: self.ping_interval,
            earnings_interval: self.earnings_interval,
            max_startup_jitter_secs,
        }
    }
}

/// Run the fleet until ctrl-c.
pub async fn run(cfg: FleetConfig) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    run_with_shutdown(cfg, shutdown_rx).await
}

/// Run the fleet until the shutdown signal flips.
///
/// Failure to obtain the account list is the only fatal error; everything
/// below the orchestrator degrades per account or per cycle instead.
pub async fn run_with_shutdown(
    cfg: FleetConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let store = Arc::new(StateStore::new(&cfg.state_dir));
    let paused = store.paused_ids().await;

    let all = accounts::load_accounts(&cfg.accounts_path).into_diagnostic()?;
    let total = all.len();
    let eligible: Vec<_> = all
        .into_iter()
        .filter(|account| !paused.contains(&account.uid))
        .collect();

    info!(
        total,
        paused = paused.len(),
        eligible = eligible.len(),
        "account list loaded"
    );

    if eligible.is_empty() {
        info!("no eligible accounts, nothing to do");
        return Ok(());
    }

    let supervisor_cfg = cfg.supervisor_config();
    let mut supervisors: JoinSet<AccountOutcome> = JoinSet::new();
    for account in eligible {
        supervisors.spawn(run_account(
            account,
            Arc::clone(&store),
            supervisor_cfg.clone(),
            shutdown_rx.clone(),
        ));
    }

    let mut newly_paused = 0usize;
    while let Some(joined) = supervisors.join_next().await {
        match joined {
            Ok(AccountOutcome::Paused) => newly_paused += 1,
            Ok(AccountOutcome::Stopped) => {}
            Err(e) => error!(error = %e, "supervisor task failed"),
        }
    }

    info!(newly_paused, "fleet wound down");
    Ok(())
}
