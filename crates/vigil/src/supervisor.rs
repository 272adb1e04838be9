//! Per-account supervision: fan out job loops, detect terminal failures,
//! cancel siblings, persist the pause record.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use vigil_api::{Account, ApiClient};
use vigil_jobs::{
    JobContext, JobExit, JobKind, day_window, run_daily_reward_loop, run_earnings_loop,
    run_mission_sweep_loop, run_ping_loop, run_training_loop, sleep_cancellable,
};
use vigil_store::StateStore;

/// Cooldown before a crashed job loop is restarted.
const RESPAWN_COOLDOWN: Duration = Duration::from_secs(10);

/// Per-account supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub base_url: String,
    pub use_proxy: bool,
    pub with_training: bool,
    pub ping_interval: Duration,
    pub earnings_interval: Duration,
    /// Ceiling for the random startup delay. Zero disables the jitter.
    pub max_startup_jitter_secs: u64,
}

/// How an account's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
    /// A terminal condition retired the account; a pause record was
    /// persisted.
    Paused,
    /// The account wound down on fleet shutdown.
    Stopped,
}

/// Run one account's full job set until shutdown or a terminal condition.
///
/// Never returns an error: a terminal condition is an expected outcome
/// for the account, not a fleet-level failure.
pub async fn run_account(
    account: Account,
    store: Arc<StateStore>,
    cfg: SupervisorConfig,
    fleet_shutdown: watch::Receiver<bool>,
) -> AccountOutcome {
    // Desynchronize the fleet before the first remote call.
    if cfg.max_startup_jitter_secs > 0 {
        let jitter = day_window::startup_jitter(cfg.max_startup_jitter_secs);
        info!(
            account = %account.name,
            delay_secs = jitter.as_secs(),
            "startup jitter"
        );
        let mut shutdown = fleet_shutdown.clone();
        if !sleep_cancellable(&mut shutdown, jitter).await {
            return AccountOutcome::Stopped;
        }
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let ctx = JobContext {
        api: ApiClient::for_account(&cfg.base_url, &account, cfg.use_proxy),
        account: account.clone(),
        store: Arc::clone(&store),
        cancel: cancel_rx,
    };

    let mut jobs: JoinSet<JobExit> = JoinSet::new();
    let ping_interval = cfg.ping_interval;
    let earnings_interval = cfg.earnings_interval;
    spawn_job(&mut jobs, JobKind::Ping, ctx.clone(), move |ctx| {
        run_ping_loop(ctx, ping_interval)
    });
    spawn_job(&mut jobs, JobKind::Earnings, ctx.clone(), move |ctx| {
        run_earnings_loop(ctx, earnings_interval)
    });
    spawn_job(&mut jobs, JobKind::MissionSweep, ctx.clone(), run_mission_sweep_loop);
    spawn_job(&mut jobs, JobKind::DailyReward, ctx.clone(), run_daily_reward_loop);
    if cfg.with_training {
        spawn_job(&mut jobs, JobKind::Training, ctx.clone(), run_training_loop);
    }

    let mut fleet_shutdown = fleet_shutdown;
    let mut shutdown_forwarded = *fleet_shutdown.borrow();
    if shutdown_forwarded {
        let _ = cancel_tx.send(true);
    }

    let mut paused = false;
    loop {
        tokio::select! {
            biased;

            changed = fleet_shutdown.changed(), if !shutdown_forwarded => {
                if changed.is_err() || *fleet_shutdown.borrow() {
                    shutdown_forwarded = true;
                    let _ = cancel_tx.send(true);
                }
            }

            joined = jobs.join_next() => {
                let Some(joined) = joined else {
                    break; // every job loop has exited
                };
                match joined {
                    Ok(JobExit::Terminal(terminal)) => {
                        if !paused {
                            error!(
                                account = %account.name,
                                proxy = %account.proxy_display(),
                                reason = %terminal,
                                "terminal condition, pausing account"
                            );
                            store.persist_pause(&account, terminal.reason()).await;
                            paused = true;
                        }
                        let _ = cancel_tx.send(true);
                    }
                    Ok(JobExit::Cancelled) => {}
                    Err(e) => {
                        // The respawn wrapper absorbs panics; reaching this
                        // means the wrapper itself was aborted.
                        warn!(account = %account.name, error = %e, "job task aborted");
                    }
                }
            }
        }
    }

    if paused {
        info!(account = %account.name, "account retired");
        AccountOutcome::Paused
    } else {
        info!(account = %account.name, "account wound down");
        AccountOutcome::Stopped
    }
}

/// Spawn a job loop that restarts after a cooldown if it panics.
///
/// A terminal or cancelled exit passes straight through; only an
/// unexpected crash is absorbed and retried.
fn spawn_job<F, Fut>(jobs: &mut JoinSet<JobExit>, kind: JobKind, ctx: JobContext, factory: F)
where
    F: Fn(JobContext) -> Fut + Send + 'static,
    Fut: Future<Output = JobExit> + Send + 'static,
{
    jobs.spawn(async move {
        loop {
            let task = tokio::spawn(factory(ctx.clone()));
            match task.await {
                Ok(exit) => return exit,
                Err(e) => {
                    error!(
                        account = %ctx.account.name,
                        job = %kind,
                        error = %e,
                        "job loop crashed, restarting after cooldown"
                    );
                    let mut cancel = ctx.cancel.clone();
                    if !sleep_cancellable(&mut cancel, RESPAWN_COOLDOWN).await {
                        return JobExit::Cancelled;
                    }
                }
            }
        }
    });
}
