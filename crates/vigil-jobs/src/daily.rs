//! Deadline-style job loops: at most one completion per UTC calendar day,
//! at a randomized instant within the day.

use std::future::Future;

use chrono::Utc;
use tracing::{debug, info, warn};

use vigil_api::{Claim, JobResult};
use vigil_store::JobKind;

use crate::day_window::{next_utc_midnight, random_instant_in_remainder, random_retry_instant};
use crate::{JobContext, JobExit, Terminal, sleep_until};

/// Minimum point balance before a training claim is worth its burn cost.
pub const TRAINING_MIN_POINTS: i64 = 2500;

/// Outcome of one execution of a deadline-style job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOutcome {
    /// Done for today (claimed, already claimed, or skipped): record the
    /// completion and sleep to the next UTC midnight.
    Completed,
    /// Transient failure: reschedule within the remainder of the day.
    Retry,
    /// Terminal condition for the account.
    Terminal(Terminal),
}

/// Drive one deadline-style job indefinitely.
///
/// Per UTC day: short-circuit on a durable completion marker, otherwise
/// sleep to a random instant in the day's remainder, execute, and either
/// record the completion or reschedule within what is left of the day.
pub async fn run_daily_loop<F, Fut>(ctx: JobContext, kind: JobKind, run_once: F) -> JobExit
where
    F: Fn(JobContext) -> Fut,
    Fut: Future<Output = DayOutcome>,
{
    run_daily_loop_with(ctx, kind, run_once, random_instant_in_remainder).await
}

/// Loop body with the target picker injected (immediate targets in tests).
async fn run_daily_loop_with<F, Fut, P>(
    ctx: JobContext,
    kind: JobKind,
    run_once: F,
    pick_target: P,
) -> JobExit
where
    F: Fn(JobContext) -> Fut,
    Fut: Future<Output = DayOutcome>,
    P: Fn(chrono::DateTime<Utc>) -> chrono::DateTime<Utc>,
{
    let mut cancel = ctx.cancel.clone();
    let account_name = ctx.account.name.clone();

    loop {
        if *cancel.borrow() {
            return JobExit::Cancelled;
        }

        if ctx
            .store
            .is_completed_today(&ctx.account.uid, kind)
            .await
        {
            debug!(account = %account_name, job = %kind, "completed today, sleeping to next UTC midnight");
            if !sleep_until(&mut cancel, next_utc_midnight(Utc::now())).await {
                return JobExit::Cancelled;
            }
            continue;
        }

        let mut target = pick_target(Utc::now());
        info!(account = %account_name, job = %kind, at = %target, "scheduled today's attempt");

        // Attempts within the current day.
        loop {
            if !sleep_until(&mut cancel, target).await {
                return JobExit::Cancelled;
            }

            match run_once(ctx.clone()).await {
                DayOutcome::Completed => {
                    ctx.store
                        .mark_completed_today(&ctx.account.uid, kind)
                        .await;
                    break;
                }
                DayOutcome::Terminal(terminal) => return JobExit::Terminal(terminal),
                DayOutcome::Retry => {
                    let now = Utc::now();
                    match random_retry_instant(now) {
                        Some(at) => {
                            info!(account = %account_name, job = %kind, at = %at, "rescheduled within today");
                            target = at;
                        }
                        None => {
                            // Too little of the day left; start fresh tomorrow.
                            info!(account = %account_name, job = %kind, "day exhausted, retrying tomorrow");
                            if !sleep_until(&mut cancel, next_utc_midnight(now)).await {
                                return JobExit::Cancelled;
                            }
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Mission sweep loop: complete every claimable mission once per day.
pub async fn run_mission_sweep_loop(ctx: JobContext) -> JobExit {
    run_daily_loop(ctx, JobKind::MissionSweep, sweep_missions_once).await
}

/// Daily reward loop: claim the day's unclaimed reward slots.
pub async fn run_daily_reward_loop(ctx: JobContext) -> JobExit {
    run_daily_loop(ctx, JobKind::DailyReward, claim_daily_reward_once).await
}

/// Training loop: burn points for the daily training claim, gated on a
/// minimum balance.
pub async fn run_training_loop(ctx: JobContext) -> JobExit {
    run_daily_loop(ctx, JobKind::Training, complete_training_once).await
}

/// One sweep over the mission list.
pub async fn sweep_missions_once(ctx: JobContext) -> DayOutcome {
    let account = &ctx.account;

    let missions = match ctx.api.missions(&account.token).await {
        JobResult::Success(missions) => missions,
        JobResult::TokenExpired => return DayOutcome::Terminal(Terminal::TokenExpired),
        JobResult::Forbidden => return DayOutcome::Terminal(Terminal::Forbidden),
        JobResult::Transient(e) => {
            warn!(account = %account.name, error = %e, "mission list failed");
            return DayOutcome::Retry;
        }
    };

    let claimable: Vec<_> = missions.iter().filter(|m| m.is_claimable()).collect();
    if claimable.is_empty() {
        info!(account = %account.name, "no claimable missions today");
        return DayOutcome::Completed;
    }

    let mut completed = 0usize;
    for mission in claimable {
        match ctx.api.complete_mission(&account.token, mission.id).await {
            JobResult::Success(Claim::Granted(_)) => {
                info!(
                    account = %account.name,
                    mission = %mission.title,
                    reward_points = mission.reward_points,
                    "mission completed"
                );
                completed += 1;
            }
            JobResult::Success(Claim::AlreadyClaimed) => {
                debug!(account = %account.name, mission = %mission.title, "mission already completed");
            }
            JobResult::TokenExpired => return DayOutcome::Terminal(Terminal::TokenExpired),
            JobResult::Forbidden => return DayOutcome::Terminal(Terminal::Forbidden),
            JobResult::Transient(e) => {
                warn!(account = %account.name, mission = %mission.title, error = %e, "mission completion failed");
                return DayOutcome::Retry;
            }
        }
    }

    info!(account = %account.name, completed, "mission sweep finished");
    DayOutcome::Completed
}

/// One pass over the daily reward slots.
pub async fn claim_daily_reward_once(ctx: JobContext) -> DayOutcome {
    let account = &ctx.account;

    let rewards = match ctx.api.daily_rewards(&account.token).await {
        JobResult::Success(rewards) => rewards,
        JobResult::TokenExpired => return DayOutcome::Terminal(Terminal::TokenExpired),
        JobResult::Forbidden => return DayOutcome::Terminal(Terminal::Forbidden),
        JobResult::Transient(e) => {
            warn!(account = %account.name, error = %e, "daily reward check failed");
            return DayOutcome::Retry;
        }
    };

    if rewards.today_claimed {
        info!(account = %account.name, "daily reward already claimed today");
        return DayOutcome::Completed;
    }

    for reward in rewards.rewards.iter().filter(|r| !r.claimed) {
        match ctx.api.claim_daily_reward(&account.token, reward.id).await {
            JobResult::Success(Claim::Granted(claim)) => {
                info!(
                    account = %account.name,
                    soul = claim.soul,
                    core = claim.core,
                    blindbox = claim.blindbox,
                    "daily reward claimed"
                );
            }
            JobResult::Success(Claim::AlreadyClaimed) => {
                debug!(account = %account.name, reward = reward.id, "reward slot already claimed");
            }
            JobResult::TokenExpired => return DayOutcome::Terminal(Terminal::TokenExpired),
            JobResult::Forbidden => return DayOutcome::Terminal(Terminal::Forbidden),
            JobResult::Transient(e) => {
                warn!(account = %account.name, reward = reward.id, error = %e, "daily reward claim failed");
                return DayOutcome::Retry;
            }
        }
    }

    DayOutcome::Completed
}

/// One training attempt, gated on the account's point balance.
///
/// Below the threshold the day still counts as completed, with zero calls
/// to the claim endpoint, so the balance is not re-polled all day.
pub async fn complete_training_once(ctx: JobContext) -> DayOutcome {
    let account = &ctx.account;

    let earnings = match ctx.api.earnings(&account.token).await {
        JobResult::Success(earnings) => earnings,
        JobResult::TokenExpired => return DayOutcome::Terminal(Terminal::TokenExpired),
        JobResult::Forbidden => return DayOutcome::Terminal(Terminal::Forbidden),
        JobResult::Transient(e) => {
            warn!(account = %account.name, error = %e, "balance check failed");
            return DayOutcome::Retry;
        }
    };

    if earnings.total_points < TRAINING_MIN_POINTS {
        info!(
            account = %account.name,
            total_points = earnings.total_points,
            threshold = TRAINING_MIN_POINTS,
            "balance below training threshold, skipping for today"
        );
        return DayOutcome::Completed;
    }

    match ctx.api.complete_training(&account.token).await {
        JobResult::Success(Claim::Granted(outcome)) => {
            info!(
                account = %account.name,
                burned_points = outcome.burned_points,
                soul = outcome.soul,
                blindbox = outcome.blindbox,
                "training completed"
            );
            DayOutcome::Completed
        }
        JobResult::Success(Claim::AlreadyClaimed) => {
            info!(account = %account.name, "training already completed today");
            DayOutcome::Completed
        }
        JobResult::TokenExpired => DayOutcome::Terminal(Terminal::TokenExpired),
        JobResult::Forbidden => DayOutcome::Terminal(Terminal::Forbidden),
        JobResult::Transient(e) => {
            warn!(account = %account.name, error = %e, "training claim failed");
            DayOutcome::Retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use vigil_api::ApiClient;
    use vigil_store::StateStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_ctx(
        server: &MockServer,
        dir: &tempfile::TempDir,
    ) -> (JobContext, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let ctx = JobContext {
            account: vigil_api::Account {
                name: "alice".to_string(),
                uid: "uid-1".to_string(),
                browser_id: "browser-1".to_string(),
                token: "tok".to_string(),
                proxy: None,
            },
            api: ApiClient::with_base_url(server.uri())
                .with_retry_delay(Duration::from_millis(1)),
            store: Arc::new(StateStore::new(dir.path())),
            cancel: rx,
        };
        (ctx, tx)
    }

    fn earnings_body(total: i64) -> serde_json::Value {
        serde_json::json!({
            "success": true,
            "data": { "total_total": total, "today_total": 1, "today_uptime": 5 }
        })
    }

    #[tokio::test]
    async fn test_training_below_threshold_skips_claim() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/earn/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(earnings_body(1000)))
            .expect(1)
            .mount(&server)
            .await;

        // The claim endpoint must not be touched.
        Mock::given(method("POST"))
            .and(path("/api/ai/complete"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (ctx, _tx) = test_ctx(&server, &dir);
        assert_eq!(complete_training_once(ctx).await, DayOutcome::Completed);
    }

    #[tokio::test]
    async fn test_training_above_threshold_claims() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/earn/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(earnings_body(5000)))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/ai/complete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": { "burned_points": 2500, "soul": 1, "blindbox": 0 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (ctx, _tx) = test_ctx(&server, &dir);
        assert_eq!(complete_training_once(ctx).await, DayOutcome::Completed);
    }

    #[tokio::test]
    async fn test_training_terminal_on_expired_balance_check() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/earn/info"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (ctx, _tx) = test_ctx(&server, &dir);
        assert_eq!(
            complete_training_once(ctx).await,
            DayOutcome::Terminal(Terminal::TokenExpired)
        );
    }

    #[tokio::test]
    async fn test_daily_reward_already_claimed_skips_claims() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/reward/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": { "today_claimed": true, "list": [{ "id": 1, "claimed": false }] }
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/reward/claim"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (ctx, _tx) = test_ctx(&server, &dir);
        assert_eq!(claim_daily_reward_once(ctx).await, DayOutcome::Completed);
    }

    #[tokio::test]
    async fn test_daily_reward_claims_unclaimed_slots() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/reward/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "today_claimed": false,
                    "list": [
                        { "id": 1, "claimed": true },
                        { "id": 2, "claimed": false }
                    ]
                }
            })))
            .mount(&server)
            .await;

        // Exactly one claim: the unclaimed slot.
        Mock::given(method("POST"))
            .and(path("/api/reward/claim"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": { "soul": 2, "core": 1, "blindbox": 0 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (ctx, _tx) = test_ctx(&server, &dir);
        assert_eq!(claim_daily_reward_once(ctx).await, DayOutcome::Completed);
    }

    #[tokio::test]
    async fn test_mission_sweep_completes_only_claimable() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/mission/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": [
                    { "id": 1, "title": "Check-in", "reward_points": 50, "status": "available" },
                    { "id": 2, "title": "Invite", "reward_points": 200, "status": "locked" }
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/mission/complete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (ctx, _tx) = test_ctx(&server, &dir);
        assert_eq!(sweep_missions_once(ctx).await, DayOutcome::Completed);
    }

    #[tokio::test]
    async fn test_transient_failure_requests_retry() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/reward/list"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (ctx, _tx) = test_ctx(&server, &dir);
        assert_eq!(claim_daily_reward_once(ctx).await, DayOutcome::Retry);
    }

    #[tokio::test]
    async fn test_daily_loop_short_circuits_on_completion_marker() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        // No mocks mounted: any remote call would 404 and show up as an
        // unexpected request.
        let (ctx, tx) = test_ctx(&server, &dir);
        ctx.store
            .mark_completed_today(&ctx.account.uid, JobKind::Training)
            .await;

        let handle = tokio::spawn(run_daily_loop(
            ctx,
            JobKind::Training,
            complete_training_once,
        ));

        // The loop is asleep until midnight; cancellation must wake it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), JobExit::Cancelled);
        assert_eq!(server.received_requests().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_daily_loop_exits_when_already_cancelled() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        let (ctx, tx) = test_ctx(&server, &dir);
        tx.send(true).unwrap();

        let exit = run_daily_loop(ctx, JobKind::DailyReward, claim_daily_reward_once).await;
        assert_eq!(exit, JobExit::Cancelled);
        assert_eq!(server.received_requests().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_daily_loop_records_completion() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/reward/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": { "today_claimed": true, "list": [] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (ctx, tx) = test_ctx(&server, &dir);
        let store = Arc::clone(&ctx.store);
        // Immediate target: execute as soon as the loop starts.
        let handle = tokio::spawn(run_daily_loop_with(
            ctx,
            JobKind::DailyReward,
            claim_daily_reward_once,
            |now| now,
        ));

        // Wait for the durable marker, then cancel the sleeping loop.
        let mut marked = false;
        for _ in 0..100 {
            if store.is_completed_today("uid-1", JobKind::DailyReward).await {
                marked = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tx.send(true).unwrap();

        assert!(marked, "completion marker never written");
        assert_eq!(handle.await.unwrap(), JobExit::Cancelled);
    }

    #[tokio::test]
    async fn test_daily_loop_terminal_stops_loop() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/reward/list"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (ctx, _tx) = test_ctx(&server, &dir);
        let exit = run_daily_loop_with(
            ctx,
            JobKind::DailyReward,
            claim_daily_reward_once,
            |now| now,
        )
        .await;

        assert_eq!(exit, JobExit::Terminal(Terminal::TokenExpired));
    }
}
