//! Fixed-interval job loops: heartbeat ping and earnings poll.

use std::time::Duration;

use tracing::{info, warn};

use vigil_api::JobResult;

use crate::{JobContext, JobExit, Terminal, sleep_cancellable};

/// Interval between heartbeat pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Interval between earnings polls.
pub const EARNINGS_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Send a heartbeat, sleep, repeat.
pub async fn run_ping_loop(ctx: JobContext, interval: Duration) -> JobExit {
    let mut cancel = ctx.cancel.clone();
    let account = &ctx.account;

    loop {
        if *cancel.borrow() {
            return JobExit::Cancelled;
        }

        match ctx
            .api
            .heartbeat(&account.token, &account.browser_id, &account.uid)
            .await
        {
            JobResult::Success(heartbeat) => {
                info!(
                    account = %account.name,
                    proxy = %account.proxy_display(),
                    score = heartbeat.score,
                    "heartbeat acknowledged"
                );
            }
            JobResult::TokenExpired => return JobExit::Terminal(Terminal::TokenExpired),
            JobResult::Forbidden => return JobExit::Terminal(Terminal::Forbidden),
            JobResult::Transient(e) => {
                warn!(
                    account = %account.name,
                    proxy = %account.proxy_display(),
                    error = %e,
                    "heartbeat failed this cycle"
                );
            }
        }

        if !sleep_cancellable(&mut cancel, interval).await {
            return JobExit::Cancelled;
        }
    }
}

/// Poll earnings, report the totals, sleep, repeat.
pub async fn run_earnings_loop(ctx: JobContext, interval: Duration) -> JobExit {
    let mut cancel = ctx.cancel.clone();
    let account = &ctx.account;

    loop {
        if *cancel.borrow() {
            return JobExit::Cancelled;
        }

        match ctx.api.earnings(&account.token).await {
            JobResult::Success(earnings) => {
                info!(
                    account = %account.name,
                    proxy = %account.proxy_display(),
                    total_points = earnings.total_points,
                    today_points = earnings.today_points,
                    uptime_hours = format!("{:.2}", earnings.today_uptime_hours()),
                    "earnings"
                );
            }
            JobResult::TokenExpired => return JobExit::Terminal(Terminal::TokenExpired),
            JobResult::Forbidden => return JobExit::Terminal(Terminal::Forbidden),
            JobResult::Transient(e) => {
                warn!(
                    account = %account.name,
                    proxy = %account.proxy_display(),
                    error = %e,
                    "earnings poll failed this cycle"
                );
            }
        }

        if !sleep_cancellable(&mut cancel, interval).await {
            return JobExit::Cancelled;
        }
    }
}
