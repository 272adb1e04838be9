//! HTTP client with bounded retry and response classification.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method, Proxy, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    Account, ApiError, Claim, DailyRewards, Earnings, Heartbeat, JobResult, Mission, RewardClaim,
    TrainingOutcome,
};

/// Default service endpoint.
const DEFAULT_BASE_URL: &str = "https://api.aigaea.net";

/// Connect timeout for each call.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total request timeout for each call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Browser user agent sent with every call.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Heartbeat client version string.
const HEARTBEAT_VERSION: &str = "3.0.1";

/// One logical remote call: method, path, body, and retry budget.
struct Operation {
    name: &'static str,
    method: Method,
    path: &'static str,
    body: Option<serde_json::Value>,
    max_attempts: u32,
    retry_delay: Duration,
    /// Claim-style calls treat an "already ..." rejection as success-class.
    already_ok: bool,
}

/// How a single attempt failed.
enum AttemptFailure {
    TokenExpired,
    Forbidden,
    Retryable(ApiError),
}

/// What a single attempt produced.
enum AttemptPayload {
    Data(serde_json::Value),
    AlreadyClaimed,
}

/// Client for one account's calls against the network service.
///
/// Cheap to clone; HTTP connections are scoped per call (built, used,
/// dropped), so no connection state is ever shared across accounts.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    proxy: Option<String>,
    /// When set, overrides every operation's inter-attempt delay.
    retry_delay: Option<Duration>,
}

impl ApiClient {
    /// Create a client for the default service endpoint.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client for a specific endpoint (tests, staging).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            proxy: None,
            retry_delay: None,
        }
    }

    /// Route all calls through the given proxy URI.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Override the fixed inter-attempt delay for every operation.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Fetch the earnings summary.
    pub async fn earnings(&self, token: &str) -> JobResult<Earnings> {
        let op = Operation {
            name: "earnings",
            method: Method::GET,
            path: "/api/earn/info",
            body: None,
            max_attempts: 5,
            retry_delay: Duration::from_secs(2),
            already_ok: false,
        };
        parse(self.execute(&op, token).await)
    }

    /// Send a heartbeat ping for this device.
    pub async fn heartbeat(&self, token: &str, browser_id: &str, uid: &str) -> JobResult<Heartbeat> {
        let op = Operation {
            name: "heartbeat",
            method: Method::POST,
            path: "/api/network/ping",
            body: Some(json!({
                "browser_id": browser_id,
                "timestamp": Utc::now().timestamp(),
                "uid": uid,
                "version": HEARTBEAT_VERSION,
            })),
            max_attempts: 2,
            retry_delay: Duration::from_secs(5),
            already_ok: false,
        };
        parse(self.execute(&op, token).await)
    }

    /// List missions with their current status.
    pub async fn missions(&self, token: &str) -> JobResult<Vec<Mission>> {
        let op = Operation {
            name: "missions",
            method: Method::GET,
            path: "/api/mission/list",
            body: None,
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            already_ok: false,
        };
        parse(self.execute(&op, token).await)
    }

    /// Complete one mission by id.
    pub async fn complete_mission(
        &self,
        token: &str,
        id: i64,
    ) -> JobResult<Claim<serde_json::Value>> {
        let op = Operation {
            name: "complete_mission",
            method: Method::POST,
            path: "/api/mission/complete",
            body: Some(json!({ "mission_id": id })),
            max_attempts: 3,
            retry_delay: Duration::from_secs(3),
            already_ok: true,
        };
        self.execute_claim(&op, token).await
    }

    /// Fetch the daily reward state.
    pub async fn daily_rewards(&self, token: &str) -> JobResult<DailyRewards> {
        let op = Operation {
            name: "daily_rewards",
            method: Method::GET,
            path: "/api/reward/list",
            body: None,
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            already_ok: false,
        };
        parse(self.execute(&op, token).await)
    }

    /// Claim one daily reward slot by id.
    pub async fn claim_daily_reward(&self, token: &str, id: i64) -> JobResult<Claim<RewardClaim>> {
        let op = Operation {
            name: "claim_daily_reward",
            method: Method::POST,
            path: "/api/reward/claim",
            body: Some(json!({ "reward_id": id })),
            max_attempts: 3,
            retry_delay: Duration::from_secs(3),
            already_ok: true,
        };
        match self.execute_claim(&op, token).await {
            JobResult::Success(Claim::Granted(value)) => {
                parse::<RewardClaim>(JobResult::Success(value))
                    .map(Claim::Granted)
            }
            JobResult::Success(Claim::AlreadyClaimed) => {
                JobResult::Success(Claim::AlreadyClaimed)
            }
            JobResult::TokenExpired => JobResult::TokenExpired,
            JobResult::Forbidden => JobResult::Forbidden,
            JobResult::Transient(e) => JobResult::Transient(e),
        }
    }

    /// Run the daily training claim.
    pub async fn complete_training(&self, token: &str) -> JobResult<Claim<TrainingOutcome>> {
        let op = Operation {
            name: "complete_training",
            method: Method::POST,
            path: "/api/ai/complete",
            body: Some(json!({ "detail": "" })),
            max_attempts: 3,
            retry_delay: Duration::from_secs(3),
            already_ok: true,
        };
        match self.execute_claim(&op, token).await {
            JobResult::Success(Claim::Granted(value)) => {
                parse::<TrainingOutcome>(JobResult::Success(value)).map(Claim::Granted)
            }
            JobResult::Success(Claim::AlreadyClaimed) => {
                JobResult::Success(Claim::AlreadyClaimed)
            }
            JobResult::TokenExpired => JobResult::TokenExpired,
            JobResult::Forbidden => JobResult::Forbidden,
            JobResult::Transient(e) => JobResult::Transient(e),
        }
    }

    /// Execute an operation whose payload is plain data.
    async fn execute(&self, op: &Operation, token: &str) -> JobResult<serde_json::Value> {
        match self.execute_inner(op, token).await {
            JobResult::Success(AttemptPayload::Data(value)) => JobResult::Success(value),
            // Non-claim operations never produce this; map to empty data.
            JobResult::Success(AttemptPayload::AlreadyClaimed) => {
                JobResult::Success(serde_json::Value::Null)
            }
            JobResult::TokenExpired => JobResult::TokenExpired,
            JobResult::Forbidden => JobResult::Forbidden,
            JobResult::Transient(e) => JobResult::Transient(e),
        }
    }

    /// Execute a claim-style operation.
    async fn execute_claim(
        &self,
        op: &Operation,
        token: &str,
    ) -> JobResult<Claim<serde_json::Value>> {
        match self.execute_inner(op, token).await {
            JobResult::Success(AttemptPayload::Data(value)) => {
                JobResult::Success(Claim::Granted(value))
            }
            JobResult::Success(AttemptPayload::AlreadyClaimed) => {
                JobResult::Success(Claim::AlreadyClaimed)
            }
            JobResult::TokenExpired => JobResult::TokenExpired,
            JobResult::Forbidden => JobResult::Forbidden,
            JobResult::Transient(e) => JobResult::Transient(e),
        }
    }

    /// The one retry loop shared by every operation.
    ///
    /// Retries retryable failures up to `op.max_attempts` with a fixed
    /// inter-attempt delay. Terminal classifications short-circuit
    /// immediately and are never retried.
    async fn execute_inner(&self, op: &Operation, token: &str) -> JobResult<AttemptPayload> {
        let delay = self.retry_delay.unwrap_or(op.retry_delay);
        let mut last_error = None;

        for attempt in 0..op.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
            }

            match self.attempt(op, token).await {
                Ok(payload) => return JobResult::Success(payload),
                Err(AttemptFailure::TokenExpired) => return JobResult::TokenExpired,
                Err(AttemptFailure::Forbidden) => return JobResult::Forbidden,
                Err(AttemptFailure::Retryable(e)) => {
                    warn!(
                        op = op.name,
                        attempt = attempt + 1,
                        max_attempts = op.max_attempts,
                        error = %e,
                        "attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        JobResult::Transient(last_error.unwrap_or(ApiError::RetriesExhausted))
    }

    /// Perform one attempt and classify the response.
    async fn attempt(
        &self,
        op: &Operation,
        token: &str,
    ) -> Result<AttemptPayload, AttemptFailure> {
        let client = self.http_client().map_err(AttemptFailure::Retryable)?;

        let url = format!("{}{}", self.base_url, op.path);
        let mut request = client
            .request(op.method.clone(), &url)
            .header("Authorization", format!("Bearer {}", token));
        if let Some(body) = &op.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptFailure::Retryable(e.into()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AttemptFailure::TokenExpired);
        }
        if status == StatusCode::FORBIDDEN {
            return Err(AttemptFailure::Forbidden);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptFailure::Retryable(ApiError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            }));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AttemptFailure::Retryable(e.into()))?;
        debug!(op = op.name, body = %truncate(&text, 200), "raw response");

        let envelope: Envelope =
            serde_json::from_str(&text).map_err(|e| AttemptFailure::Retryable(e.into()))?;

        if envelope.success == Some(true) {
            return Ok(AttemptPayload::Data(
                envelope.data.unwrap_or(serde_json::Value::Null),
            ));
        }

        // Some deployments report credential expiry inside a 200 body.
        if envelope.code == Some(401) {
            return Err(AttemptFailure::TokenExpired);
        }

        let msg = envelope.msg.unwrap_or_default();
        if op.already_ok && msg.to_ascii_lowercase().contains("already") {
            return Ok(AttemptPayload::AlreadyClaimed);
        }

        Err(AttemptFailure::Retryable(ApiError::Unsuccessful {
            code: envelope.code,
            msg,
        }))
    }

    /// Build the HTTP client for one call.
    fn http_client(&self) -> Result<Client, ApiError> {
        let mut builder = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT);

        if let Some(proxy) = &self.proxy {
            let proxy = Proxy::all(proxy).map_err(|e| ApiError::Proxy {
                proxy: proxy.clone(),
                reason: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(ApiError::from)
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    /// Build a client for one account, applying its proxy when enabled.
    pub fn for_account(base_url: &str, account: &Account, use_proxy: bool) -> Self {
        let proxy = if use_proxy { account.proxy.clone() } else { None };
        Self::with_base_url(base_url).with_proxy(proxy)
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, serde::Deserialize)]
struct Envelope {
    success: Option<bool>,
    code: Option<i64>,
    msg: Option<String>,
    data: Option<serde_json::Value>,
}

/// Deserialize a success payload, preserving the other variants.
fn parse<T: DeserializeOwned>(result: JobResult<serde_json::Value>) -> JobResult<T> {
    match result {
        JobResult::Success(value) => match serde_json::from_value(value) {
            Ok(payload) => JobResult::Success(payload),
            Err(e) => JobResult::Transient(e.into()),
        },
        JobResult::TokenExpired => JobResult::TokenExpired,
        JobResult::Forbidden => JobResult::Forbidden,
        JobResult::Transient(e) => JobResult::Transient(e),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
