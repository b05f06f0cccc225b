use anyhow::Result;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    RetryTransientMiddleware, Retryable, RetryableStrategy, policies::ExponentialBackoff,
};
use std::time::{Duration, Instant};

use super::types::{ProbeResult, Target};

const USER_AGENT: &str = "WebsiteChecker/1.0";

/// Server errors worth a second attempt, anything else is reported as is
const RETRY_STATUSES: [StatusCode; 4] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Probe trait for HTTP health checks
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Evaluate `target` once. Network failures are reported as unhealthy, never as errors.
    async fn probe(&self, target: &Target) -> ProbeResult;
}

/// Timeouts and retry budget for [`HttpProber`]
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub min_retry_interval: Duration,
    pub max_retry_interval: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            max_retries: 2,
            min_retry_interval: Duration::from_millis(500),
            max_retry_interval: Duration::from_secs(2),
        }
    }
}

/// Retries only on [`RETRY_STATUSES`], client and network errors fail straight away
struct ServerErrorStrategy;

impl RetryableStrategy for ServerErrorStrategy {
    fn handle(
        &self,
        res: &std::result::Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) if RETRY_STATUSES.contains(&response.status()) => {
                Some(Retryable::Transient)
            }
            Ok(_) => None,
            Err(_) => Some(Retryable::Fatal),
        }
    }
}

/// HTTP prober with one client per TLS verification policy
pub struct HttpProber {
    verifying: ClientWithMiddleware,
    insecure: ClientWithMiddleware,
}

impl HttpProber {
    pub fn new(settings: ProbeSettings) -> Result<Self> {
        Ok(Self { verifying: build_client(&settings, true)?, insecure: build_client(&settings, false)? })
    }

    fn client_for(&self, target: &Target) -> &ClientWithMiddleware {
        if target.verify_tls { &self.verifying } else { &self.insecure }
    }
}

fn build_client(settings: &ProbeSettings, verify_tls: bool) -> Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .danger_accept_invalid_certs(!verify_tls)
        .build()?;

    let policy = ExponentialBackoff::builder()
        .retry_bounds(settings.min_retry_interval, settings.max_retry_interval)
        .build_with_max_retries(settings.max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy_and_strategy(policy, ServerErrorStrategy))
        .build())
}

#[async_trait::async_trait]
impl Probe for HttpProber {
    async fn probe(&self, target: &Target) -> ProbeResult {
        let url = target.url();
        let start = Instant::now();

        let response = match self.client_for(target).get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "HTTP probe failed");
                return ProbeResult::no_response();
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Reading response body failed");
                return ProbeResult::no_response();
            }
        };
        let body_ok = target.keyword.as_deref().is_none_or(|keyword| body.contains(keyword));

        let latency = start.elapsed();
        ProbeResult::responded(status.is_success() && body_ok, latency, status.as_u16())
    }
}
