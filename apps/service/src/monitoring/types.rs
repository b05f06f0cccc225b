use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use url::{Host, Url};

/// Last known health of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Up,
    Down,
}

impl From<bool> for HealthState {
    fn from(healthy: bool) -> Self {
        if healthy { HealthState::Up } else { HealthState::Down }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Up => write!(f, "up"),
            HealthState::Down => write!(f, "down"),
            HealthState::Unknown => write!(f, "unknown"),
        }
    }
}

/// An HTTP endpoint to health-check, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// Unique identifier used for state tracking
    pub key: String,

    /// Name used in alerts and status replies
    pub name: String,

    /// Scheme and authority, e.g. `https://example.com`
    pub base_url: String,

    /// Appended verbatim to `base_url`
    pub path: String,

    /// Substring the response body must contain to count as healthy
    pub keyword: Option<String>,

    /// Whether the probe itself verifies the server certificate
    pub verify_tls: bool,
}

impl Target {
    pub fn new(key: impl Into<String>, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            base_url: base_url.into(),
            path: String::new(),
            keyword: None,
            verify_tls: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Full URL probed by the HTTP check
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    /// Host used for the certificate check
    pub fn host(&self) -> String {
        host_from_url(&self.base_url)
    }
}

/// Extract the hostname of `url`, falling back to the raw text when there is none.
pub fn host_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed.host().map(|host| match host {
                Host::Ipv6(addr) => addr.to_string(),
                other => other.to_string(),
            })
        })
        .unwrap_or_else(|| url.to_string())
}

/// Unique hosts among `targets`, sorted
pub fn unique_hosts(targets: &[Target]) -> Vec<String> {
    targets.iter().map(Target::host).collect::<BTreeSet<_>>().into_iter().collect()
}

/// Outcome of a single HTTP probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub healthy: bool,

    /// Time until the response was fully read, absent when nothing came back
    pub latency: Option<Duration>,

    pub status_code: Option<u16>,
}

impl ProbeResult {
    /// A response was received and evaluated
    pub fn responded(healthy: bool, latency: Duration, status_code: u16) -> Self {
        Self { healthy, latency: Some(latency), status_code: Some(status_code) }
    }

    /// Network-level failure, nothing to report but the failure itself
    pub fn no_response() -> Self {
        Self { healthy: false, latency: None, status_code: None }
    }

    pub fn state(&self) -> HealthState {
        HealthState::from(self.healthy)
    }
}

/// Days-remaining threshold for certificate alerts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertThreshold {
    default_days: i64,
    per_host: HashMap<String, i64>,
}

impl AlertThreshold {
    pub fn new(default_days: i64) -> Self {
        Self { default_days, per_host: HashMap::new() }
    }

    pub fn with_override(mut self, host: impl Into<String>, days: i64) -> Self {
        self.per_host.insert(host.into(), days);
        self
    }

    /// Override for `host` if present, the default otherwise
    pub fn for_host(&self, host: &str) -> i64 {
        self.per_host.get(host).copied().unwrap_or(self.default_days)
    }

    /// Strictly below the applicable threshold
    pub fn is_expiring(&self, host: &str, days: i64) -> bool {
        days < self.for_host(host)
    }
}

impl Default for AlertThreshold {
    fn default() -> Self {
        Self::new(7)
    }
}
