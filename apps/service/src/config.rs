use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::monitoring::{AlertThreshold, ProbeSettings, Target};
use crate::notifier::ChatId;
use crate::notifier::telegram::DEFAULT_API_URL;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("no config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{name}`: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("no targets configured")]
    NoTargets,

    #[error("duplicate target key `{0}`")]
    DuplicateTarget(String),

    #[error("target `{key}`: {reason}")]
    InvalidTarget { key: String, reason: String },

    #[error("monitor interval must be greater than zero")]
    ZeroInterval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: Telegram,
    pub sites: Sites,
    pub monitor: Monitor,
    pub ssl: Ssl,
    pub http: Http,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Telegram {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ChatId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_chat_id: Option<ChatId>,
    pub api_url: String,
    pub poll_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

/// Base URLs the targets can refer to by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sites {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub interval_seconds: u64,
    pub run_on_start: bool,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub max_retries: u32,
    pub tls_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ssl {
    pub threshold_days: i64,
    pub per_host: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    pub enabled: bool,
    pub bind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseUrl {
    Site,
    Backend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub key: String,
    pub name: String,
    /// Use one of the `[sites]` URLs as base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<BaseUrl>,
    /// Literal base URL, takes precedence over `base`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default)]
    pub verify: bool,
}

/// Everything the service needs after validation
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub recipients: Vec<ChatId>,
    pub targets: Vec<Target>,
    pub threshold: AlertThreshold,
    pub interval: Duration,
    pub run_on_start: bool,
    pub probe: ProbeSettings,
    pub tls_timeout: Duration,
    pub api_url: String,
    pub poll_timeout: Duration,
    pub request_timeout: Duration,
    pub http_bind: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram: Telegram::default(),
            sites: Sites::default(),
            monitor: Monitor::default(),
            ssl: Ssl::default(),
            http: Http::default(),
            targets: default_targets(),
        }
    }
}

impl Default for Telegram {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: None,
            admin_chat_id: None,
            api_url: DEFAULT_API_URL.into(),
            poll_timeout_seconds: 30,
            request_timeout_seconds: 10,
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            run_on_start: false,
            connect_timeout_seconds: 3,
            request_timeout_seconds: 5,
            max_retries: 2,
            tls_timeout_seconds: 5,
        }
    }
}

impl Default for Ssl {
    fn default() -> Self {
        Self { threshold_days: 7, per_host: BTreeMap::new() }
    }
}

impl Default for Http {
    fn default() -> Self {
        Self { enabled: true, bind: "127.0.0.1:8080".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/sitewatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("sitewatch/config.toml"))
}

fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() { "<set>" } else { "<unset>" }
}

fn display_or_unset<T: fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_else(|| "<unset>".into())
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Telegram")?;
        write_1(f, "Token", &redact(&self.telegram.token))?;
        write_1(f, "Chat ID", &display_or_unset(&self.telegram.chat_id))?;
        write_1(f, "Admin Chat ID", &display_or_unset(&self.telegram.admin_chat_id))?;
        write_1(f, "API URL", &self.telegram.api_url)?;

        write_title_1(f, "Sites")?;
        write_1(f, "Website", &display_or_unset(&self.sites.website_url))?;
        write_1(f, "Backend", &display_or_unset(&self.sites.backend_url))?;

        write_title_1(f, "Monitor")?;
        write_1(f, "Interval (s)", &self.monitor.interval_seconds)?;
        write_1(f, "Run On Start", &self.monitor.run_on_start)?;
        write_1(f, "Max Retries", &self.monitor.max_retries)?;

        write_title_1(f, "SSL")?;
        write_1(f, "Threshold (days)", &self.ssl.threshold_days)?;
        for (host, days) in &self.ssl.per_host {
            write_2(f, host.as_str(), days)?;
        }

        write_title_1(f, "HTTP")?;
        write_1(f, "Enabled", &self.http.enabled)?;
        write_1(f, "Bind Address", &self.http.bind)?;

        write_title_1(f, "Targets")?;
        for target in &self.targets {
            write_1(f, target.key.as_str(), &target.name)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/sitewatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            tracing::info!(path = %config_path.display(), "Writing default configuration");
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed = |source| Error::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    /// Apply `TELEGRAM_TOKEN`, `CHAT_ID`, `ADMIN_CHAT_ID`, `WEBSITE_URL` and
    /// `BACKEND_HOST` from the process environment
    pub fn apply_env(&mut self) -> Result<(), Error> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from `lookup`; empty values are ignored
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), Error> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let chat_id = |name: &'static str, value: String| {
            value.parse::<ChatId>().map_err(|_| Error::InvalidValue { name, value })
        };

        if let Some(token) = get("TELEGRAM_TOKEN") {
            self.telegram.token = Some(token);
        }
        if let Some(value) = get("CHAT_ID") {
            self.telegram.chat_id = Some(chat_id("CHAT_ID", value)?);
        }
        if let Some(value) = get("ADMIN_CHAT_ID") {
            self.telegram.admin_chat_id = Some(chat_id("ADMIN_CHAT_ID", value)?);
        }
        if let Some(url) = get("WEBSITE_URL") {
            self.sites.website_url = Some(url);
        }
        if let Some(url) = get("BACKEND_HOST") {
            self.sites.backend_url = Some(url);
        }
        Ok(())
    }

    fn resolve_target(&self, target: &TargetConfig) -> Result<Target, Error> {
        let invalid = |reason: String| Error::InvalidTarget { key: target.key.clone(), reason };

        let base_url = match (&target.url, target.base) {
            (Some(url), _) => url.clone(),
            (None, Some(BaseUrl::Site)) => self
                .sites
                .website_url
                .clone()
                .ok_or_else(|| invalid("base `site` used but WEBSITE_URL is not set".into()))?,
            (None, Some(BaseUrl::Backend)) => self
                .sites
                .backend_url
                .clone()
                .ok_or_else(|| invalid("base `backend` used but BACKEND_HOST is not set".into()))?,
            (None, None) => return Err(invalid("either `url` or `base` is required".into())),
        };

        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&format!("{base_url}{}", target.path))
            .map_err(|e| invalid(format!("invalid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(invalid(format!("not an http(s) URL: {parsed}")));
        }

        Ok(Target {
            key: target.key.clone(),
            name: target.name.clone(),
            base_url,
            path: target.path.clone(),
            keyword: target.keyword.clone().filter(|k| !k.is_empty()),
            verify_tls: target.verify,
        })
    }

    /// Check everything required to run and resolve targets
    pub fn validate(&self) -> Result<Settings, Error> {
        let token = self.telegram.token.clone().ok_or(Error::Missing("TELEGRAM_TOKEN"))?;
        let chat_id = self.telegram.chat_id.ok_or(Error::Missing("CHAT_ID"))?;

        let mut recipients = vec![chat_id];
        if let Some(admin) = self.telegram.admin_chat_id.filter(|admin| *admin != chat_id) {
            recipients.push(admin);
        }

        if self.monitor.interval_seconds == 0 {
            return Err(Error::ZeroInterval);
        }
        if self.targets.is_empty() {
            return Err(Error::NoTargets);
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            if !seen.insert(target.key.as_str()) {
                return Err(Error::DuplicateTarget(target.key.clone()));
            }
            targets.push(self.resolve_target(target)?);
        }

        let threshold = self
            .ssl
            .per_host
            .iter()
            .fold(AlertThreshold::new(self.ssl.threshold_days), |threshold, (host, days)| {
                threshold.with_override(host.to_lowercase(), *days)
            });

        let http_bind = if self.http.enabled {
            let addr = self.http.bind.parse().map_err(|_| Error::InvalidValue {
                name: "http.bind",
                value: self.http.bind.clone(),
            })?;
            Some(addr)
        } else {
            None
        };

        Ok(Settings {
            token,
            recipients,
            targets,
            threshold,
            interval: Duration::from_secs(self.monitor.interval_seconds),
            run_on_start: self.monitor.run_on_start,
            probe: ProbeSettings {
                connect_timeout: Duration::from_secs(self.monitor.connect_timeout_seconds),
                request_timeout: Duration::from_secs(self.monitor.request_timeout_seconds),
                max_retries: self.monitor.max_retries,
                ..ProbeSettings::default()
            },
            tls_timeout: Duration::from_secs(self.monitor.tls_timeout_seconds),
            api_url: self.telegram.api_url.clone(),
            poll_timeout: Duration::from_secs(self.telegram.poll_timeout_seconds),
            request_timeout: Duration::from_secs(self.telegram.request_timeout_seconds),
            http_bind,
        })
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            name: String::new(),
            base: None,
            url: None,
            path: String::new(),
            keyword: None,
            verify: false,
        }
    }
}

/// Targets written into a freshly created config file
pub fn default_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig {
            key: "web_main".into(),
            name: "WEB main".into(),
            base: Some(BaseUrl::Site),
            ..TargetConfig::default()
        },
        TargetConfig {
            key: "api_offers".into(),
            name: "API offers".into(),
            base: Some(BaseUrl::Backend),
            path: "/public/offers".into(),
            ..TargetConfig::default()
        },
    ]
}
