//! Application configuration, loaded from the process environment.

use figment::value::UncasedStr;
use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Runtime configuration for the service.
///
/// All keys are read case-insensitively from raw environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Root URL of the school portal, e.g. `https://school.example.fi/`.
    pub portal_base_url: Url,
    #[serde(flatten)]
    pub browser: BrowserConfig,
    #[serde(flatten)]
    pub timeouts: TimeoutConfig,
    #[serde(flatten)]
    pub jobs: JobConfig,
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
}

/// Headless browser launch options.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default, rename = "browser_executable")]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_true", rename = "browser_headless")]
    pub headless: bool,
    #[serde(default, rename = "browser_no_sandbox")]
    pub no_sandbox: bool,
}

/// Bounds on every suspension point that talks to the portal.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeoutConfig {
    #[serde(
        default = "default_navigation_timeout",
        deserialize_with = "deserialize_duration",
        rename = "navigation_timeout"
    )]
    pub navigation: Duration,
    #[serde(
        default = "default_selector_timeout",
        deserialize_with = "deserialize_duration",
        rename = "selector_timeout"
    )]
    pub selector: Duration,
    #[serde(
        default = "default_expand_timeout",
        deserialize_with = "deserialize_duration",
        rename = "expand_timeout"
    )]
    pub expand: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation: default_navigation_timeout(),
            selector: default_selector_timeout(),
            expand: default_expand_timeout(),
        }
    }
}

/// Job lifecycle tuning.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct JobConfig {
    #[serde(
        default = "default_job_timeout",
        deserialize_with = "deserialize_duration",
        rename = "job_timeout"
    )]
    pub timeout: Duration,
    #[serde(
        default = "default_job_retention",
        deserialize_with = "deserialize_duration",
        rename = "job_retention"
    )]
    pub retention: Duration,
    #[serde(
        default = "default_heartbeat_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub heartbeat_interval: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            timeout: default_job_timeout(),
            retention: default_job_retention(),
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

impl Config {
    /// Build the figment used to extract [`Config`].
    ///
    /// `PORTAL_URL` is accepted as an alias of `PORTAL_BASE_URL`.
    pub fn figment() -> Figment {
        Figment::new().merge(Env::raw().map(|k| {
            if k == UncasedStr::new("PORTAL_URL") {
                "PORTAL_BASE_URL".into()
            } else {
                k.into()
            }
        }))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_navigation_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_selector_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_expand_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_job_timeout() -> Duration {
    Duration::from_secs(3 * 60)
}

fn default_job_retention() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

/// Parse a human duration such as `500ms`, `10s` or `5m`.
///
/// A bare integer is interpreted as seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let parser = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ]);
    let parsed = parser
        .parse(raw)
        .map_err(|e| format!("invalid duration '{raw}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{raw}': {e}"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
