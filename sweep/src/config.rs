use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Upstream hard limit on actors per `getProfiles` call.
pub const MAX_ACTORS_PER_LOOKUP: usize = 25;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base URL of the service hosting the account (PDS or entryway).
    pub service_url: String,

    /// Per-request HTTP timeout.
    pub http_timeout: Duration,

    /// JSON file holding the session a login front-end persisted.
    pub session_file: Option<PathBuf>,

    /// Line-delimited JSON logs instead of the pretty console layout.
    pub json_logs: bool,

    pub fetch: FetchConfig,
}

/// Tuning for the bulk detailed-profile fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchConfig {
    /// Maximum actors per multi-actor lookup.
    /// Must stay within [`MAX_ACTORS_PER_LOOKUP`].
    pub group_size: usize,

    /// Groups in flight at once. Since a group never has more than one
    /// call outstanding, this is also the bound on concurrent upstream calls.
    pub concurrency: usize,

    /// Multi-actor attempts per group before falling back to
    /// single-actor lookups.
    pub max_retries: u32,

    /// Linear backoff base: attempt `n` waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,

    /// Pause between waves. Never applied after the last wave.
    pub inter_group_delay_ms: u64,

    /// Abort the whole batch as soon as the upstream rejects the session.
    pub abort_on_session_failure: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            group_size: MAX_ACTORS_PER_LOOKUP,
            concurrency: 6,
            max_retries: 3,
            retry_backoff_ms: 500,
            inter_group_delay_ms: 250,
            abort_on_session_failure: true,
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_size == 0 || self.group_size > MAX_ACTORS_PER_LOOKUP {
            return Err(ConfigError::GroupSize {
                got: self.group_size,
                max: MAX_ACTORS_PER_LOOKUP,
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Concurrency);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::MaxRetries);
        }
        Ok(())
    }

    /// Delay slept after the `attempt`-th failed multi-actor call (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn inter_group_delay(&self) -> Duration {
        Duration::from_millis(self.inter_group_delay_ms)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_source<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = FetchConfig::default();

        let fetch = FetchConfig {
            group_size: parse_or(&get, "SWEEP_GROUP_SIZE", defaults.group_size)?,
            concurrency: parse_or(&get, "SWEEP_CONCURRENCY", defaults.concurrency)?,
            max_retries: parse_or(&get, "SWEEP_MAX_RETRIES", defaults.max_retries)?,
            retry_backoff_ms: parse_or(&get, "SWEEP_RETRY_BACKOFF_MS", defaults.retry_backoff_ms)?,
            inter_group_delay_ms: parse_or(
                &get,
                "SWEEP_INTER_GROUP_DELAY_MS",
                defaults.inter_group_delay_ms,
            )?,
            abort_on_session_failure: parse_or(
                &get,
                "SWEEP_ABORT_ON_SESSION_FAILURE",
                defaults.abort_on_session_failure,
            )?,
        };

        Ok(Self {
            service_url: get("SWEEP_SERVICE_URL")
                .unwrap_or_else(|| "https://bsky.social".to_string()),
            http_timeout: Duration::from_secs(parse_or(&get, "SWEEP_HTTP_TIMEOUT_SECS", 10u64)?),
            session_file: get("SWEEP_SESSION_FILE").map(PathBuf::from),
            json_logs: get("APP_ENV").as_deref() == Some("production"),
            fetch,
        })
    }
}

fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
    }
}
