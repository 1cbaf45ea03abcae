use anyhow::anyhow;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ActivityError;
use crate::models::SessionType;
use crate::utils::parse_duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DURATIONS: &str = "web=30m";
const DEFAULT_REDIS_PREFIX: &str = "activesessions:";
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityBackend {
    #[default]
    Memory,
    Redis,
}

impl fmt::Display for ActivityBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityBackend::Memory => f.write_str("memory"),
            ActivityBackend::Redis => f.write_str("redis"),
        }
    }
}

impl FromStr for ActivityBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(ActivityBackend::Memory),
            "redis" => Ok(ActivityBackend::Redis),
            other => Err(anyhow!("Invalid ACTIVITY_BACKEND value: {}", other)),
        }
    }
}

/// Per session type retention and remote store tuning.
#[derive(Debug, Clone)]
pub struct ActivitySettings {
    pub backend: ActivityBackend,
    pub durations: HashMap<SessionType, Duration>,
    /// Key prefix shared by every process using the same Redis database.
    pub redis_prefix: String,
    /// Minimum spacing between rewrites of one serial number (Redis only).
    pub interval: Duration,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            backend: ActivityBackend::Memory,
            durations: HashMap::from([(SessionType::new("web"), Duration::from_secs(30 * 60))]),
            redis_prefix: DEFAULT_REDIS_PREFIX.to_string(),
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl ActivitySettings {
    pub fn validate(&self) -> Result<(), ActivityError> {
        for (session_type, duration) in &self.durations {
            if session_type.as_str().is_empty() {
                return Err(ActivityError::InvalidConfig(
                    "session type name must not be empty".to_string(),
                ));
            }
            if duration.is_zero() {
                return Err(ActivityError::InvalidConfig(format!(
                    "duration for session type {} must be larger than 0",
                    session_type
                )));
            }
            if self.backend == ActivityBackend::Redis && self.interval >= *duration {
                return Err(ActivityError::InvalidConfig(format!(
                    "interval {:?} must be smaller than the duration {:?} of session type {}",
                    self.interval, duration, session_type
                )));
            }
        }
        Ok(())
    }
}

/// Parses `type=duration` pairs separated by commas, e.g. `web=30m,api=2h`.
pub fn parse_durations(raw: &str) -> anyhow::Result<HashMap<SessionType, Duration>> {
    let mut durations = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid ACTIVITY_DURATIONS entry: {}", pair))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("Invalid ACTIVITY_DURATIONS entry: {}", pair));
        }
        let duration = parse_duration(value)
            .map_err(|e| anyhow!("Invalid duration for session type {}: {}", name, e))?;
        if duration.is_zero() {
            return Err(anyhow!(
                "Invalid duration for session type {}: duration must larger than 0",
                name
            ));
        }
        durations.insert(SessionType::new(name), duration);
    }
    Ok(durations)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub activity: ActivitySettings,
    pub redis_url: Option<String>,
    pub redis_pool_size: u32,
    pub redis_connect_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            activity: ActivitySettings::default(),
            redis_url: None,
            redis_pool_size: 10,
            redis_connect_timeout: 5,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let backend = match lookup("ACTIVITY_BACKEND") {
            Some(raw) => raw.parse()?,
            None => ActivityBackend::default(),
        };

        let durations = parse_durations(
            &lookup("ACTIVITY_DURATIONS").unwrap_or_else(|| DEFAULT_DURATIONS.to_string()),
        )?;

        let redis_prefix =
            lookup("ACTIVITY_REDIS_PREFIX").unwrap_or_else(|| DEFAULT_REDIS_PREFIX.to_string());

        let interval = match lookup("ACTIVITY_REDIS_INTERVAL") {
            Some(raw) => parse_duration(&raw)
                .map_err(|e| anyhow!("Invalid ACTIVITY_REDIS_INTERVAL value: {}", e))?,
            None => DEFAULT_INTERVAL,
        };

        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());

        let redis_pool_size = lookup("REDIS_POOL_SIZE")
            .and_then(|value| value.parse().ok())
            .filter(|value| *value > 0)
            .unwrap_or(10);

        let redis_connect_timeout = lookup("REDIS_CONNECT_TIMEOUT")
            .and_then(|value| value.parse().ok())
            .filter(|value| *value > 0)
            .unwrap_or(5);

        let activity = ActivitySettings {
            backend,
            durations,
            redis_prefix,
            interval,
        };
        activity.validate()?;
        if activity.backend == ActivityBackend::Redis && redis_url.is_none() {
            return Err(anyhow!("REDIS_URL is required when ACTIVITY_BACKEND=redis"));
        }

        Ok(Config {
            bind_addr,
            activity,
            redis_url,
            redis_pool_size,
            redis_connect_timeout,
        })
    }
}
