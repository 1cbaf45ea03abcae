//! Models for tracking recently active user sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Most recent observed activity of one login lineage.
pub struct ActiveSession {
    /// Login lineage the record belongs to.
    pub serial_number: String,
    /// Session token seen with the latest activity.
    pub session_id: String,
    /// Timestamp of the latest activity.
    pub last_active: DateTime<Utc>,
}

impl ActiveSession {
    pub fn new(
        serial_number: impl Into<String>,
        session_id: impl Into<String>,
        last_active: DateTime<Utc>,
    ) -> Self {
        Self {
            serial_number: serial_number.into(),
            session_id: session_id.into(),
            last_active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Activity tracking capability of one session type.
pub struct ActivityConfig {
    /// Whether activity is tracked for the session type at all.
    pub supported: bool,
    /// Retention window; zero when unsupported.
    pub duration: Duration,
}

impl ActivityConfig {
    pub fn unsupported() -> Self {
        Self::default()
    }

    pub fn supported(duration: Duration) -> Self {
        Self {
            supported: true,
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_config_has_zero_duration() {
        let config = ActivityConfig::unsupported();
        assert!(!config.supported);
        assert_eq!(config.duration, Duration::ZERO);
    }

    #[test]
    fn supported_config_keeps_duration() {
        let config = ActivityConfig::supported(Duration::from_secs(90));
        assert!(config.supported);
        assert_eq!(config.duration, Duration::from_secs(90));
    }
}
