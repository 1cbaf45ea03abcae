//! Activity tracking shared across processes through Redis.
//!
//! Instead of an in-process bucket list every process derives the same
//! time-sliced key for the same instant: `floor(now / duration)` selects the
//! current slice and the slice before it plays the role of the previous
//! bucket. Each key is a hash from serial number to a JSON [`Entry`].

use async_trait::async_trait;
use bb8_redis::redis::{self, AsyncCommands};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::db::redis::RedisPool;
use crate::error::ActivityError;
use crate::models::{ActiveSession, ActivityConfig, Session, SessionType};
use crate::services::activity::ActivityServiceTrait;
use crate::utils::from_unix_seconds;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    id: String,
    last_active: i64,
}

impl Entry {
    fn into_active_session(self, serial_number: String) -> ActiveSession {
        ActiveSession::new(serial_number, self.id, from_unix_seconds(self.last_active))
    }
}

pub struct RedisActivityService {
    pool: RedisPool,
    prefix: String,
    interval: Duration,
    durations: HashMap<SessionType, Duration>,
}

impl RedisActivityService {
    /// `interval` is the minimum spacing between rewrites of one serial
    /// number and must be smaller than every retention duration.
    pub fn new(
        pool: RedisPool,
        prefix: impl Into<String>,
        interval: Duration,
        durations: &HashMap<SessionType, Duration>,
    ) -> Result<Self, ActivityError> {
        for (session_type, duration) in durations {
            if duration.as_millis() == 0 {
                return Err(ActivityError::InvalidConfig(format!(
                    "duration for session type {} must be at least 1ms",
                    session_type
                )));
            }
            if interval >= *duration {
                return Err(ActivityError::InvalidConfig(format!(
                    "interval {:?} must be smaller than the duration {:?} of session type {}",
                    interval, duration, session_type
                )));
            }
        }

        Ok(Self {
            pool,
            prefix: prefix.into(),
            interval,
            durations: durations.clone(),
        })
    }

    fn keys(
        &self,
        session_type: &SessionType,
        uid: &str,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> (Vec<u8>, Vec<u8>) {
        let slice = time_slice(now.timestamp_millis(), duration);
        (
            session_key(&self.prefix, session_type, uid, slice),
            session_key(&self.prefix, session_type, uid, slice.saturating_sub(1)),
        )
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// Index of the time slice containing `now_ms`.
pub fn time_slice(now_ms: i64, duration: Duration) -> u64 {
    let width = millis(duration).max(1);
    now_ms.max(0).div_euclid(width).unsigned_abs()
}

/// `prefix ‖ len ‖ type ‖ len ‖ uid ‖ slice`, lengths and slice big-endian.
pub fn session_key(prefix: &str, session_type: &SessionType, uid: &str, slice: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + session_type.as_str().len() + uid.len() + 16);
    key.extend_from_slice(prefix.as_bytes());
    for segment in [session_type.as_str(), uid] {
        key.extend_from_slice(&(segment.len() as u32).to_be_bytes());
        key.extend_from_slice(segment.as_bytes());
    }
    key.extend_from_slice(&slice.to_be_bytes());
    key
}

/// Coalesces rewrites: an entry is rewritten once it is older than
/// `interval`, or right away when the session token changed.
fn needs_write(stored: Option<&Entry>, session_id: &str, now_secs: i64, interval: Duration) -> bool {
    match stored {
        None => true,
        Some(entry) => {
            entry.id != session_id || entry.last_active < now_secs.saturating_sub(secs(interval))
        }
    }
}

/// Decodes both slices and merges them, current slice first. Entries whose
/// coalesced timestamp is outside the window are dropped.
fn merge_entries(
    current: HashMap<String, Vec<u8>>,
    previous: HashMap<String, Vec<u8>>,
    since_secs: i64,
    interval: Duration,
) -> Result<Vec<ActiveSession>, ActivityError> {
    let slack = secs(interval);
    let mut merged: HashMap<String, Entry> = HashMap::new();
    for slice in [current, previous] {
        for (serial, data) in slice {
            let entry: Entry = serde_json::from_slice(&data)?;
            if entry.last_active.saturating_add(slack) <= since_secs {
                continue;
            }
            merged.entry(serial).or_insert(entry);
        }
    }
    Ok(merged
        .into_iter()
        .map(|(serial, entry)| entry.into_active_session(serial))
        .collect())
}

#[async_trait]
impl ActivityServiceTrait for RedisActivityService {
    fn config(&self, session_type: &SessionType) -> ActivityConfig {
        match self.durations.get(session_type) {
            Some(duration) => ActivityConfig::supported(*duration),
            None => ActivityConfig::unsupported(),
        }
    }

    async fn on_session_active(&self, session: &Session) -> Result<(), ActivityError> {
        let Some(&duration) = self.durations.get(&session.session_type) else {
            return Ok(());
        };
        if !session.is_trackable() {
            return Ok(());
        }

        let span = tracing::debug_span!(
            "redis_record_activity",
            session_type = %session.session_type,
            uid = %session.uid
        );
        async move {
            let now = Utc::now();
            let now_secs = now.timestamp();
            let serial = session.serial_number();
            let (key, _) = self.keys(&session.session_type, &session.uid, now, duration);

            let mut conn = self.pool.get().await?;
            let stored: Option<Vec<u8>> = conn.hget(&key, serial).await?;
            let stored = stored
                .map(|data| serde_json::from_slice::<Entry>(&data))
                .transpose()?;
            if !needs_write(stored.as_ref(), &session.id, now_secs, self.interval) {
                return Ok(());
            }

            let data = serde_json::to_vec(&Entry {
                id: session.id.clone(),
                last_active: now_secs,
            })?;
            redis::pipe()
                .atomic()
                .hset(&key, serial, data)
                .pexpire(&key, millis(duration))
                .query_async::<_, ()>(&mut *conn)
                .await?;
            Ok::<(), ActivityError>(())
        }
        .instrument(span)
        .await
    }

    async fn get_active_sessions(
        &self,
        session_type: &SessionType,
        uid: &str,
    ) -> Result<Vec<ActiveSession>, ActivityError> {
        let Some(&duration) = self.durations.get(session_type) else {
            return Ok(Vec::new());
        };
        if uid.is_empty() {
            return Ok(Vec::new());
        }

        let span = tracing::debug_span!("redis_get_active_sessions", %session_type, uid);
        async move {
            let now = Utc::now();
            let (key, previous_key) = self.keys(session_type, uid, now, duration);
            let since_ms = now
                .timestamp_millis()
                .saturating_sub(millis(duration));

            let mut conn = self.pool.get().await?;
            let (current, previous): (HashMap<String, Vec<u8>>, HashMap<String, Vec<u8>>) =
                redis::pipe()
                    .hgetall(&key)
                    .hgetall(&previous_key)
                    .query_async(&mut *conn)
                    .await?;

            merge_entries(current, previous, since_ms.div_euclid(1000), self.interval)
        }
        .instrument(span)
        .await
    }

    async fn purge_active_session(
        &self,
        session_type: &SessionType,
        uid: &str,
        serial_number: &str,
    ) -> Result<(), ActivityError> {
        let Some(&duration) = self.durations.get(session_type) else {
            return Ok(());
        };
        if uid.is_empty() || serial_number.is_empty() {
            return Ok(());
        }

        let span = tracing::debug_span!("redis_purge_active_session", %session_type, uid);
        async move {
            let (key, previous_key) = self.keys(session_type, uid, Utc::now(), duration);
            let mut conn = self.pool.get().await?;
            redis::pipe()
                .hdel(&key, serial_number)
                .hdel(&previous_key, serial_number)
                .query_async::<_, ()>(&mut *conn)
                .await?;
            Ok::<(), ActivityError>(())
        }
        .instrument(span)
        .await
    }

    fn create_serial_number(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    async fn start(&self) -> Result<(), ActivityError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ActivityError> {
        Ok(())
    }
}
