//! Time-bucketed storage behind the in-memory activity service.
//!
//! A [`RollingWindow`] keeps a short list of [`Bucket`]s, newest first. Writes
//! only ever land in the newest bucket; a background task prepends a fresh
//! bucket every `duration` and drops buckets that can no longer hold records
//! inside the window. Queries merge every retained bucket.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::ActivityError;
use crate::models::{ActiveSession, Session, SessionType};

/// Activity of one user inside one bucket, keyed by serial number.
#[derive(Debug, Clone, Default)]
pub struct UserActivity {
    sessions: HashMap<String, ActiveSession>,
}

impl UserActivity {
    pub fn record_activity(&mut self, serial: &str, session_id: &str, now: DateTime<Utc>) {
        match self.sessions.get_mut(serial) {
            Some(active) => {
                if active.session_id != session_id {
                    active.session_id = session_id.to_string();
                }
                active.last_active = now;
            }
            None => {
                self.sessions.insert(
                    serial.to_string(),
                    ActiveSession::new(serial, session_id, now),
                );
            }
        }
    }

    pub fn purge(&mut self, serial: &str) {
        self.sessions.remove(serial);
    }

    /// Records active strictly after `since`, keyed by serial number.
    pub fn active_since(&self, since: DateTime<Utc>) -> HashMap<String, ActiveSession> {
        self.sessions
            .iter()
            .filter(|(_, active)| active.last_active > since)
            .map(|(serial, active)| (serial.clone(), active.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// All activity observed while the bucket was the write target.
#[derive(Debug, Clone)]
pub struct Bucket {
    created_at: DateTime<Utc>,
    data: HashMap<String, UserActivity>,
}

impl Bucket {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            data: HashMap::new(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn record_activity(
        &mut self,
        uid: &str,
        serial: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) {
        self.data
            .entry(uid.to_string())
            .or_default()
            .record_activity(serial, session_id, now);
    }

    pub fn purge(&mut self, uid: &str, serial: &str) {
        let Some(user) = self.data.get_mut(uid) else {
            return;
        };
        user.purge(serial);
        if user.is_empty() {
            self.data.remove(uid);
        }
    }

    pub fn active_since(&self, uid: &str, since: DateTime<Utc>) -> HashMap<String, ActiveSession> {
        self.data
            .get(uid)
            .map(|user| user.active_since(since))
            .unwrap_or_default()
    }

    pub fn user_count(&self) -> usize {
        self.data.len()
    }
}

/// Sliding window of activity buckets for one session type.
pub struct RollingWindow {
    session_type: SessionType,
    duration: Duration,
    span: TimeDelta,
    buckets: RwLock<Vec<Bucket>>,
    rotation: Mutex<Option<JoinHandle<()>>>,
}

impl RollingWindow {
    /// Creates a window seeded with one bucket stamped now.
    pub fn new(session_type: SessionType, duration: Duration) -> Result<Self, ActivityError> {
        Self::new_at(session_type, duration, Utc::now())
    }

    pub fn new_at(
        session_type: SessionType,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, ActivityError> {
        if duration.is_zero() {
            return Err(ActivityError::InvalidConfig(format!(
                "duration for session type {} must be larger than 0",
                session_type
            )));
        }
        let span = TimeDelta::from_std(duration).map_err(|_| {
            ActivityError::InvalidConfig(format!(
                "duration for session type {} is out of range",
                session_type
            ))
        })?;

        Ok(Self {
            session_type,
            duration,
            span,
            buckets: RwLock::new(vec![Bucket::new(now)]),
            rotation: Mutex::new(None),
        })
    }

    pub fn session_type(&self) -> &SessionType {
        &self.session_type
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn bucket_count(&self) -> usize {
        self.read_buckets().len()
    }

    pub fn record_activity(&self, session: &Session) {
        self.record_activity_at(session, Utc::now());
    }

    /// Writes into the current bucket only. Sessions missing an id, uid or
    /// serial number are ignored.
    pub fn record_activity_at(&self, session: &Session, now: DateTime<Utc>) {
        if !session.is_trackable() {
            return;
        }
        let mut buckets = self.write_buckets();
        if let Some(current) = buckets.first_mut() {
            current.record_activity(&session.uid, session.serial_number(), &session.id, now);
        }
    }

    pub fn query(&self, uid: &str) -> Vec<ActiveSession> {
        self.query_at(uid, Utc::now())
    }

    /// Merges every retained bucket. When a serial number shows up in more
    /// than one bucket the record from the newest bucket wins.
    pub fn query_at(&self, uid: &str, now: DateTime<Utc>) -> Vec<ActiveSession> {
        let since = now - self.span;
        let buckets = self.read_buckets();
        let mut merged: HashMap<String, ActiveSession> = HashMap::new();
        for bucket in buckets.iter() {
            for (serial, active) in bucket.active_since(uid, since) {
                merged.entry(serial).or_insert(active);
            }
        }
        merged.into_values().collect()
    }

    /// Removes the serial number from every retained bucket.
    pub fn purge(&self, uid: &str, serial: &str) {
        let mut buckets = self.write_buckets();
        for bucket in buckets.iter_mut() {
            bucket.purge(uid, serial);
        }
    }

    pub fn rotate(&self) {
        self.rotate_at(Utc::now());
    }

    /// Prepends a fresh bucket and drops buckets that cannot contain records
    /// newer than `now - duration`.
    ///
    /// A bucket stays the write target until the next rotation, one
    /// `duration` after its creation, so it may hold records up to
    /// `created_at + duration`. It is kept while that bound is inside the
    /// window, i.e. while `created_at > now - 2 * duration`.
    pub fn rotate_at(&self, now: DateTime<Utc>) {
        let deadline = now - self.span - self.span;
        let mut buckets = self.write_buckets();
        let previous = buckets.len();
        let mut rotated = Vec::with_capacity(previous + 1);
        rotated.push(Bucket::new(now));
        rotated.extend(
            buckets
                .drain(..)
                .filter(|bucket| bucket.created_at() > deadline),
        );
        let dropped = previous + 1 - rotated.len();
        *buckets = rotated;
        tracing::trace!(
            session_type = %self.session_type,
            retained = buckets.len(),
            dropped,
            "Rotated activity window"
        );
    }

    /// Spawns the rotation task. Calling `start` on a running window is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut rotation = self.rotation.lock().unwrap_or_else(|e| e.into_inner());
        if rotation.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let window: Weak<Self> = Arc::downgrade(self);
        let period = self.duration;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(window) = window.upgrade() else {
                    break;
                };
                window.rotate();
            }
        });
        *rotation = Some(handle);
        tracing::debug!(
            session_type = %self.session_type,
            duration_ms = u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
            "Started activity window rotation"
        );
    }

    /// Stops the rotation task. Stopping a window that never started succeeds.
    pub async fn stop(&self) -> Result<(), ActivityError> {
        let handle = self
            .rotation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };

        handle.abort();
        match handle.await {
            Ok(()) => Ok(()),
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => Err(ActivityError::RotationTask {
                session_type: self.session_type.to_string(),
                message: err.to_string(),
            }),
        }
    }

    fn read_buckets(&self) -> std::sync::RwLockReadGuard<'_, Vec<Bucket>> {
        self.buckets.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_buckets(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Bucket>> {
        self.buckets.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for RollingWindow {
    fn drop(&mut self) {
        let rotation = self
            .rotation
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = rotation {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{session::PAYLOAD_SERIAL_NUMBER, Payloads};

    fn window(duration: Duration, now: DateTime<Utc>) -> RollingWindow {
        RollingWindow::new_at(SessionType::new("web"), duration, now).expect("create window")
    }

    fn session(uid: &str, serial: &str, id: &str) -> Session {
        let mut payloads = Payloads::new();
        payloads.set(PAYLOAD_SERIAL_NUMBER, serial);
        Session::new()
            .with_type("web")
            .with_uid(uid)
            .with_id(id)
            .with_payloads(payloads)
    }

    fn secs(value: i64) -> TimeDelta {
        TimeDelta::seconds(value)
    }

    #[test]
    fn user_activity_refresh_bumps_timestamp_and_token() {
        let t0 = Utc::now();
        let mut user = UserActivity::default();
        user.record_activity("sn", "id-1", t0);
        user.record_activity("sn", "id-2", t0 + secs(5));

        let active = user.active_since(t0);
        assert_eq!(active.len(), 1);
        assert_eq!(active["sn"].session_id, "id-2");
        assert_eq!(active["sn"].last_active, t0 + secs(5));
    }

    #[test]
    fn user_activity_active_since_is_strict() {
        let t0 = Utc::now();
        let mut user = UserActivity::default();
        user.record_activity("sn", "id", t0);

        assert!(user.active_since(t0).is_empty());
        assert_eq!(user.active_since(t0 - secs(1)).len(), 1);
    }

    #[test]
    fn bucket_purge_of_unknown_user_is_noop() {
        let t0 = Utc::now();
        let mut bucket = Bucket::new(t0);
        bucket.purge("nobody", "sn");
        assert!(bucket.active_since("nobody", t0 - secs(1)).is_empty());
    }

    #[test]
    fn bucket_drops_user_when_last_serial_is_purged() {
        let t0 = Utc::now();
        let mut bucket = Bucket::new(t0);
        bucket.record_activity("u1", "sn-1", "id-1", t0);
        bucket.record_activity("u1", "sn-2", "id-2", t0);
        bucket.purge("u1", "sn-1");
        assert_eq!(bucket.user_count(), 1);
        bucket.purge("u1", "sn-2");
        assert_eq!(bucket.user_count(), 0);
    }

    #[test]
    fn new_window_rejects_zero_duration() {
        let result = RollingWindow::new(SessionType::new("web"), Duration::ZERO);
        assert!(matches!(result, Err(ActivityError::InvalidConfig(_))));
    }

    #[test]
    fn record_without_identifiers_is_ignored() {
        let t0 = Utc::now();
        let window = window(Duration::from_secs(10), t0);

        window.record_activity_at(&session("", "sn", "id"), t0);
        window.record_activity_at(&session("u1", "", "id"), t0);
        window.record_activity_at(&session("u1", "sn", ""), t0);

        assert!(window.query_at("u1", t0).is_empty());
        assert!(window.query_at("", t0).is_empty());
    }

    #[test]
    fn query_returns_fresh_activity() {
        let t0 = Utc::now();
        let window = window(Duration::from_secs(10), t0);
        window.record_activity_at(&session("u1", "sn", "id-1"), t0);

        let active = window.query_at("u1", t0 + secs(1));
        assert_eq!(active, vec![ActiveSession::new("sn", "id-1", t0)]);
    }

    #[test]
    fn activity_expires_after_two_durations() {
        let t0 = Utc::now();
        let window = window(Duration::from_secs(10), t0);
        window.record_activity_at(&session("u1", "sn", "id-1"), t0);

        window.rotate_at(t0 + secs(10));
        window.rotate_at(t0 + secs(20));

        assert!(window.query_at("u1", t0 + secs(21)).is_empty());
    }

    #[test]
    fn refresh_extends_lifetime_across_rotations() {
        let t0 = Utc::now();
        let window = window(Duration::from_secs(10), t0);
        window.record_activity_at(&session("u1", "sn", "id-1"), t0);

        window.rotate_at(t0 + secs(10));
        window.record_activity_at(&session("u1", "sn", "id-1"), t0 + secs(15));
        window.rotate_at(t0 + secs(20));

        let active = window.query_at("u1", t0 + secs(24));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].last_active, t0 + secs(15));
    }

    #[test]
    fn newest_bucket_wins_for_the_same_serial() {
        let t0 = Utc::now();
        let window = window(Duration::from_secs(10), t0);
        window.record_activity_at(&session("u1", "sn", "old-token"), t0 + secs(5));
        window.rotate_at(t0 + secs(10));
        window.record_activity_at(&session("u1", "sn", "new-token"), t0 + secs(12));

        let active = window.query_at("u1", t0 + secs(13));
        assert_eq!(active, vec![ActiveSession::new("sn", "new-token", t0 + secs(12))]);
    }

    #[test]
    fn rotation_keeps_at_most_two_buckets_in_steady_state() {
        let t0 = Utc::now();
        let window = window(Duration::from_secs(10), t0);
        for tick in 1..=5 {
            window.rotate_at(t0 + secs(10 * tick));
            assert!(window.bucket_count() <= 2, "tick {tick}");
        }
        assert_eq!(window.bucket_count(), 2);
    }

    #[test]
    fn purge_removes_serial_from_every_bucket() {
        let t0 = Utc::now();
        let window = window(Duration::from_secs(10), t0);
        window.record_activity_at(&session("u1", "sn", "id-1"), t0 + secs(1));
        window.rotate_at(t0 + secs(10));
        window.record_activity_at(&session("u1", "sn", "id-1"), t0 + secs(11));
        window.record_activity_at(&session("u1", "other", "id-2"), t0 + secs(11));

        window.purge("u1", "sn");
        window.purge("u1", "sn");

        let active = window.query_at("u1", t0 + secs(12));
        assert_eq!(active, vec![ActiveSession::new("other", "id-2", t0 + secs(11))]);
    }

    #[test]
    fn users_do_not_see_each_other() {
        let t0 = Utc::now();
        let window = window(Duration::from_secs(10), t0);
        window.record_activity_at(&session("u1", "sn", "id-1"), t0);

        assert!(window.query_at("u2", t0 + secs(1)).is_empty());
    }

    #[tokio::test]
    async fn background_rotation_runs_until_stopped() {
        let window = Arc::new(
            RollingWindow::new(SessionType::new("web"), Duration::from_millis(20))
                .expect("create window"),
        );
        window.start();
        window.start();
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(window.bucket_count() >= 2);

        window.stop().await.expect("stop window");
        window.stop().await.expect("stop twice");
    }
}
