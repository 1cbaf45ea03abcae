//! Process-local activity tracking backed by one rolling window per session type.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ActivityError;
use crate::models::{ActiveSession, ActivityConfig, Session, SessionType};
use crate::services::activity::ActivityServiceTrait;
use crate::services::rolling_window::RollingWindow;

pub struct MemoryActivityService {
    windows: HashMap<SessionType, Arc<RollingWindow>>,
}

impl MemoryActivityService {
    /// Creates one window per configured session type. Fails on a zero duration.
    pub fn new(durations: &HashMap<SessionType, Duration>) -> Result<Self, ActivityError> {
        let mut windows = HashMap::with_capacity(durations.len());
        for (session_type, duration) in durations {
            let window = RollingWindow::new(session_type.clone(), *duration)?;
            windows.insert(session_type.clone(), Arc::new(window));
        }
        Ok(Self { windows })
    }
}

#[async_trait]
impl ActivityServiceTrait for MemoryActivityService {
    fn config(&self, session_type: &SessionType) -> ActivityConfig {
        match self.windows.get(session_type) {
            Some(window) => ActivityConfig::supported(window.duration()),
            None => ActivityConfig::unsupported(),
        }
    }

    async fn on_session_active(&self, session: &Session) -> Result<(), ActivityError> {
        if let Some(window) = self.windows.get(&session.session_type) {
            window.record_activity(session);
        }
        Ok(())
    }

    async fn get_active_sessions(
        &self,
        session_type: &SessionType,
        uid: &str,
    ) -> Result<Vec<ActiveSession>, ActivityError> {
        Ok(self
            .windows
            .get(session_type)
            .map(|window| window.query(uid))
            .unwrap_or_default())
    }

    async fn purge_active_session(
        &self,
        session_type: &SessionType,
        uid: &str,
        serial_number: &str,
    ) -> Result<(), ActivityError> {
        if uid.is_empty() || serial_number.is_empty() {
            return Ok(());
        }
        if let Some(window) = self.windows.get(session_type) {
            window.purge(uid, serial_number);
        }
        Ok(())
    }

    fn create_serial_number(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    async fn start(&self) -> Result<(), ActivityError> {
        for window in self.windows.values() {
            window.start();
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ActivityError> {
        let mut errors = Vec::new();
        for window in self.windows.values() {
            if let Err(err) = window.stop().await {
                tracing::warn!(
                    session_type = %window.session_type(),
                    error = %err,
                    "Failed to stop activity window"
                );
                errors.push(err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ActivityError::Stop(errors))
        }
    }
}
