//! Activity tracking capability shared by the in-memory and Redis backends.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{ActivityBackend, ActivitySettings, Config};
use crate::db::redis::create_redis_pool;
use crate::error::ActivityError;
use crate::models::{ActiveSession, ActivityConfig, Session, SessionType};
use crate::services::memory_activity::MemoryActivityService;
use crate::services::redis_activity::RedisActivityService;

/// Tracks which sessions were recently active for each user.
///
/// Unknown session types, users and serial numbers are never errors: they
/// resolve to empty results or silent no-ops.
#[async_trait]
pub trait ActivityServiceTrait: Send + Sync {
    /// Capability discovery for one session type.
    fn config(&self, session_type: &SessionType) -> ActivityConfig;

    /// Called on every authenticated request.
    async fn on_session_active(&self, session: &Session) -> Result<(), ActivityError>;

    async fn get_active_sessions(
        &self,
        session_type: &SessionType,
        uid: &str,
    ) -> Result<Vec<ActiveSession>, ActivityError>;

    /// Revokes one login lineage before it expires naturally.
    async fn purge_active_session(
        &self,
        session_type: &SessionType,
        uid: &str,
        serial_number: &str,
    ) -> Result<(), ActivityError>;

    /// Mints the lineage identifier stored in a new session's payloads.
    fn create_serial_number(&self) -> String;

    async fn start(&self) -> Result<(), ActivityError>;

    async fn stop(&self) -> Result<(), ActivityError>;
}

/// Purge-on-logout hook: forgets the serial number carried by `session`.
pub async fn purge_session(
    service: &dyn ActivityServiceTrait,
    session: Option<&Session>,
) -> Result<(), ActivityError> {
    let Some(session) = session else {
        return Ok(());
    };
    service
        .purge_active_session(&session.session_type, &session.uid, session.serial_number())
        .await
}

/// Builds the configured backend. Nothing is started yet.
pub async fn create_activity_service(
    config: &Config,
) -> anyhow::Result<Arc<dyn ActivityServiceTrait>> {
    let settings: &ActivitySettings = &config.activity;
    settings.validate()?;

    let service: Arc<dyn ActivityServiceTrait> = match settings.backend {
        ActivityBackend::Memory => Arc::new(MemoryActivityService::new(&settings.durations)?),
        ActivityBackend::Redis => {
            let Some(pool) = create_redis_pool(config).await? else {
                return Err(ActivityError::InvalidConfig(
                    "REDIS_URL is required for the redis activity backend".to_string(),
                )
                .into());
            };
            Arc::new(RedisActivityService::new(
                pool,
                settings.redis_prefix.clone(),
                settings.interval,
                &settings.durations,
            )?)
        }
    };

    tracing::info!(
        backend = %settings.backend,
        session_types = settings.durations.len(),
        "Activity service configured"
    );
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{session::PAYLOAD_SERIAL_NUMBER, Payloads};
    use std::collections::HashMap;
    use std::time::Duration;

    fn service() -> MemoryActivityService {
        let durations = HashMap::from([(SessionType::new("web"), Duration::from_secs(60))]);
        MemoryActivityService::new(&durations).expect("create service")
    }

    #[tokio::test]
    async fn purge_session_ignores_missing_session() {
        let service = service();
        purge_session(&service, None).await.expect("purge none");
    }

    #[tokio::test]
    async fn purge_session_uses_serial_from_payloads() {
        let service = service();
        let mut payloads = Payloads::new();
        payloads.set(PAYLOAD_SERIAL_NUMBER, "sn-1");
        let session = Session::new()
            .with_type("web")
            .with_uid("u1")
            .with_id("token")
            .with_payloads(payloads);

        service.on_session_active(&session).await.expect("record");
        purge_session(&service, Some(&session)).await.expect("purge");

        let active = service
            .get_active_sessions(&SessionType::new("web"), "u1")
            .await
            .expect("query");
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn create_activity_service_rejects_redis_without_url() {
        let mut config = Config::default();
        config.activity.backend = ActivityBackend::Redis;
        config.redis_url = None;

        let result = create_activity_service(&config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn create_activity_service_builds_memory_backend() {
        let config = Config::default();
        let service = create_activity_service(&config)
            .await
            .expect("create service");
        assert!(service.config(&SessionType::new("web")).supported);
    }
}
