#![allow(dead_code)]
use std::{collections::HashMap, sync::Arc, time::Duration};

use sessionwatch_backend::{
    config::Config,
    models::{session::PAYLOAD_SERIAL_NUMBER, Payloads, Session, SessionType},
    services::{memory_activity::MemoryActivityService, ActivityServiceTrait},
    state::AppState,
};

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.activity.durations = HashMap::from([
        (SessionType::new("web"), Duration::from_secs(60)),
        (SessionType::new("api"), Duration::from_secs(120)),
    ]);
    config.redis_url = None;
    config
}

pub fn memory_service(durations: &[(&str, Duration)]) -> Arc<dyn ActivityServiceTrait> {
    let durations: HashMap<SessionType, Duration> = durations
        .iter()
        .map(|(name, duration)| (SessionType::new(*name), *duration))
        .collect();
    Arc::new(MemoryActivityService::new(&durations).expect("create memory activity service"))
}

pub fn test_state() -> AppState {
    let config = test_config();
    let activity = Arc::new(
        MemoryActivityService::new(&config.activity.durations)
            .expect("create memory activity service"),
    );
    AppState::new(activity, config)
}

pub fn session(session_type: &str, uid: &str, serial: &str, id: &str) -> Session {
    let mut payloads = Payloads::new();
    payloads.set(PAYLOAD_SERIAL_NUMBER, serial);
    Session::new()
        .with_type(session_type)
        .with_uid(uid)
        .with_id(id)
        .with_payloads(payloads)
}
