use std::sync::Arc;

use crate::{
    config::Config, services::activity::ActivityServiceTrait,
    services::session_payload::SessionPayloadBuilders,
};

#[derive(Clone)]
pub struct AppState {
    pub activity: Arc<dyn ActivityServiceTrait>,
    pub payloads: SessionPayloadBuilders,
    pub config: Config,
}

impl AppState {
    pub fn new(activity: Arc<dyn ActivityServiceTrait>, config: Config) -> Self {
        let payloads = SessionPayloadBuilders::standard(activity.clone());
        Self {
            activity,
            payloads,
            config,
        }
    }
}
