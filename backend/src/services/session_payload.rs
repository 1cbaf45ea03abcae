//! Builders that fill a new session's payloads at login.

use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;

use crate::models::session::{PAYLOAD_LOGIN_TIME, PAYLOAD_REMOTE_IP, PAYLOAD_SERIAL_NUMBER};
use crate::models::{Payloads, SessionType};
use crate::services::activity::ActivityServiceTrait;

/// What is known about a login when its payloads are built.
#[derive(Debug, Clone)]
pub struct PayloadContext {
    pub session_type: SessionType,
    pub uid: String,
    pub remote_ip: Option<IpAddr>,
}

impl PayloadContext {
    pub fn new(session_type: SessionType, uid: impl Into<String>) -> Self {
        Self {
            session_type,
            uid: uid.into(),
            remote_ip: None,
        }
    }

    pub fn with_remote_ip(mut self, remote_ip: IpAddr) -> Self {
        self.remote_ip = Some(remote_ip);
        self
    }
}

pub trait PayloadBuilder: Send + Sync {
    fn build(&self, ctx: &PayloadContext, payloads: &mut Payloads);
}

/// Mints the login lineage serial number.
pub struct SerialNumberPayload {
    activity: Arc<dyn ActivityServiceTrait>,
}

impl SerialNumberPayload {
    pub fn new(activity: Arc<dyn ActivityServiceTrait>) -> Self {
        Self { activity }
    }
}

impl PayloadBuilder for SerialNumberPayload {
    fn build(&self, _ctx: &PayloadContext, payloads: &mut Payloads) {
        payloads.set(PAYLOAD_SERIAL_NUMBER, self.activity.create_serial_number());
    }
}

pub struct LoginTimePayload;

impl PayloadBuilder for LoginTimePayload {
    fn build(&self, _ctx: &PayloadContext, payloads: &mut Payloads) {
        payloads.set(PAYLOAD_LOGIN_TIME, Utc::now().timestamp().to_string());
    }
}

pub struct RemoteIpPayload;

impl PayloadBuilder for RemoteIpPayload {
    fn build(&self, ctx: &PayloadContext, payloads: &mut Payloads) {
        if let Some(ip) = ctx.remote_ip {
            payloads.set(PAYLOAD_REMOTE_IP, ip.to_string());
        }
    }
}

/// Ordered set of payload builders run once per login.
#[derive(Clone, Default)]
pub struct SessionPayloadBuilders {
    builders: Vec<Arc<dyn PayloadBuilder>>,
}

impl SessionPayloadBuilders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serial number, login time and remote IP, in that order.
    pub fn standard(activity: Arc<dyn ActivityServiceTrait>) -> Self {
        Self::new()
            .with_builder(SerialNumberPayload::new(activity))
            .with_builder(LoginTimePayload)
            .with_builder(RemoteIpPayload)
    }

    pub fn with_builder(mut self, builder: impl PayloadBuilder + 'static) -> Self {
        self.append(builder);
        self
    }

    pub fn append(&mut self, builder: impl PayloadBuilder + 'static) {
        self.builders.push(Arc::new(builder));
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Later builders see, and may overwrite, what earlier ones stored.
    pub fn init_payloads(&self, ctx: &PayloadContext) -> Payloads {
        let mut payloads = Payloads::new();
        for builder in &self.builders {
            builder.build(ctx, &mut payloads);
        }
        tracing::debug!(
            session_type = %ctx.session_type,
            uid = %ctx.uid,
            fields = payloads.len(),
            "Initialized session payloads"
        );
        payloads
    }
}
