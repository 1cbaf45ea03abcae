//! Session values handed over by the authentication layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Payload key holding the login lineage serial number.
pub const PAYLOAD_SERIAL_NUMBER: &str = "activesessions.serialnumber";
/// Payload key holding the unix timestamp of the login.
pub const PAYLOAD_LOGIN_TIME: &str = "logintime";
/// Payload key holding the client IP seen at login.
pub const PAYLOAD_REMOTE_IP: &str = "httpip";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Tag of an independently configured authentication context, e.g. `web` or `api`.
pub struct SessionType(String);

impl SessionType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SessionType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
/// Key/value bag persisted with a session at login.
pub struct Payloads(HashMap<String, String>);

impl Payloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, or an empty string when absent.
    pub fn load_string(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn serial_number(&self) -> &str {
        self.load_string(PAYLOAD_SERIAL_NUMBER)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// An authenticated session as seen by activity tracking.
pub struct Session {
    /// Current session token. Rotates on refresh.
    pub id: String,
    /// Stable identifier of the owning user.
    pub uid: String,
    pub session_type: SessionType,
    pub payloads: Payloads,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn with_type(mut self, session_type: impl Into<SessionType>) -> Self {
        self.session_type = session_type.into();
        self
    }

    pub fn with_payloads(mut self, payloads: Payloads) -> Self {
        self.payloads = payloads;
        self
    }

    pub fn serial_number(&self) -> &str {
        self.payloads.serial_number()
    }

    /// Activity can only be tracked when id, uid and serial number are all known.
    pub fn is_trackable(&self) -> bool {
        !self.id.is_empty() && !self.uid.is_empty() && !self.serial_number().is_empty()
    }
}
