//! Data models shared by the activity services and API handlers.

pub mod active_session;
pub mod session;

pub use active_session::{ActiveSession, ActivityConfig};
pub use session::{Payloads, Session, SessionType};
