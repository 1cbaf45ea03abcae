pub mod activity;
pub mod memory_activity;
pub mod redis_activity;
pub mod rolling_window;
pub mod session_payload;

pub use activity::{create_activity_service, purge_session, ActivityServiceTrait};
