pub mod activity;
pub mod session;

pub use activity::track_activity;
pub use session::resolve_gateway_session;
