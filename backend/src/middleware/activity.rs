use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{models::Session, state::AppState};

/// Records the caller's session as active, then runs the handler.
///
/// Tracking is best effort: a failing store is logged and the request proceeds.
pub async fn track_activity(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(session) = request.extensions().get::<Session>() {
        if let Err(err) = state.activity.on_session_active(session).await {
            tracing::warn!(
                session_type = %session.session_type,
                uid = %session.uid,
                error = %err,
                "Failed to record session activity"
            );
        }
    }
    next.run(request).await
}
