use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use crate::error::AppError;
use crate::models::{session::PAYLOAD_SERIAL_NUMBER, Payloads, Session, SessionType};

pub const SESSION_ID_HEADER: &str = "x-session-id";
pub const SESSION_UID_HEADER: &str = "x-session-uid";
pub const SESSION_TYPE_HEADER: &str = "x-session-type";
pub const SESSION_SERIAL_HEADER: &str = "x-session-serial";

/// Turns the session resolved by the gateway into a request extension.
pub async fn resolve_gateway_session(
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = session_from_headers(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing gateway session".into()))?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_from_headers(headers: &HeaderMap) -> Option<Session> {
    let id = header_value(headers, SESSION_ID_HEADER)?;
    let uid = header_value(headers, SESSION_UID_HEADER)?;
    let session_type = header_value(headers, SESSION_TYPE_HEADER)
        .map(SessionType::from)
        .unwrap_or_default();

    let mut payloads = Payloads::new();
    if let Some(serial) = header_value(headers, SESSION_SERIAL_HEADER) {
        payloads.set(PAYLOAD_SERIAL_NUMBER, serial);
    }

    Some(
        Session::new()
            .with_id(id)
            .with_uid(uid)
            .with_type(session_type)
            .with_payloads(payloads),
    )
}
