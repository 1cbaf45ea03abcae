use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, middleware, state::AppState};

pub fn build_router(state: AppState) -> Router {
    // Routes called by the login flow and probes (no gateway session)
    let internal_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/internal/payloads", post(handlers::init_payloads));

    // Routes acting on behalf of the gateway-resolved session
    let session_routes = Router::new()
        .route("/api/sessions/config", get(handlers::get_activity_config))
        .route("/api/sessions/active", get(handlers::list_active_sessions))
        .route(
            "/api/sessions/active/{serial}",
            delete(handlers::revoke_active_session),
        )
        .route("/api/sessions/logout", post(handlers::logout))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::track_activity,
        ))
        .route_layer(axum_middleware::from_fn(
            middleware::resolve_gateway_session,
        ));

    Router::new()
        .merge(internal_routes)
        .merge(session_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::DELETE,
                            Method::OPTIONS,
                        ])
                        .allow_headers(Any)
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state)
}
