use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::session;
use crate::middleware::route_guard::route_guard;
use crate::proxy::proxy_handler;
use crate::state::SharedState;

pub fn app(state: SharedState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/login", get(login_required))
        .route("/forbidden", get(forbidden))
        // Edge session management
        .merge(session_routes())
        // Authenticated proxy surface
        .merge(proxy_routes())
        // Role gating runs before any route above
        .layer(axum::middleware::from_fn_with_state(state.clone(), route_guard))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_routes() -> Router<SharedState> {
    Router::new()
        .route("/auth/login", post(session::login))
        .route("/auth/logout", post(session::logout))
}

fn proxy_routes() -> Router<SharedState> {
    Router::new().route(
        "/proxy/*path",
        get(proxy_handler)
            .post(proxy_handler)
            .put(proxy_handler)
            .patch(proxy_handler)
            .delete(proxy_handler),
    )
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "AIMesh Gateway",
            "version": version,
            "description": "Authenticated streaming proxy for the AIMesh platform",
            "endpoints": {
                "home": "/ (public)",
                "session": "/auth/login, /auth/logout (public - cookie issuance)",
                "proxy": "/proxy/{path} (forwards to the backend origin)",
                "login": "/login (redirect target for unauthenticated requests)",
                "forbidden": "/forbidden (redirect target for missing roles)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now()
        }
    }))
}

async fn login_required() -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "error": "Authentication required",
            "data": { "login": "/auth/login" }
        })),
    )
}

async fn forbidden() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "success": false,
            "error": "Insufficient role for this area"
        })),
    )
}
