#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use aimesh_gateway::auth::TokenVerifier;
use aimesh_gateway::proxy::refresh::RefreshCoordinator;
use aimesh_gateway::routes;
use aimesh_gateway::state::GatewayState;

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/jwt_test_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/jwt_test_key.pub.pem");
pub const TEST_ISSUER: &str = "aimesh.secure";

/// Byte-exact SSE payload served by the mock backend's /chat/stream.
pub const SSE_FIXTURE: &str =
    "event: delta\ndata: {\"text\":\"hi\"}\n\nevent: delta\ndata: {\"text\":\"!\"}\n\n";

/// Mint a signed access token for the given roles, expiring in the future
/// (or the past, for negative `expires_in_secs`).
pub fn mint_token_with_exp(roles: &[&str], expires_in_secs: i64) -> String {
    let now = Utc::now();
    let claims = json!({
        "sub": "user-42",
        "iss": TEST_ISSUER,
        "roles": roles,
        "exp": (now + ChronoDuration::seconds(expires_in_secs)).timestamp(),
        "iat": now.timestamp(),
    });
    let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY.as_bytes()).expect("test key");
    encode(&Header::new(Algorithm::RS256), &claims, &key).expect("sign test token")
}

pub fn mint_token(roles: &[&str]) -> String {
    mint_token_with_exp(roles, 3600)
}

#[derive(Clone)]
pub struct BackendCounters {
    pub refresh_calls: Arc<AtomicUsize>,
    pub me_calls: Arc<AtomicUsize>,
    pub stubborn_calls: Arc<AtomicUsize>,
    pub logout_calls: Arc<AtomicUsize>,
    /// The one refresh token the backend currently honors; rotation
    /// invalidates whatever it replaces.
    pub current_refresh: Arc<Mutex<String>>,
}

impl Default for BackendCounters {
    fn default() -> Self {
        Self {
            refresh_calls: Arc::default(),
            me_calls: Arc::default(),
            stubborn_calls: Arc::default(),
            logout_calls: Arc::default(),
            current_refresh: Arc::new(Mutex::new("valid-refresh".to_string())),
        }
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub counters: BackendCounters,
}

impl MockBackend {
    pub fn refresh_calls(&self) -> usize {
        self.counters.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn me_calls(&self) -> usize {
        self.counters.me_calls.load(Ordering::SeqCst)
    }

    pub fn stubborn_calls(&self) -> usize {
        self.counters.stubborn_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.counters.logout_calls.load(Ordering::SeqCst)
    }
}

pub struct TestStack {
    pub gateway_url: String,
    pub backend: MockBackend,
}

/// Spawn a mock backend plus a gateway wired to it, both in-process on
/// ephemeral ports, and wait until the gateway answers /health.
pub async fn spawn_stack() -> Result<TestStack> {
    let backend = spawn_backend().await?;
    let gateway_url = spawn_gateway(&backend.base_url).await?;
    wait_ready(&gateway_url, Duration::from_secs(5)).await?;
    Ok(TestStack { gateway_url, backend })
}

pub async fn spawn_backend() -> Result<MockBackend> {
    let counters = BackendCounters::default();

    let app = Router::new()
        .route("/auth/login", post(backend_login))
        .route("/auth/refresh", post(backend_refresh))
        .route("/auth/logout", post(backend_logout))
        .route("/users/me", get(backend_me))
        .route("/always401", get(backend_always_unauthorized))
        .route("/inspect", get(backend_inspect))
        .route("/admin/inspect", get(backend_inspect))
        .route("/chat/stream", get(backend_chat_stream))
        .route("/echo", post(backend_echo))
        .with_state(counters.clone());

    let base_url = serve(app).await?;
    Ok(MockBackend { base_url, counters })
}

pub async fn spawn_gateway(backend_url: &str) -> Result<String> {
    let state = Arc::new(GatewayState {
        backend_origin: backend_url.trim_end_matches('/').to_string(),
        http: reqwest::Client::new(),
        verifier: TokenVerifier::from_parts(
            TEST_PUBLIC_KEY.to_string(),
            TEST_ISSUER.to_string(),
            30,
        ),
        refresher: RefreshCoordinator::new(),
    });

    serve(routes::app(state)).await
}

async fn serve(app: Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    Ok(format!("http://{}", addr))
}

async fn wait_ready(base_url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::new();
    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() > deadline {
            anyhow::bail!("server did not become ready on {} within {:?}", base_url, timeout);
        }
        if let Ok(resp) = client.get(format!("{}/health", base_url)).send().await {
            if resp.status() == StatusCode::OK {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Redirects must stay visible to assertions.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("reqwest client")
}

// --- mock backend handlers ---

async fn backend_login(Json(body): Json<Value>) -> Response {
    if body.get("password").and_then(Value::as_str) == Some("correct") {
        (
            StatusCode::OK,
            Json(json!({
                "accessToken": "valid-access",
                "refreshToken": "valid-refresh"
            })),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "bad credentials" })),
        )
            .into_response()
    }
}

async fn backend_refresh(State(counters): State<BackendCounters>, Json(body): Json<Value>) -> Response {
    let calls = counters.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let presented = body
        .get("refreshToken")
        .and_then(Value::as_str)
        .unwrap_or_default();

    // Rotation disabled: the old refresh token stays valid
    if presented == "norotate-refresh" {
        return (
            StatusCode::OK,
            Json(json!({ "accessToken": "rotated-access" })),
        )
            .into_response();
    }

    // Strict rotation: each exchange consumes the token it was given, so a
    // replayed exchange with a stale token must fail
    let mut current = counters.current_refresh.lock().unwrap();
    if presented == *current {
        let next = format!("rotated-refresh-{}", calls);
        *current = next.clone();
        (
            StatusCode::OK,
            Json(json!({
                "accessToken": "rotated-access",
                "refreshToken": next
            })),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid refresh token" })),
        )
            .into_response()
    }
}

async fn backend_logout(State(counters): State<BackendCounters>) -> StatusCode {
    counters.logout_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn backend_me(State(counters): State<BackendCounters>, headers: HeaderMap) -> Response {
    counters.me_calls.fetch_add(1, Ordering::SeqCst);

    match bearer(&headers) {
        Some("valid-access") | Some("rotated-access") => (
            StatusCode::OK,
            Json(json!({ "id": "user-42", "email": "dev@aimesh.dev" })),
        )
            .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "token expired" })),
        )
            .into_response(),
    }
}

async fn backend_always_unauthorized(State(counters): State<BackendCounters>) -> Response {
    counters.stubborn_calls.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "still expired" })),
    )
        .into_response()
}

async fn backend_inspect(headers: HeaderMap, RawQuery(query): RawQuery) -> Json<Value> {
    Json(json!({
        "authorization": headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
        "has_cookie": headers.contains_key(header::COOKIE),
        "host": headers.get(header::HOST).and_then(|v| v.to_str().ok()),
        "query": query,
    }))
}

async fn backend_chat_stream() -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from(SSE_FIXTURE))
        .expect("stream response")
}

async fn backend_echo(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .expect("echo response")
}
