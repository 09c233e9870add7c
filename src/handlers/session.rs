// Edge session endpoints: the browser never sees the token pair, only the
// HttpOnly cookies written here.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::cookies::{self, CookieScope};
use crate::auth::TokenPair;
use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct ScopeParams {
    scope: Option<String>,
}

impl ScopeParams {
    fn resolve(&self) -> Result<CookieScope, ApiError> {
        match &self.scope {
            None => Ok(CookieScope::Platform),
            Some(value) => CookieScope::from_param(value)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown scope '{}'", value))),
        }
    }
}

/// POST /auth/login?scope=chat|platform
///
/// Forwards credentials to the backend; on success the returned token pair
/// lands in the scope's cookies and the tokens themselves are stripped from
/// the response body. Backend rejections relay verbatim with no cookie
/// mutation.
pub async fn login(
    State(state): State<SharedState>,
    Query(params): Query<ScopeParams>,
    jar: CookieJar,
    Json(credentials): Json<Value>,
) -> Result<Response, ApiError> {
    let scope = params.resolve()?;

    let url = format!("{}/auth/login", state.backend_origin);
    let upstream = state.http.post(&url).json(&credentials).send().await?;

    let status = upstream.status();
    if !status.is_success() {
        let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
        let body = upstream.bytes().await?;
        let mut response = (status, body).into_response();
        if let Some(ct) = content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, ct);
        }
        return Ok(response);
    }

    let pair: TokenPair = upstream.json().await?;
    let jar = cookies::set_token_pair(jar, scope, &pair);

    tracing::info!("issued {} session cookies", scope);
    Ok((
        jar,
        Json(json!({
            "success": true,
            "data": { "scope": scope.to_string() }
        })),
    )
        .into_response())
}

/// POST /auth/logout?scope=chat|platform
///
/// The edge session always ends: the backend logout call is best-effort and
/// its failure does not keep the cookies alive.
pub async fn logout(
    State(state): State<SharedState>,
    Query(params): Query<ScopeParams>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let scope = params.resolve()?;

    if let Some(access) = cookies::access_token(&jar, scope) {
        let url = format!("{}/auth/logout", state.backend_origin);
        if let Err(e) = state.http.post(&url).bearer_auth(access).send().await {
            tracing::warn!("backend logout for {} scope failed: {}", scope, e);
        }
    }

    let jar = cookies::clear_token_pair(jar, scope);
    Ok((jar, StatusCode::NO_CONTENT).into_response())
}
