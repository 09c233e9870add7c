//! Authenticated streaming proxy: forwards `/proxy/*` calls to the backend
//! origin, injecting the scope's bearer token and refreshing it once on 401.

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

use crate::auth::cookies::{self, CookieScope};
use crate::error::ApiError;
use crate::state::{GatewayState, SharedState};

pub mod refresh;

pub async fn proxy_handler(
    State(state): State<SharedState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let scope = CookieScope::for_proxied_path(&path);
    let access = cookies::access_token(&jar, scope);

    let upstream = forward(
        &state,
        &method,
        &path,
        query.as_deref(),
        &headers,
        body.clone(),
        access.as_deref(),
    )
    .await?;

    if upstream.status() != StatusCode::UNAUTHORIZED {
        return relay(upstream).await;
    }

    // One refresh attempt per request. Without a refresh cookie the 401
    // passes through unmodified.
    let Some(refresh_cookie) = cookies::refresh_token(&jar, scope) else {
        return relay(upstream).await;
    };

    let pair = match state
        .refresher
        .refresh(&state.http, &state.backend_origin, scope, &refresh_cookie)
        .await
    {
        Ok(pair) => pair,
        Err(e) => {
            tracing::debug!("token refresh for {} scope failed: {}", scope, e);
            return relay(upstream).await;
        }
    };

    tracing::debug!("refreshed {} scope credentials, retrying upstream call", scope);

    // A second 401 here is relayed as-is; never refresh twice
    let retried = forward(
        &state,
        &method,
        &path,
        query.as_deref(),
        &headers,
        body,
        Some(&pair.access_token),
    )
    .await?;

    let jar = cookies::set_token_pair(jar, scope, &pair);
    Ok((jar, relay(retried).await?).into_response())
}

async fn forward(
    state: &GatewayState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
    access_token: Option<&str>,
) -> Result<reqwest::Response, ApiError> {
    let mut url = format!(
        "{}/{}",
        state.backend_origin,
        path.trim_start_matches('/')
    );
    if let Some(q) = query {
        url.push('?');
        url.push_str(q);
    }

    let outbound = outbound_headers(headers, access_token)?;

    let mut request = state.http.request(method.clone(), &url).headers(outbound);
    if !matches!(*method, Method::GET | Method::HEAD) {
        request = request.body(body);
    }

    Ok(request.send().await?)
}

/// Caller headers minus `host`/`cookie` (the upstream gets its own host and
/// must never see browser cookies), plus a bearer header when the scope has
/// an access token. `content-length` is dropped so the client recomputes it.
fn outbound_headers(
    headers: &HeaderMap,
    access_token: Option<&str>,
) -> Result<HeaderMap, ApiError> {
    let mut outbound = headers.clone();
    outbound.remove(header::HOST);
    outbound.remove(header::COOKIE);
    outbound.remove(header::CONTENT_LENGTH);

    if let Some(token) = access_token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::bad_request("Malformed access token"))?;
        outbound.insert(header::AUTHORIZATION, value);
    }

    Ok(outbound)
}

/// Relay the upstream response: event streams pass through chunk-for-chunk,
/// everything else is buffered and returned verbatim. Status and
/// content-type are preserved either way.
async fn relay(upstream: reqwest::Response) -> Result<Response, ApiError> {
    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();

    let is_event_stream = content_type
        .as_ref()
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/event-stream"))
        .unwrap_or(false);

    let mut builder = Response::builder().status(status);
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }

    let response = if is_event_stream {
        builder
            .header(header::CACHE_CONTROL, "no-cache, no-transform")
            .header(header::CONNECTION, "keep-alive")
            .body(Body::from_stream(upstream.bytes_stream()))
    } else {
        let bytes = upstream.bytes().await?;
        builder.body(Body::from(bytes))
    };

    response.map_err(|e| {
        tracing::error!("failed to assemble relay response: {}", e);
        ApiError::internal_server_error("Failed to relay upstream response")
    })
}
