use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::auth::cookies::CookieScope;
use crate::auth::TokenPair;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("refresh rejected with status {0}")]
    Rejected(StatusCode),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchange a refresh token for a new token pair via one backend call.
/// Any non-2xx answer is a failure; the caller falls back to the original
/// 401 and must not retry the exchange.
pub async fn exchange_refresh_token(
    client: &reqwest::Client,
    backend_origin: &str,
    refresh_token: &str,
) -> Result<TokenPair, RefreshError> {
    let url = format!("{}/auth/refresh", backend_origin);
    let response = client
        .post(&url)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(RefreshError::Rejected(response.status()));
    }

    Ok(response.json::<TokenPair>().await?)
}

#[derive(Debug, Clone)]
struct CompletedRefresh {
    /// The refresh token the exchange consumed.
    presented: String,
    pair: TokenPair,
}

/// Collapses concurrent same-scope refreshes into one backend exchange.
///
/// The backend invalidates a refresh token when it rotates it, so two
/// requests hitting a 401 with the same refresh cookie must not both replay
/// the exchange: the second one would present an already-consumed token and
/// strand the browser logged out. Each scope's exchanges run under a mutex,
/// and the most recent successful exchange is remembered; a caller
/// presenting the token that exchange consumed receives the same pair
/// instead of going back to the backend. The two scopes stay independent.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    chat: Mutex<Option<CompletedRefresh>>,
    platform: Mutex<Option<CompletedRefresh>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, scope: CookieScope) -> &Mutex<Option<CompletedRefresh>> {
        match scope {
            CookieScope::Chat => &self.chat,
            CookieScope::Platform => &self.platform,
        }
    }

    pub async fn refresh(
        &self,
        client: &reqwest::Client,
        backend_origin: &str,
        scope: CookieScope,
        refresh_token: &str,
    ) -> Result<TokenPair, RefreshError> {
        let mut slot = self.slot(scope).lock().await;

        if let Some(last) = slot.as_ref() {
            if last.presented == refresh_token {
                tracing::debug!("reusing in-flight refresh result for {} scope", scope);
                return Ok(last.pair.clone());
            }
        }

        let pair = exchange_refresh_token(client, backend_origin, refresh_token).await?;
        *slot = Some(CompletedRefresh {
            presented: refresh_token.to_string(),
            pair: pair.clone(),
        });
        Ok(pair)
    }
}
