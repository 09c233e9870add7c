use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenVerifier;
use crate::config::AppConfig;
use crate::proxy::refresh::RefreshCoordinator;

/// Process-wide gateway state shared by every request handler.
///
/// Each request owns its response object, so nothing here is written per
/// request; the refresh coordinator is the only synchronization primitive.
pub struct GatewayState {
    pub backend_origin: String,
    pub http: reqwest::Client,
    pub verifier: TokenVerifier,
    pub refresher: RefreshCoordinator,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        // Connect timeout only: streamed responses have no overall deadline
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.backend.connect_timeout_secs))
            .build()?;

        Ok(Self {
            backend_origin: config.backend.origin.trim_end_matches('/').to_string(),
            http,
            verifier: TokenVerifier::new(&config.auth),
            refresher: RefreshCoordinator::new(),
        })
    }
}
