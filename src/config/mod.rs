use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the upstream API service, e.g. `https://api.aimesh.dev`.
    pub origin: String,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// PEM-encoded public key used to verify access-token signatures.
    pub jwt_public_key: String,
    /// Expected `iss` claim on access tokens.
    pub jwt_issuer: String,
    /// Clock tolerance applied to expiry checks, in seconds.
    pub clock_leeway_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SERVER_ENABLE_CORS") {
            self.server.enable_cors = v.parse().unwrap_or(self.server.enable_cors);
        }
        if let Ok(v) = env::var("SERVER_CORS_ORIGINS") {
            self.server.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SERVER_ENABLE_REQUEST_LOGGING") {
            self.server.enable_request_logging =
                v.parse().unwrap_or(self.server.enable_request_logging);
        }

        // Backend overrides
        if let Ok(v) = env::var("BACKEND_ORIGIN") {
            self.backend.origin = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("BACKEND_CONNECT_TIMEOUT_SECS") {
            self.backend.connect_timeout_secs =
                v.parse().unwrap_or(self.backend.connect_timeout_secs);
        }

        // Auth overrides
        if let Ok(v) = env::var("JWT_PUBLIC_KEY") {
            self.auth.jwt_public_key = v;
        }
        if let Ok(v) = env::var("JWT_ISSUER") {
            self.auth.jwt_issuer = v;
        }
        if let Ok(v) = env::var("AUTH_CLOCK_LEEWAY_SECS") {
            self.auth.clock_leeway_secs = v.parse().unwrap_or(self.auth.clock_leeway_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                enable_request_logging: true,
            },
            backend: BackendConfig {
                origin: "http://localhost:8080".to_string(),
                connect_timeout_secs: 30,
            },
            auth: AuthConfig {
                jwt_public_key: String::new(),
                jwt_issuer: "aimesh.secure".to_string(),
                clock_leeway_secs: 30,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
                cors_origins: vec!["https://staging.aimesh.dev".to_string()],
                enable_request_logging: true,
            },
            backend: BackendConfig {
                origin: "https://api.staging.aimesh.dev".to_string(),
                connect_timeout_secs: 10,
            },
            auth: AuthConfig {
                jwt_public_key: String::new(),
                jwt_issuer: "aimesh.secure".to_string(),
                clock_leeway_secs: 30,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
                cors_origins: vec!["https://app.aimesh.dev".to_string()],
                enable_request_logging: false,
            },
            backend: BackendConfig {
                origin: "https://api.aimesh.dev".to_string(),
                connect_timeout_secs: 5,
            },
            auth: AuthConfig {
                jwt_public_key: String::new(),
                jwt_issuer: "aimesh.secure".to_string(),
                clock_leeway_secs: 30,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
