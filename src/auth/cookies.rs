use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::TokenPair;

/// Product area a credential pair belongs to. Chat and platform sessions use
/// distinct cookie names so one can expire or rotate without touching the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookieScope {
    Chat,
    Platform,
}

impl CookieScope {
    /// Derive the scope from a proxied path suffix: anything under `chat/`
    /// belongs to the chat area, the rest to the platform area.
    pub fn for_proxied_path(path: &str) -> Self {
        match path.trim_start_matches('/').split('/').next() {
            Some("chat") => CookieScope::Chat,
            _ => CookieScope::Platform,
        }
    }

    /// Parse an explicit `scope=` query parameter.
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "chat" => Some(CookieScope::Chat),
            "platform" => Some(CookieScope::Platform),
            _ => None,
        }
    }

    pub fn access_cookie(&self) -> &'static str {
        match self {
            CookieScope::Chat => "chat_access_token",
            CookieScope::Platform => "platform_access_token",
        }
    }

    pub fn refresh_cookie(&self) -> &'static str {
        match self {
            CookieScope::Chat => "chat_refresh_token",
            CookieScope::Platform => "platform_refresh_token",
        }
    }
}

impl std::fmt::Display for CookieScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CookieScope::Chat => write!(f, "chat"),
            CookieScope::Platform => write!(f, "platform"),
        }
    }
}

// Tokens must never be readable from client-side script
fn token_cookie(name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie
}

pub fn access_token(jar: &CookieJar, scope: CookieScope) -> Option<String> {
    jar.get(scope.access_cookie()).map(|c| c.value().to_string())
}

pub fn refresh_token(jar: &CookieJar, scope: CookieScope) -> Option<String> {
    jar.get(scope.refresh_cookie()).map(|c| c.value().to_string())
}

/// Write a token pair into the jar. The refresh cookie is only overwritten
/// when the backend issued a rotated refresh token.
pub fn set_token_pair(jar: CookieJar, scope: CookieScope, pair: &TokenPair) -> CookieJar {
    let jar = jar.add(token_cookie(scope.access_cookie(), pair.access_token.clone()));
    match &pair.refresh_token {
        Some(refresh) => jar.add(token_cookie(scope.refresh_cookie(), refresh.clone())),
        None => jar,
    }
}

/// Expire both cookies for a scope (logout).
pub fn clear_token_pair(jar: CookieJar, scope: CookieScope) -> CookieJar {
    jar.remove(Cookie::build(scope.access_cookie()).path("/"))
        .remove(Cookie::build(scope.refresh_cookie()).path("/"))
}
