use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;

use crate::auth::cookies::{self, CookieScope};
use crate::state::SharedState;

pub const LOGIN_ROUTE: &str = "/login";
pub const FORBIDDEN_ROUTE: &str = "/forbidden";

struct GuardedPrefix {
    prefix: &'static str,
    allowed_roles: &'static [&'static str],
}

// Ordered table, first matching prefix wins. Paths that match nothing are
// public as far as the guard is concerned.
const GUARDED_PREFIXES: &[GuardedPrefix] = &[
    GuardedPrefix {
        prefix: "/proxy/admin",
        allowed_roles: &["admin"],
    },
    GuardedPrefix {
        prefix: "/proxy/platform",
        allowed_roles: &["admin", "operator"],
    },
    GuardedPrefix {
        prefix: "/proxy/chat",
        allowed_roles: &["admin", "operator", "member"],
    },
];

fn allowed_roles_for(path: &str) -> Option<&'static [&'static str]> {
    GUARDED_PREFIXES
        .iter()
        .find(|guard| path.starts_with(guard.prefix))
        .map(|guard| guard.allowed_roles)
}

/// Role-gating middleware.
///
/// A request with no access token on a guarded prefix redirects to the login
/// route before any role evaluation; a verified token without an allowed role
/// redirects to the forbidden route. Verification failure of any kind counts
/// as "no token".
pub async fn route_guard(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let Some(allowed) = allowed_roles_for(&path) else {
        return next.run(request).await;
    };

    let jar = CookieJar::from_headers(request.headers());
    let scope = CookieScope::for_proxied_path(path.strip_prefix("/proxy").unwrap_or(&path));

    let claims = cookies::access_token(&jar, scope)
        .and_then(|token| state.verifier.verify(&token));

    let Some(claims) = claims else {
        return Redirect::temporary(LOGIN_ROUTE).into_response();
    };

    if !claims.has_any_role(allowed) {
        tracing::debug!(
            "subject {} lacks a role for {} (has {:?})",
            claims.sub,
            path,
            claims.roles
        );
        return Redirect::temporary(FORBIDDEN_ROUTE).into_response();
    }

    next.run(request).await
}
