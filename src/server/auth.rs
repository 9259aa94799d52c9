//! Basic-auth middleware for the `/api/admin` routes.

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use crate::config::AdminConfig;
use crate::server::routes::AppState;

/// Reject admin requests without valid Basic credentials.
///
/// When no admin credentials are configured the middleware is a pass-through.
/// OPTIONS requests pass so CORS preflights work.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(config) = &state.admin else {
        return next.run(request).await;
    };

    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| check_basic(value, config))
        .unwrap_or(false);

    if authorized {
        next.run(request).await
    } else {
        debug!(path = %request.uri().path(), "Rejected unauthenticated admin request");
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"admin\"")],
            "Unauthorized",
        )
            .into_response()
    }
}

/// Validate a `Basic <base64(user:pass)>` header value against the config.
fn check_basic(header_value: &str, config: &AdminConfig) -> bool {
    let Some(encoded) = header_value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(bytes) = BASE64.decode(encoded.trim()) else {
        return false;
    };
    let Ok(credentials) = String::from_utf8(bytes) else {
        return false;
    };
    match credentials.split_once(':') {
        Some((username, password)) => {
            username == config.username && password == config.password
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdminConfig {
        AdminConfig {
            username: "admin".into(),
            password: "s3cret".into(),
        }
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn accepts_matching_credentials() {
        assert!(check_basic(&basic("admin", "s3cret"), &config()));
    }

    #[test]
    fn rejects_wrong_credentials() {
        assert!(!check_basic(&basic("admin", "wrong"), &config()));
        assert!(!check_basic(&basic("root", "s3cret"), &config()));
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(!check_basic("Bearer token", &config()));
        assert!(!check_basic("Basic !!!not-base64!!!", &config()));
        // Valid base64, but no colon inside
        let no_colon = format!("Basic {}", BASE64.encode("admins3cret"));
        assert!(!check_basic(&no_colon, &config()));
    }

    #[test]
    fn password_may_contain_colons() {
        assert!(check_basic(
            &basic("admin", "s3:cret"),
            &AdminConfig {
                username: "admin".into(),
                password: "s3:cret".into(),
            }
        ));
    }
}
