use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use axum::{
    Router,
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::sync::Arc;

/// Reachable without credentials so probes keep working.
const PUBLIC_PATHS: &[&str] = &["/terrarium/readyz", "/terrarium/httpVersion"];

pub fn add_basic_auth(router: Router, auth: AuthConfig) -> Router {
    if !auth.enabled {
        return router;
    }
    router.layer(middleware::from_fn_with_state(Arc::new(auth), basic_auth))
}

async fn basic_auth(
    State(auth): State<Arc<AuthConfig>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .is_some_and(|credentials| {
            let (username, password) = credentials.split_once(':').unwrap_or((credentials.as_str(), ""));
            // Both comparisons always run.
            let user_ok = constant_time_eq(username.as_bytes(), auth.username.as_bytes());
            let pass_ok = constant_time_eq(password.as_bytes(), auth.password.as_bytes());
            user_ok & pass_ok
        });

    if !authorized {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
