use super::handlers::{resource_group, system, vpn};
use super::middleware::auth::add_basic_auth;
use super::middleware::cors::add_cors;
use crate::config::AuthConfig;
use crate::services::Orchestrator;
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub ready: Arc<AtomicBool>,
}

pub fn create_router(state: AppState, auth: AuthConfig, allow_origins: &[String]) -> Router {
    let api_routes = Router::new()
        // System
        .route("/readyz", get(system::readyz))
        .route("/httpVersion", get(system::http_version))
        .route("/tofuVersion", get(system::tofu_version))
        // Resource groups
        .route("/rg/{resource_group_id}", delete(resource_group::clear_resource_group))
        .route("/rg/{resource_group_id}/status", get(resource_group::resource_group_status))
        // VPN tunnels
        .route(
            "/rg/{resource_group_id}/vpn/{scope}",
            post(vpn::apply).delete(vpn::destroy),
        )
        .route("/rg/{resource_group_id}/vpn/{scope}/init", post(vpn::init))
        .route(
            "/rg/{resource_group_id}/vpn/{scope}/blueprint",
            post(vpn::create_blueprint),
        )
        .route("/rg/{resource_group_id}/vpn/{scope}/plan", post(vpn::plan))
        .route("/rg/{resource_group_id}/vpn/{scope}/state", get(vpn::get_state))
        .route("/rg/{resource_group_id}/vpn/{scope}/status", get(vpn::status))
        .route(
            "/rg/{resource_group_id}/vpn/{scope}/workspace",
            delete(vpn::clear_scope),
        )
        .with_state(state);

    let router = Router::new().nest("/terrarium", api_routes);
    let router = add_basic_auth(router, auth);
    add_cors(router, allow_origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::fake::FakeDriver;
    use crate::tracker::StatusTracker;
    use crate::workspace::WorkspaceManager;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use base64::{Engine, engine::general_purpose::STANDARD};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app_with(driver: FakeDriver, auth: AuthConfig) -> (TempDir, AppState, Router) {
        let dir = TempDir::new().unwrap();
        let tracker = StatusTracker::in_memory();
        let workspaces = WorkspaceManager::new(dir.path().join("workspaces"), tracker.clone());
        let orchestrator = Orchestrator::new(
            tracker,
            workspaces,
            Arc::new(driver),
            dir.path().join("templates"),
        );
        let state = AppState {
            orchestrator,
            ready: Arc::new(AtomicBool::new(true)),
        };
        let router = create_router(state.clone(), auth, &["*".to_string()]);
        (dir, state, router)
    }

    fn app() -> (TempDir, AppState, Router) {
        app_with(FakeDriver::default(), AuthConfig::default())
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn blueprint_body() -> Value {
        json!({
            "resourceGroupId": "rg-01",
            "tfVars": {
                "my-imported-gcp-vpc-name": "tofu-gcp-vpc",
                "my-imported-gcp-subnet-name": "tofu-gcp-subnet-1",
                "my-imported-aws-vpc-id": "vpc-0123456789abcdef0",
                "my-imported-aws-subnet-id": "subnet-0123456789abcdef0"
            }
        })
    }

    #[tokio::test]
    async fn readyz_follows_ready_flag() {
        let (_dir, state, router) = app();
        let (status, body) = send(&router, "GET", "/terrarium/readyz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        state.ready.store(false, Ordering::Release);
        let (status, body) = send(&router, "GET", "/terrarium/readyz", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn lifecycle_over_http() {
        let (_dir, _state, router) = app();

        let (status, body) = send(&router, "POST", "/terrarium/rg/rg-01/vpn/gcp-aws/init", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["action"], "init");

        let (status, _) = send(
            &router,
            "POST",
            "/terrarium/rg/rg-01/vpn/gcp-aws/blueprint",
            Some(blueprint_body()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&router, "POST", "/terrarium/rg/rg-01/vpn/gcp-aws/plan", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Plan: 8 to add, 0 to change, 0 to destroy.");

        let (status, _) = send(&router, "POST", "/terrarium/rg/rg-01/vpn/gcp-aws", None).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&router, "GET", "/terrarium/rg/rg-01/vpn/gcp-aws/state", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["output"].as_str().unwrap().contains("vpn_gw"));

        let (status, body) = send(&router, "GET", "/terrarium/rg/rg-01/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);

        let (status, _) = send(&router, "DELETE", "/terrarium/rg/rg-01/vpn/gcp-aws", None).await;
        assert_eq!(status, StatusCode::OK);

        for _ in 0..2 {
            let (status, body) = send(&router, "DELETE", "/terrarium/rg/rg-01", None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
        }
    }

    #[tokio::test]
    async fn caller_errors_are_bad_requests() {
        let (_dir, _state, router) = app();

        let (status, body) = send(&router, "POST", "/terrarium/rg/rg-01/vpn/gcp-aws/plan", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &router,
            "POST",
            "/terrarium/rg/rg-01/vpn/gcp-aws/blueprint",
            Some(json!({"tfVars": "not an object"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut mismatched = blueprint_body();
        mismatched["resourceGroupId"] = json!("rg-02");
        let (status, _) = send(
            &router,
            "POST",
            "/terrarium/rg/rg-01/vpn/gcp-aws/blueprint",
            Some(mismatched),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, "DELETE", "/terrarium/rg/..%2Fetc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn conflicting_run_is_service_unavailable() {
        let (_dir, _state, router) =
            app_with(FakeDriver::with_delay(Duration::from_millis(200)), AuthConfig::default());

        let background = router.clone();
        let first = tokio::spawn(async move {
            send(&background, "POST", "/terrarium/rg/rg-01/vpn/gcp-aws/init", None).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (status, body) = send(&router, "POST", "/terrarium/rg/rg-01/vpn/gcp-aws/init", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["text"].as_str().unwrap().contains("in progress"));

        let (status, _) = first.await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn basic_auth_guards_everything_but_probes() {
        let auth = AuthConfig {
            enabled: true,
            username: "default".to_string(),
            password: "secret".to_string(),
        };
        let (_dir, _state, router) = app_with(FakeDriver::default(), auth);

        let (status, _) = send(&router, "GET", "/terrarium/readyz", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&router, "GET", "/terrarium/tofuVersion", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/terrarium/tofuVersion")
            .header(
                header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode("default:secret")),
            )
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
