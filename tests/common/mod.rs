//! Shared harness for HTTP-level tests.
//!
//! Every `TestApp` owns a fresh SQLite file in a temp directory and a router
//! built exactly as the server builds it. Upstream targets can be pointed at a
//! `wiremock` server.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response},
    Router,
};
use keyrelay::{
    api::{build_router, ApiState},
    config::{AppConfig, DatabaseConfig},
    domain::{PlanTier, TenantId},
    forwarding::TargetTable,
    storage::create_pool,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "test-admin-token";

pub struct TestApp {
    pub state: ApiState,
    router: Router,
    _dir: TempDir,
}

/// A tenant with a ready-to-use API key
pub struct TestTenant {
    pub id: TenantId,
    pub api_key: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(TargetTable::default(), |_| {}).await
    }

    /// Point `targets` at `upstream_url` (e.g. a wiremock server)
    pub async fn with_upstream(targets: &[&str], upstream_url: &str) -> Self {
        Self::with_upstream_config(targets, upstream_url, |_| {}).await
    }

    pub async fn with_upstream_config(
        targets: &[&str],
        upstream_url: &str,
        configure: impl FnOnce(&mut AppConfig),
    ) -> Self {
        let table = targets
            .iter()
            .fold(TargetTable::default(), |table, name| table.with_base_url(name, upstream_url));
        Self::build(table, configure).await
    }

    pub async fn build(targets: TargetTable, configure: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut config = AppConfig::default();
        config.database = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("keyrelay.db").display()),
            max_connections: 5,
            auto_migrate: true,
            ..Default::default()
        };
        config.auth.admin_token = Some(ADMIN_TOKEN.to_string());
        configure(&mut config);

        let pool = create_pool(&config.database).await.expect("create pool");
        let state = ApiState::new(pool, config, targets).expect("build state");
        let router = build_router(state.clone());

        Self { state, router, _dir: dir }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("router is infallible")
    }

    pub async fn tenant(&self, plan: PlanTier) -> TestTenant {
        let tenant = self.state.tenants.create("Acme", plan).await.expect("create tenant");
        let issued = self.state.api_keys.issue(&tenant.id, "tests").await.expect("issue key");
        TestTenant { id: tenant.id, api_key: issued.key }
    }

    /// Store `value` under `name` for the tenant
    pub async fn store_secret(&self, tenant: &TestTenant, name: &str, value: &str) {
        self.state.vault.store(&tenant.id, name, value).await.expect("store secret");
    }

    /// Create an app through the API and return its JSON
    pub async fn create_app(&self, tenant: &TestTenant, name: &str) -> Value {
        let response = self
            .send(json_request(
                Method::POST,
                "/api/v1/apps",
                Some(&tenant.api_key),
                serde_json::json!({ "name": name }),
            ))
            .await;
        assert_eq!(response.status(), 201);
        body_json(response).await
    }
}

pub fn request(method: Method, uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).expect("build request")
}

pub fn json_request(method: Method, uri: &str, api_key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder =
        Request::builder().method(method).uri(uri).header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(serde_json::to_vec(&body).expect("serialize"))).expect("build request")
}

pub fn admin_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", ADMIN_TOKEN));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).expect("serialize")))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
