//! Common test utilities for integration tests
//!
//! Builds the full router over an in-memory store, a fixed clock and mock
//! services, with every artificial delay set to zero.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use vistagen_api::app::{build_router, AppState, Services};
use vistagen_api::config::Config;
use vistagen_engine::services::mock::{
    MockArtifactService, MockEnrichmentService, MockVideoService,
};
use vistagen_shared::clock::FixedClock;
use vistagen_shared::payment::MockPaymentGateway;
use vistagen_shared::store::memory::InMemoryAccountStore;

pub const ADMIN_KEY: &str = "test-admin-key";

const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

/// Router plus handles on its collaborators
pub struct TestApp {
    pub router: Router,
    pub clock: Arc<FixedClock>,
    pub store: Arc<InMemoryAccountStore>,
}

impl TestApp {
    /// Full app with succeeding mocks and admin enabled
    pub fn new() -> Self {
        Self::with_services(default_services(), true)
    }

    /// Full app with custom services
    pub fn with_services(services: Services, admin_enabled: bool) -> Self {
        let config = test_config(admin_enabled);
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryAccountStore::new());

        let state = AppState::new(config, store.clone(), clock.clone(), services);

        TestApp {
            router: build_router(state),
            clock,
            store,
        }
    }

    /// Sends a request and returns the status with the JSON body (Null if empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(build_request("GET", uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(build_request("POST", uri, token, Some(body))).await
    }

    /// Registers `identity` and returns its session token
    pub async fn register(&self, identity: &str) -> String {
        let (status, body) = self
            .post(
                "/v1/auth/register",
                None,
                serde_json::json!({ "identity": identity }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }
}

/// Builds a JSON request with an optional bearer token
pub fn build_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Succeeding mocks with no latency
pub fn default_services() -> Services {
    Services {
        enrichment: Arc::new(MockEnrichmentService::new()),
        artifacts: Arc::new(MockArtifactService::succeeding()),
        video: Arc::new(MockVideoService::ready_after(2)),
        payments: Arc::new(MockPaymentGateway::with_latency(Duration::ZERO)),
    }
}

fn test_config(admin_enabled: bool) -> Config {
    let mut vars: HashMap<&str, &str> = HashMap::from([
        ("JWT_SECRET", JWT_SECRET),
        ("GENERATION_STAGGER_MS", "0"),
        ("VIDEO_POLL_INTERVAL_SECS", "0"),
        ("PAYMENT_LATENCY_MS", "0"),
    ]);
    if admin_enabled {
        vars.insert("ADMIN_API_KEY", ADMIN_KEY);
    }

    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}
