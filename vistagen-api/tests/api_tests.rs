/// Integration tests for the Vistagen API
///
/// These drive the full router in-process:
/// - Sessions and authentication
/// - Quota-gated generation, including failure without charge
/// - Subscriptions through the simulated payment gateway
/// - Video extension
/// - Admin routes

mod common;

use axum::http::{Request, StatusCode};
use common::{build_request, default_services, TestApp, ADMIN_KEY};
use serde_json::{json, Value};
use std::sync::Arc;
use vistagen_api::app::Services;
use vistagen_engine::services::mock::{MockArtifactService, MockEnrichmentService};
use vistagen_engine::services::EnrichmentError;

fn card(number: &str) -> Value {
    json!({
        "number": number,
        "expiry": "12/30",
        "cvc": "123",
        "name": "Arta Hoxha"
    })
}

fn admin_request(method: &str, uri: &str, key: Option<&str>, body: Option<Value>) -> Request<axum::body::Body> {
    let mut request = build_request(method, uri, None, body);
    if let Some(key) = key {
        request
            .headers_mut()
            .insert("x-admin-key", key.parse().unwrap());
    }
    request
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();

    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["mode"], "demo");
}

#[tokio::test]
async fn test_register_and_login() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/v1/auth/register",
            None,
            json!({ "identity": "Arta@Example.com", "name": "Arta" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["account"]["identity"], "arta@example.com");
    assert_eq!(body["account"]["tier"], "free");
    assert_eq!(body["account"]["daily_usage"], 0);

    let (status, body) = app
        .post("/v1/auth/login", None, json!({ "identity": "arta@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_identities() {
    let app = TestApp::new();
    app.register("arta@example.com").await;

    let (status, body) = app
        .post("/v1/auth/register", None, json!({ "identity": " ARTA@example.com " }))
        .await;
    // Whitespace fails email validation before the duplicate check
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = app
        .post("/v1/auth/register", None, json!({ "identity": "ARTA@example.com" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = app
        .post("/v1/auth/register", None, json!({ "identity": "not-an-email" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_unknown_identity() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/v1/auth/login", None, json!({ "identity": "nobody@example.com" }))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_account_requires_session() {
    let app = TestApp::new();

    let (status, body) = app.get("/v1/account", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app.get("/v1/account", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.register("arta@example.com").await;
    let (status, body) = app.get("/v1/account", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["used"], 0);
    assert_eq!(body["remaining"], 1);
    assert_eq!(body["allowed"], true);
}

#[tokio::test]
async fn test_free_tier_generation_then_quota_exceeded() {
    let app = TestApp::new();
    let token = app.register("arta@example.com").await;

    let (status, body) = app
        .post(
            "/v1/generations",
            Some(&token),
            json!({ "input": "nje vajze ne plazh ne Ksamil" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 3);
    let indices: Vec<u64> = images.iter().map(|i| i["index"].as_u64().unwrap()).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(images[0]["data_uri"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert_eq!(body["failed_attempts"], 0);
    assert!(!body["brief"]["final_generation_prompt"]
        .as_str()
        .unwrap()
        .is_empty());
    assert_eq!(body["quota"]["used"], 1);
    assert_eq!(body["quota"]["remaining"], 0);

    let (status, body) = app
        .post("/v1/generations", Some(&token), json!({ "input": "nje qen" }))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "quota_exceeded");

    let (_, account) = app.get("/v1/account", Some(&token)).await;
    assert_eq!(account["used"], 1);
}

#[tokio::test]
async fn test_usage_resets_at_midnight() {
    let app = TestApp::new();
    let token = app.register("arta@example.com").await;

    let (status, _) = app
        .post("/v1/generations", Some(&token), json!({ "input": "nje qen" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance(chrono::Duration::days(1));

    let (_, account) = app.get("/v1/account", Some(&token)).await;
    assert_eq!(account["used"], 0);
    assert_eq!(account["remaining"], 1);

    let (status, _) = app
        .post("/v1/generations", Some(&token), json!({ "input": "nje mace" }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_failed_generation_is_not_charged() {
    let services = Services {
        artifacts: Arc::new(MockArtifactService::failing()),
        ..default_services()
    };
    let app = TestApp::with_services(services, true);
    let token = app.register("arta@example.com").await;

    let (status, body) = app
        .post("/v1/generations", Some(&token), json!({ "input": "nje qen" }))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "generation_failed");
    assert!(!body["message"].as_str().unwrap().contains("mock outage"));

    let (_, account) = app.get("/v1/account", Some(&token)).await;
    assert_eq!(account["used"], 0);
    assert_eq!(account["remaining"], 1);
}

#[tokio::test]
async fn test_enrichment_failure() {
    let services = Services {
        enrichment: Arc::new(MockEnrichmentService::failing(EnrichmentError::Unavailable(
            "503 from model".to_string(),
        ))),
        ..default_services()
    };
    let app = TestApp::with_services(services, true);
    let token = app.register("arta@example.com").await;

    let (status, body) = app
        .post("/v1/generations", Some(&token), json!({ "input": "nje qen" }))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "enrichment_failed");

    let (_, account) = app.get("/v1/account", Some(&token)).await;
    assert_eq!(account["used"], 0);
}

#[tokio::test]
async fn test_blank_input_is_rejected() {
    let app = TestApp::new();
    let token = app.register("arta@example.com").await;

    let (status, _) = app
        .post("/v1/generations", Some(&token), json!({ "input": "" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app
        .post("/v1/generations", Some(&token), json!({ "input": "   " }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "input");
}

#[tokio::test]
async fn test_subscription_flow() {
    let app = TestApp::new();
    let token = app.register("arta@example.com").await;

    // Use the single free generation first
    let (status, _) = app
        .post("/v1/generations", Some(&token), json!({ "input": "nje qen" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/v1/subscriptions",
            Some(&token),
            json!({ "tier": "standard", "card": card("4000 0000 0000 0002") }),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "payment_declined");
    assert_eq!(body["message"], "Your card was declined.");

    let (status, body) = app
        .post(
            "/v1/subscriptions",
            Some(&token),
            json!({ "tier": "standard", "card": card("4242 4242 4242 4242") }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["receipt"]["transaction_id"]
        .as_str()
        .unwrap()
        .starts_with("ch_"));
    assert_eq!(body["receipt"]["amount"], 500);
    assert_eq!(body["receipt"]["currency"], "LEK");
    assert_eq!(body["quota"]["account"]["tier"], "standard");
    assert_eq!(body["quota"]["used"], 1);
    assert_eq!(body["quota"]["remaining"], 4);

    let (status, body) = app
        .post("/v1/generations", Some(&token), json!({ "input": "nje mace" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quota"]["used"], 2);
}

#[tokio::test]
async fn test_subscription_rejects_free_and_current_tier() {
    let app = TestApp::new();
    let token = app.register("arta@example.com").await;

    let (status, _) = app
        .post(
            "/v1/subscriptions",
            Some(&token),
            json!({ "tier": "free", "card": card("4242424242424242") }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/v1/subscriptions",
            Some(&token),
            json!({ "tier": "premium", "card": card("4242424242424242") }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/v1/subscriptions",
            Some(&token),
            json!({ "tier": "premium", "card": card("4242424242424242") }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_subscription_incomplete_card() {
    let app = TestApp::new();
    let token = app.register("arta@example.com").await;

    let (status, body) = app
        .post(
            "/v1/subscriptions",
            Some(&token),
            json!({ "tier": "standard", "card": card("4242") }),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["message"], "Your card number is incomplete.");

    let (_, account) = app.get("/v1/account", Some(&token)).await;
    assert_eq!(account["account"]["tier"], "free");
}

#[tokio::test]
async fn test_video_extension() {
    let app = TestApp::new();
    let token = app.register("arta@example.com").await;

    let (_, generated) = app
        .post("/v1/generations", Some(&token), json!({ "input": "det ne Dhermi" }))
        .await;
    let image = generated["images"][0]["data_uri"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/v1/videos",
            Some(&token),
            json!({ "image": image, "prompt": "waves rolling in" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["mime_type"], "video/mp4");
    assert!(body["data_uri"]
        .as_str()
        .unwrap()
        .starts_with("data:video/mp4;base64,"));

    // Video does not consume quota
    let (_, account) = app.get("/v1/account", Some(&token)).await;
    assert_eq!(account["used"], 1);
}

#[tokio::test]
async fn test_video_rejects_invalid_image() {
    let app = TestApp::new();
    let token = app.register("arta@example.com").await;

    let (status, body) = app
        .post(
            "/v1/videos",
            Some(&token),
            json!({ "image": "https://example.com/cat.png", "prompt": "waves" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "image");
}

#[tokio::test]
async fn test_admin_requires_key() {
    let app = TestApp::new();

    let (status, _) = app
        .send(admin_request("GET", "/v1/admin/accounts", None, None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(admin_request("GET", "/v1/admin/accounts", Some("wrong-key"), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let disabled = TestApp::with_services(default_services(), false);
    let (status, body) = disabled
        .send(admin_request("GET", "/v1/admin/accounts", Some(ADMIN_KEY), None))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_admin_list_and_update() {
    let app = TestApp::new();
    let token = app.register("zana@example.com").await;
    app.register("arta@example.com").await;

    let (status, _) = app
        .post("/v1/generations", Some(&token), json!({ "input": "nje qen" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(admin_request("GET", "/v1/admin/accounts", Some(ADMIN_KEY), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["accounts"][0]["identity"], "arta@example.com");
    assert_eq!(body["accounts"][1]["daily_usage"], 1);

    let (status, body) = app
        .send(admin_request("GET", "/v1/admin/accounts?q=ZANA", Some(ADMIN_KEY), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["accounts"][0]["identity"], "zana@example.com");

    let (status, body) = app
        .send(admin_request(
            "PUT",
            "/v1/admin/accounts/zana@example.com",
            Some(ADMIN_KEY),
            Some(json!({ "tier": "premium", "daily_usage": 0 })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["account"]["tier"], "premium");
    assert_eq!(body["limit"], 15);
    assert_eq!(body["remaining"], 15);

    let (_, account) = app.get("/v1/account", Some(&token)).await;
    assert_eq!(account["account"]["tier"], "premium");

    let (status, _) = app
        .send(admin_request(
            "PUT",
            "/v1/admin/accounts/nobody@example.com",
            Some(ADMIN_KEY),
            Some(json!({ "tier": "standard" })),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
