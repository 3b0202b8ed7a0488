mod common;

use axum::http::{Method, StatusCode};
use common::{admin_request, body_json, json_request, request, TestApp};
use keyrelay::domain::PlanTier;

fn claim_body(subdomain: &str, app: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "subdomain": subdomain, "appId": app["id"] })
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let app = TestApp::new().await;
    let alice = app.tenant(PlanTier::Free).await;
    let bob = app.tenant(PlanTier::Free).await;
    let alice_app = app.create_app(&alice, "Alice Chat").await;
    let bob_app = app.create_app(&bob, "Bob Chat").await;

    let (first, second) = tokio::join!(
        app.send(json_request(
            Method::POST,
            "/api/v1/subdomains",
            Some(&alice.api_key),
            claim_body("contested", &alice_app),
        )),
        app.send(json_request(
            Method::POST,
            "/api/v1/subdomains",
            Some(&bob.api_key),
            claim_body("contested", &bob_app),
        )),
    );

    let mut statuses = vec![first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let loser = if first.status() == StatusCode::CONFLICT { first } else { second };
    assert_eq!(body_json(loser).await["error"], "conflict");
}

#[tokio::test]
async fn short_names_unlock_after_upgrade() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;
    let chat = app.create_app(&tenant, "Chat").await;

    let denied = app
        .send(json_request(Method::POST, "/api/v1/subdomains", Some(&tenant.api_key), claim_body("chat", &chat)))
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    let body = body_json(denied).await;
    assert_eq!(body["error"], "forbidden");
    assert!(body["hint"].is_string());

    let upgraded = app
        .send(admin_request(
            Method::PUT,
            &format!("/api/v1/admin/tenants/{}/plan", tenant.id),
            Some(serde_json::json!({ "plan": "pro" })),
        ))
        .await;
    assert_eq!(upgraded.status(), StatusCode::OK);
    assert_eq!(body_json(upgraded).await["planTier"], "pro");

    let granted = app
        .send(json_request(Method::POST, "/api/v1/subdomains", Some(&tenant.api_key), claim_body("chat", &chat)))
        .await;
    assert_eq!(granted.status(), StatusCode::OK);
    assert_eq!(body_json(granted).await["subdomain"], "chat");
}

#[tokio::test]
async fn reserved_and_malformed_names_are_bad_requests() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Business).await;
    let site = app.create_app(&tenant, "Site").await;

    for (name, kind) in [("admin", "reserved"), ("-edge", "invalid_subdomain"), ("a", "invalid_subdomain")] {
        let response = app
            .send(json_request(Method::POST, "/api/v1/subdomains", Some(&tenant.api_key), claim_body(name, &site)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", name);
        assert_eq!(body_json(response).await["error"], kind, "{}", name);
    }
}

#[tokio::test]
async fn release_then_reclaim() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;
    let site = app.create_app(&tenant, "Docs Site").await;

    let claim = || {
        json_request(Method::POST, "/api/v1/subdomains", Some(&tenant.api_key), claim_body("docs-site", &site))
    };

    assert_eq!(app.send(claim()).await.status(), StatusCode::OK);
    // Same app cannot hold a second name without releasing first
    let second = app
        .send(json_request(Method::POST, "/api/v1/subdomains", Some(&tenant.api_key), claim_body("docs-site-2", &site)))
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let released =
        app.send(request(Method::DELETE, "/api/v1/subdomains/docs-site", Some(&tenant.api_key))).await;
    assert_eq!(released.status(), StatusCode::OK);

    let missing =
        app.send(request(Method::DELETE, "/api/v1/subdomains/docs-site", Some(&tenant.api_key))).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    assert_eq!(app.send(claim()).await.status(), StatusCode::OK);

    let listed = app.send(request(Method::GET, "/api/v1/subdomains", Some(&tenant.api_key))).await;
    let claims = body_json(listed).await;
    assert_eq!(claims.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn foreign_release_is_indistinguishable_from_missing() {
    let app = TestApp::new().await;
    let owner = app.tenant(PlanTier::Free).await;
    let other = app.tenant(PlanTier::Free).await;
    let site = app.create_app(&owner, "Owner Site").await;

    let claimed = app
        .send(json_request(Method::POST, "/api/v1/subdomains", Some(&owner.api_key), claim_body("owner-site", &site)))
        .await;
    assert_eq!(claimed.status(), StatusCode::OK);

    let foreign =
        app.send(request(Method::DELETE, "/api/v1/subdomains/owner-site", Some(&other.api_key))).await;
    let missing =
        app.send(request(Method::DELETE, "/api/v1/subdomains/never-claimed", Some(&other.api_key))).await;

    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let foreign_body = body_json(foreign).await;
    let missing_body = body_json(missing).await;
    assert_eq!(foreign_body["error"], missing_body["error"]);

    let availability =
        app.send(request(Method::GET, "/api/v1/subdomains/owner-site/availability", None)).await;
    assert_eq!(body_json(availability).await["available"], false);
}

#[tokio::test]
async fn availability_is_public_and_rate_limited() {
    let app = TestApp::new().await;

    let first = app.send(request(Method::GET, "/api/v1/subdomains/fresh-name/availability", None)).await;
    assert_eq!(first.status(), StatusCode::OK);
    let body = body_json(first).await;
    assert_eq!(body["available"], true);
    assert!(body["reason"].is_null());

    let reserved = app.send(request(Method::GET, "/api/v1/subdomains/www/availability", None)).await;
    assert_eq!(body_json(reserved).await["reason"], "reserved");

    // Two checks used; the default window allows ten
    for _ in 0..8 {
        let response = app.send(request(Method::GET, "/api/v1/subdomains/another/availability", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let limited = app.send(request(Method::GET, "/api/v1/subdomains/another/availability", None)).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn claims_are_rate_limited_per_tenant() {
    let app = TestApp::build(Default::default(), |config| {
        config.rate_limits.claims_per_hour = 1;
    })
    .await;
    let tenant = app.tenant(PlanTier::Free).await;
    let site = app.create_app(&tenant, "Limited").await;

    let first = app
        .send(json_request(Method::POST, "/api/v1/subdomains", Some(&tenant.api_key), claim_body("limited-one", &site)))
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .send(json_request(Method::POST, "/api/v1/subdomains", Some(&tenant.api_key), claim_body("limited-two", &site)))
        .await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(second).await["error"], "rate_limited");
}

#[tokio::test]
async fn publish_falls_back_to_suffixed_name() {
    let app = TestApp::new().await;
    let first = app.tenant(PlanTier::Free).await;
    let second = app.tenant(PlanTier::Free).await;
    let taken = app.create_app(&first, "Weather Bot").await;
    let wanted = app.create_app(&second, "Weather Bot").await;

    let claimed = app
        .send(json_request(Method::POST, "/api/v1/subdomains", Some(&first.api_key), claim_body("weather-bot", &taken)))
        .await;
    assert_eq!(claimed.status(), StatusCode::OK);

    let published = app
        .send(json_request(
            Method::POST,
            &format!("/api/v1/apps/{}/publish", wanted["id"].as_str().unwrap()),
            Some(&second.api_key),
            serde_json::json!({}),
        ))
        .await;
    assert_eq!(published.status(), StatusCode::OK);
    let outcome = body_json(published).await;
    let subdomain = outcome["subdomain"].as_str().unwrap();
    assert!(subdomain.starts_with("weather-bot-"));
    assert_eq!(subdomain.len(), "weather-bot-".len() + 4);
    assert!(outcome["path"].as_str().unwrap().starts_with("/a/"));
}

#[tokio::test]
async fn publish_names_without_ascii_still_get_a_subdomain() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;
    let created = app.create_app(&tenant, "日本語").await;

    let published = app
        .send(json_request(
            Method::POST,
            &format!("/api/v1/apps/{}/publish", created["id"].as_str().unwrap()),
            Some(&tenant.api_key),
            serde_json::json!({}),
        ))
        .await;
    assert_eq!(published.status(), StatusCode::OK);
    let subdomain = body_json(published).await["subdomain"].as_str().unwrap().to_string();
    assert!(subdomain.starts_with("app-"), "{}", subdomain);
}
