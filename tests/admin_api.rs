mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{admin_request, body_json, json_request, request, TestApp};
use keyrelay::domain::PlanTier;

#[tokio::test]
async fn tenant_onboarding_through_admin_endpoints() {
    let app = TestApp::new().await;

    let created = app
        .send(admin_request(
            Method::POST,
            "/api/v1/admin/tenants",
            Some(serde_json::json!({ "name": "Initech", "plan": "hobby" })),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let tenant = body_json(created).await;
    assert_eq!(tenant["planTier"], "hobby");
    let tenant_id = tenant["id"].as_str().unwrap().to_string();

    let issued = app
        .send(admin_request(
            Method::POST,
            &format!("/api/v1/admin/tenants/{}/api-keys", tenant_id),
            Some(serde_json::json!({ "name": "ci" })),
        ))
        .await;
    assert_eq!(issued.status(), StatusCode::CREATED);
    let issued = body_json(issued).await;
    let key = issued["key"].as_str().unwrap().to_string();

    // The new key authenticates tenant calls
    let usage = app.send(request(Method::GET, "/api/v1/usage", Some(&key))).await;
    assert_eq!(usage.status(), StatusCode::OK);
    let actions: Vec<String> = body_json(usage)
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["action"].as_str().unwrap().to_string())
        .collect();
    assert!(actions.contains(&"tenant.created".to_string()));
    assert!(actions.contains(&"api_key.issued".to_string()));

    let listed = app
        .send(admin_request(Method::GET, &format!("/api/v1/admin/tenants/{}/api-keys", tenant_id), None))
        .await;
    let keys = body_json(listed).await;
    assert_eq!(keys.as_array().unwrap().len(), 1);
    assert!(keys[0].get("key").is_none());

    let revoked = app
        .send(admin_request(
            Method::DELETE,
            &format!("/api/v1/admin/tenants/{}/api-keys/{}", tenant_id, issued["id"].as_str().unwrap()),
            None,
        ))
        .await;
    assert_eq!(revoked.status(), StatusCode::OK);

    let rejected = app.send(request(Method::GET, "/api/v1/usage", Some(&key))).await;
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn issued_tokens_authenticate() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;

    let issued = app
        .send(admin_request(Method::POST, &format!("/api/v1/admin/tenants/{}/tokens", tenant.id), None))
        .await;
    assert_eq!(issued.status(), StatusCode::CREATED);
    let token = body_json(issued).await["token"].as_str().unwrap().to_string();

    let response = app
        .send(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/apps")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_and_unknown_tenant_ids() {
    let app = TestApp::new().await;

    let malformed = app
        .send(admin_request(
            Method::PUT,
            "/api/v1/admin/tenants/not-a-uuid/plan",
            Some(serde_json::json!({ "plan": "pro" })),
        ))
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .send(admin_request(
            Method::POST,
            &format!("/api/v1/admin/tenants/{}/tokens", uuid::Uuid::new_v4()),
            None,
        ))
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn app_lifecycle() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;

    let created = app.create_app(&tenant, "Recipe Finder").await;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(created["slug"].as_str().unwrap().starts_with("recipe-finder-"));

    let renamed = app
        .send(json_request(
            Method::PATCH,
            &format!("/api/v1/apps/{}", id),
            Some(&tenant.api_key),
            serde_json::json!({ "name": "Recipe Search" }),
        ))
        .await;
    assert_eq!(renamed.status(), StatusCode::OK);
    let renamed = body_json(renamed).await;
    assert_eq!(renamed["name"], "Recipe Search");
    assert_eq!(renamed["slug"], created["slug"]);

    let published = app
        .send(json_request(
            Method::POST,
            &format!("/api/v1/apps/{}/publish", id),
            Some(&tenant.api_key),
            serde_json::json!({ "subdomain": "recipes" }),
        ))
        .await;
    assert_eq!(published.status(), StatusCode::OK);
    assert_eq!(body_json(published).await["subdomain"], "recipes");

    let deleted =
        app.send(request(Method::DELETE, &format!("/api/v1/apps/{}", id), Some(&tenant.api_key))).await;
    assert_eq!(deleted.status(), StatusCode::OK);

    // Deleting the app frees its subdomain
    let availability = app.send(request(Method::GET, "/api/v1/subdomains/recipes/availability", None)).await;
    assert_eq!(body_json(availability).await["available"], true);

    let listed = app.send(request(Method::GET, "/api/v1/apps", Some(&tenant.api_key))).await;
    assert_eq!(body_json(listed).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn apps_are_invisible_across_tenants() {
    let app = TestApp::new().await;
    let owner = app.tenant(PlanTier::Free).await;
    let other = app.tenant(PlanTier::Free).await;
    let created = app.create_app(&owner, "Private").await;
    let id = created["id"].as_str().unwrap();

    let rename = app
        .send(json_request(
            Method::PATCH,
            &format!("/api/v1/apps/{}", id),
            Some(&other.api_key),
            serde_json::json!({ "name": "Stolen" }),
        ))
        .await;
    assert_eq!(rename.status(), StatusCode::NOT_FOUND);

    let garbage = app.send(request(Method::DELETE, "/api/v1/apps/garbage", Some(&owner.api_key))).await;
    assert_eq!(garbage.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_docs_are_public() {
    let app = TestApp::new().await;

    let health = app.send(request(Method::GET, "/health", None)).await;
    assert_eq!(health.status(), StatusCode::OK);

    let docs = app.send(request(Method::GET, "/api-docs/openapi.json", None)).await;
    assert_eq!(docs.status(), StatusCode::OK);
    let document = body_json(docs).await;
    assert!(document["paths"].get("/api/v1/secrets").is_some());
}
