mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{admin_request, body_json, request, TestApp};
use keyrelay::domain::PlanTier;
use keyrelay::policy::rollout_bucket;

async fn put_flag(app: &TestApp, name: &str, definition: serde_json::Value) {
    let response = app
        .send(admin_request(Method::PUT, &format!("/api/v1/admin/flags/{}", name), Some(definition)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rollout_is_deterministic_per_tenant() {
    let app = TestApp::new().await;
    put_flag(
        &app,
        "new_dashboard",
        serde_json::json!({ "enabled": true, "rolloutPercentage": 50 }),
    )
    .await;

    for _ in 0..5 {
        let tenant = app.tenant(PlanTier::Free).await;
        let expected = rollout_bucket(&tenant.id, "new_dashboard") < 50;

        let first = body_json(
            app.send(request(Method::GET, "/api/v1/features/new_dashboard", Some(&tenant.api_key))).await,
        )
        .await;
        let second = body_json(
            app.send(request(Method::GET, "/api/v1/features/new_dashboard", Some(&tenant.api_key))).await,
        )
        .await;

        assert_eq!(first["enabled"], expected);
        assert_eq!(first, second);
        assert_eq!(first["source"], "rollout");
    }
}

#[tokio::test]
async fn plan_minimum_gates_seeded_flag() {
    let app = TestApp::new().await;
    let free = app.tenant(PlanTier::Free).await;
    let pro = app.tenant(PlanTier::Pro).await;

    let denied = body_json(
        app.send(request(Method::GET, "/api/v1/features/short_subdomains", Some(&free.api_key))).await,
    )
    .await;
    assert_eq!(denied["enabled"], false);
    assert_eq!(denied["source"], "plan_tier");

    let granted = body_json(
        app.send(request(Method::GET, "/api/v1/features/short_subdomains", Some(&pro.api_key))).await,
    )
    .await;
    assert_eq!(granted["enabled"], true);
    assert_eq!(granted["source"], "rollout");
}

#[tokio::test]
async fn override_wins_until_cleared() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;
    let uri = format!("/api/v1/admin/flags/short_subdomains/overrides/{}", tenant.id);

    let set = app
        .send(admin_request(
            Method::PUT,
            &uri,
            Some(serde_json::json!({ "enabled": true, "reason": "beta partner" })),
        ))
        .await;
    assert_eq!(set.status(), StatusCode::OK);

    let evaluated = body_json(
        app.send(request(Method::GET, "/api/v1/features/short_subdomains", Some(&tenant.api_key))).await,
    )
    .await;
    assert_eq!(evaluated["enabled"], true);
    assert_eq!(evaluated["source"], "override");

    let cleared = app.send(admin_request(Method::DELETE, &uri, None)).await;
    assert_eq!(cleared.status(), StatusCode::OK);
    let again = app.send(admin_request(Method::DELETE, &uri, None)).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    let evaluated = body_json(
        app.send(request(Method::GET, "/api/v1/features/short_subdomains", Some(&tenant.api_key))).await,
    )
    .await;
    assert_eq!(evaluated["source"], "plan_tier");
}

#[tokio::test]
async fn expired_override_is_ignored() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;
    let expired = chrono::Utc::now() - chrono::Duration::hours(1);

    let set = app
        .send(admin_request(
            Method::PUT,
            &format!("/api/v1/admin/flags/short_subdomains/overrides/{}", tenant.id),
            Some(serde_json::json!({ "enabled": true, "expiresAt": expired.to_rfc3339() })),
        ))
        .await;
    assert_eq!(set.status(), StatusCode::OK);

    let evaluated = body_json(
        app.send(request(Method::GET, "/api/v1/features/short_subdomains", Some(&tenant.api_key))).await,
    )
    .await;
    assert_eq!(evaluated["enabled"], false);
    assert_eq!(evaluated["source"], "plan_tier");
}

#[tokio::test]
async fn custom_rule_reads_query_facts() {
    let app = TestApp::new().await;
    put_flag(
        &app,
        "bulk_export",
        serde_json::json!({
            "enabled": true,
            "rolloutPercentage": 0,
            "rule": { "all": [
                { "fact": "plan_tier", "op": "gte", "value": "hobby" },
                { "fact": "seats", "op": "gt", "value": 10 }
            ]}
        }),
    )
    .await;
    let tenant = app.tenant(PlanTier::Pro).await;

    let small = body_json(
        app.send(request(Method::GET, "/api/v1/features/bulk_export?seats=3", Some(&tenant.api_key))).await,
    )
    .await;
    assert_eq!(small["enabled"], false);
    assert_eq!(small["source"], "custom_rule");

    let large = body_json(
        app.send(request(Method::GET, "/api/v1/features/bulk_export?seats=25", Some(&tenant.api_key))).await,
    )
    .await;
    assert_eq!(large["enabled"], true);

    // plan_tier always comes from the tenant record
    let free = app.tenant(PlanTier::Free).await;
    let spoofed = body_json(
        app.send(request(
            Method::GET,
            "/api/v1/features/bulk_export?seats=25&plan_tier=business",
            Some(&free.api_key),
        ))
        .await,
    )
    .await;
    assert_eq!(spoofed["enabled"], false);
}

#[tokio::test]
async fn unknown_flag_is_not_found() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;

    let response =
        app.send(request(Method::GET, "/api/v1/features/does_not_exist", Some(&tenant.api_key))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn app_identity_reads_only_its_own_features() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;
    let mine = app.create_app(&tenant, "Mine").await;
    let theirs = app.create_app(&tenant, "Theirs").await;

    let by_slug = |id: &str| {
        Request::builder()
            .method(Method::GET)
            .uri(format!("/api/v1/apps/{}/features", id))
            .header("x-app-slug", mine["slug"].as_str().unwrap())
            .body(Body::empty())
            .unwrap()
    };

    let own = app.send(by_slug(mine["id"].as_str().unwrap())).await;
    assert_eq!(own.status(), StatusCode::OK);
    let body = body_json(own).await;
    assert_eq!(body["appId"], mine["id"]);
    assert!(body["features"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f["flag"] == "short_subdomains"));

    let other = app.send(by_slug(theirs["id"].as_str().unwrap())).await;
    assert_eq!(other.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_endpoints_require_the_admin_token() {
    let app = TestApp::new().await;
    let tenant = app.tenant(PlanTier::Free).await;

    let anonymous = app.send(request(Method::GET, "/api/v1/admin/flags", None)).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    // A tenant credential is not an admin credential
    let tenant_key = app.send(request(Method::GET, "/api/v1/admin/flags", Some(&tenant.api_key))).await;
    assert_eq!(tenant_key.status(), StatusCode::UNAUTHORIZED);

    let admin = app.send(admin_request(Method::GET, "/api/v1/admin/flags", None)).await;
    assert_eq!(admin.status(), StatusCode::OK);
    assert!(body_json(admin)
        .await
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f["name"] == "short_subdomains"));
}

#[tokio::test]
async fn invalid_flag_definitions_are_rejected() {
    let app = TestApp::new().await;

    let bad_percentage = app
        .send(admin_request(
            Method::PUT,
            "/api/v1/admin/flags/too_much",
            Some(serde_json::json!({ "enabled": true, "rolloutPercentage": 150 })),
        ))
        .await;
    assert_eq!(bad_percentage.status(), StatusCode::BAD_REQUEST);

    let bad_name = app
        .send(admin_request(
            Method::PUT,
            "/api/v1/admin/flags/Not-Valid",
            Some(serde_json::json!({ "enabled": true, "rolloutPercentage": 10 })),
        ))
        .await;
    assert_eq!(bad_name.status(), StatusCode::BAD_REQUEST);
}
