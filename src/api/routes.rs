use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{any, delete, get, patch, post, put},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::apps::AppService;
use crate::auth::{
    middleware::{authenticate, require_admin, AdminTokenDigest},
    ApiKeyService, IdentityResolver, TokenIssuer,
};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::forwarding::{ForwardingEngine, TargetTable};
use crate::policy::PolicyEvaluator;
use crate::storage::{repositories::TenantRepository, DbPool};
use crate::subdomain::{SubdomainAllocator, SubdomainArbiter};
use crate::usage::UsageRecorder;
use crate::vault::{SecretCipher, SecretVault};

use super::{
    docs,
    handlers::{
        app_features_handler, availability_handler, claim_subdomain_handler,
        clear_override_handler, create_app_handler, create_secret_handler, create_tenant_handler,
        delete_app_handler, delete_secret_handler, evaluate_feature_handler, health_handler,
        issue_api_key_handler, issue_token_handler, list_api_keys_handler, list_apps_handler,
        list_flags_handler, list_secrets_handler, list_subdomains_handler, list_usage_handler,
        proxy::{add_cors, proxy_handler},
        publish_app_handler, release_subdomain_handler, rename_app_handler,
        revoke_api_key_handler, set_override_handler, set_plan_handler, upsert_flag_handler,
    },
    rate_limit::RateLimiter,
};

/// Everything a handler can reach. Cheap to clone; services share the pool.
#[derive(Clone)]
pub struct ApiState {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub resolver: Arc<IdentityResolver>,
    pub tokens: TokenIssuer,
    pub api_keys: ApiKeyService,
    pub tenants: TenantRepository,
    pub vault: SecretVault,
    pub policy: PolicyEvaluator,
    pub arbiter: SubdomainArbiter,
    pub apps: AppService,
    pub engine: ForwardingEngine,
    pub usage: UsageRecorder,
    pub availability_limiter: RateLimiter,
    pub claim_limiter: RateLimiter,
    pub admin_token: AdminTokenDigest,
}

impl ApiState {
    /// Wire every service against one pool
    pub fn new(pool: DbPool, config: AppConfig, targets: TargetTable) -> Result<Self> {
        let tokens = TokenIssuer::new(&config.auth);
        let api_keys = ApiKeyService::new(pool.clone())?;
        let resolver = IdentityResolver::new(pool.clone(), tokens.clone(), api_keys.clone());

        let usage = UsageRecorder::new(pool.clone());
        let vault = SecretVault::new(pool.clone(), SecretCipher::new(&config.vault)?);
        let policy = PolicyEvaluator::new(pool.clone());
        let arbiter = SubdomainArbiter::new(pool.clone(), policy.clone());
        let apps = AppService::new(pool.clone(), SubdomainAllocator::new(arbiter.clone()));
        let engine =
            ForwardingEngine::new(targets, vault.clone(), usage.clone(), config.forwarding.clone())?;

        let limits = &config.rate_limits;
        let availability_limiter = RateLimiter::new(
            "availability",
            limits.availability_per_minute,
            Duration::from_secs(60),
        );
        let claim_limiter =
            RateLimiter::new("claim", limits.claims_per_hour, Duration::from_secs(3600));

        Ok(Self {
            admin_token: AdminTokenDigest::new(config.auth.admin_token.as_deref()),
            tenants: TenantRepository::new(pool.clone()),
            pool,
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            tokens,
            api_keys,
            vault,
            policy,
            arbiter,
            apps,
            engine,
            usage,
            availability_limiter,
            claim_limiter,
        })
    }

    /// Start the rate-limit sweepers. Handles end with the runtime.
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let interval = Duration::from_secs(self.config.rate_limits.sweep_interval_seconds);
        vec![
            self.availability_limiter.spawn_sweeper(interval),
            self.claim_limiter.spawn_sweeper(interval),
        ]
    }
}

pub fn build_router(state: ApiState) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.resolver.clone(), authenticate);
    let admin_layer = middleware::from_fn_with_state(state.admin_token.clone(), require_admin);

    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/subdomains/{subdomain}/availability", get(availability_handler));

    let secured_api = Router::new()
        .route("/api/v1/secrets", post(create_secret_handler).get(list_secrets_handler))
        .route("/api/v1/secrets/{name}", delete(delete_secret_handler))
        .route("/api/v1/subdomains", post(claim_subdomain_handler).get(list_subdomains_handler))
        .route("/api/v1/subdomains/{subdomain}", delete(release_subdomain_handler))
        .route("/api/v1/features/{flag}", get(evaluate_feature_handler))
        .route("/api/v1/apps", post(create_app_handler).get(list_apps_handler))
        .route("/api/v1/apps/{id}", patch(rename_app_handler).delete(delete_app_handler))
        .route("/api/v1/apps/{id}/publish", post(publish_app_handler))
        .route("/api/v1/apps/{id}/features", get(app_features_handler))
        .route("/api/v1/usage", get(list_usage_handler))
        .route_layer(auth_layer.clone());

    // CORS wraps the auth layer so rejected calls still carry the headers
    let proxy = Router::new()
        .route("/proxy/{target}/{*path}", any(proxy_handler))
        .route_layer(auth_layer)
        .layer(middleware::map_response(add_cors));

    let admin = Router::new()
        .route("/api/v1/admin/tenants", post(create_tenant_handler))
        .route("/api/v1/admin/tenants/{id}/plan", put(set_plan_handler))
        .route(
            "/api/v1/admin/tenants/{id}/api-keys",
            post(issue_api_key_handler).get(list_api_keys_handler),
        )
        .route("/api/v1/admin/tenants/{id}/api-keys/{key_id}", delete(revoke_api_key_handler))
        .route("/api/v1/admin/tenants/{id}/tokens", post(issue_token_handler))
        .route("/api/v1/admin/flags", get(list_flags_handler))
        .route("/api/v1/admin/flags/{name}", put(upsert_flag_handler))
        .route(
            "/api/v1/admin/flags/{name}/overrides/{tenant_id}",
            put(set_override_handler).delete(clear_override_handler),
        )
        .route_layer(admin_layer);

    Router::new()
        .merge(public)
        .merge(secured_api)
        .merge(proxy)
        .merge(admin)
        .with_state(state)
        .merge(docs::docs_router())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            crate::request_span!(request.method(), request.uri().path())
        }))
}
