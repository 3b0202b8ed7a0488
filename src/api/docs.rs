use axum::Router;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::error::ErrorBody;
use crate::api::handlers::{
    admin::{CreateTenantRequest, IssueApiKeyRequest, RemovedResponse, SetPlanRequest},
    apps::{AppNameRequest, DeletedAppResponse, PublishRequest},
    features::AppFeatures,
    health::HealthResponse,
    secrets::{CreateSecretRequest, DeletedResponse},
    subdomains::{ClaimSubdomainRequest, ReleasedResponse},
    usage::UsageQuery,
};
use crate::apps::PublishOutcome;
use crate::auth::{IssuedApiKey, IssuedToken};
use crate::domain::PlanTier;
use crate::policy::{
    Evaluation, EvaluationSource, FeatureFlag, FeatureOverride, FlagDefinition,
    OverrideDefinition,
};
use crate::storage::repositories::{ApiKeySummary, AppData, SubdomainClaim, TenantData, UsageRecord};
use crate::subdomain::Availability;
use crate::vault::{MaskedSecret, StoredSecret};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::proxy::proxy_handler,
        crate::api::handlers::secrets::create_secret_handler,
        crate::api::handlers::secrets::list_secrets_handler,
        crate::api::handlers::secrets::delete_secret_handler,
        crate::api::handlers::subdomains::availability_handler,
        crate::api::handlers::subdomains::claim_subdomain_handler,
        crate::api::handlers::subdomains::release_subdomain_handler,
        crate::api::handlers::subdomains::list_subdomains_handler,
        crate::api::handlers::features::evaluate_feature_handler,
        crate::api::handlers::features::app_features_handler,
        crate::api::handlers::apps::create_app_handler,
        crate::api::handlers::apps::list_apps_handler,
        crate::api::handlers::apps::rename_app_handler,
        crate::api::handlers::apps::delete_app_handler,
        crate::api::handlers::apps::publish_app_handler,
        crate::api::handlers::usage::list_usage_handler,
        crate::api::handlers::admin::create_tenant_handler,
        crate::api::handlers::admin::set_plan_handler,
        crate::api::handlers::admin::issue_api_key_handler,
        crate::api::handlers::admin::list_api_keys_handler,
        crate::api::handlers::admin::revoke_api_key_handler,
        crate::api::handlers::admin::issue_token_handler,
        crate::api::handlers::admin::list_flags_handler,
        crate::api::handlers::admin::upsert_flag_handler,
        crate::api::handlers::admin::set_override_handler,
        crate::api::handlers::admin::clear_override_handler,
    ),
    components(
        schemas(
            ErrorBody,
            HealthResponse,
            CreateSecretRequest,
            DeletedResponse,
            StoredSecret,
            MaskedSecret,
            ClaimSubdomainRequest,
            ReleasedResponse,
            Availability,
            SubdomainClaim,
            Evaluation,
            EvaluationSource,
            AppFeatures,
            AppNameRequest,
            PublishRequest,
            PublishOutcome,
            DeletedAppResponse,
            AppData,
            UsageQuery,
            UsageRecord,
            CreateTenantRequest,
            SetPlanRequest,
            IssueApiKeyRequest,
            RemovedResponse,
            TenantData,
            PlanTier,
            IssuedApiKey,
            ApiKeySummary,
            IssuedToken,
            FeatureFlag,
            FlagDefinition,
            FeatureOverride,
            OverrideDefinition,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "proxy", description = "Credential-injecting forwarding to upstream providers"),
        (name = "secrets", description = "Per-tenant encrypted secrets"),
        (name = "subdomains", description = "Subdomain claims and availability"),
        (name = "features", description = "Feature flag evaluation"),
        (name = "apps", description = "App lifecycle and publishing"),
        (name = "usage", description = "Usage and audit history"),
        (name = "admin", description = "Operator endpoints guarded by the admin token"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
        components.add_security_scheme(
            "apiKey",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Api-Key"))),
        );
        components.add_security_scheme(
            "appSlug",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-App-Slug"))),
        );
        components.add_security_scheme(
            "adminToken",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

pub fn docs_router() -> Router {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()).into()
}
