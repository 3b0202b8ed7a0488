//! HTTP request handlers organized by resource type

pub mod admin;
pub mod apps;
pub mod features;
pub mod health;
pub mod proxy;
pub mod secrets;
pub mod subdomains;
pub mod usage;

pub use admin::{
    clear_override_handler, create_tenant_handler, issue_api_key_handler, issue_token_handler,
    list_api_keys_handler, list_flags_handler, revoke_api_key_handler, set_override_handler,
    set_plan_handler, upsert_flag_handler,
};
pub use apps::{
    create_app_handler, delete_app_handler, list_apps_handler, publish_app_handler,
    rename_app_handler,
};
pub use features::{app_features_handler, evaluate_feature_handler};
pub use health::health_handler;
pub use proxy::proxy_handler;
pub use secrets::{create_secret_handler, delete_secret_handler, list_secrets_handler};
pub use subdomains::{
    availability_handler, claim_subdomain_handler, list_subdomains_handler,
    release_subdomain_handler,
};
pub use usage::list_usage_handler;
