//! # Feature Policy
//!
//! Store-backed feature flags with per-tenant overrides, structured rules,
//! plan-tier minimums and deterministic percentage rollout.

pub mod evaluator;
pub mod models;
pub mod rules;

pub use evaluator::{rollout_bucket, PolicyEvaluator};
pub use models::{
    Evaluation, EvaluationSource, FeatureFlag, FeatureOverride, FlagDefinition, OverrideDefinition,
    SHORT_SUBDOMAINS_FLAG, SHORT_SUBDOMAIN_THRESHOLD,
};
pub use rules::{Condition, FactValue, Facts, Operator, Rule};
