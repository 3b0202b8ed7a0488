//! # Domain Types
//!
//! Identifiers and value types shared across the gateway.

pub mod id;
pub mod plan;

pub use id::{ApiKeyId, AppId, SecretId, TenantId, UsageRecordId};
pub use plan::PlanTier;
