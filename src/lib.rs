//! # Keyrelay
//!
//! A multi-tenant credential gateway. Tenants store provider secrets once and
//! call upstream APIs through the gateway, which resolves the caller, injects
//! the right credential and relays the response, streaming when the upstream
//! streams.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum) → identity resolver → forwarding engine → upstream provider
//!                     ↓                    ↓
//!              policy evaluator      secret vault → SQLite
//!                     ↓                    ↓
//!             subdomain arbiter      usage recorder
//! ```
//!
//! ## Core Components
//!
//! - [`auth`]: bearer tokens, API keys and public app identities
//! - [`vault`]: AES-256-GCM sealed secrets scoped per tenant
//! - [`forwarding`]: static target table and the credential-injecting proxy
//! - [`policy`]: feature flags with overrides, rules, plan gates and rollouts
//! - [`subdomain`]: atomic subdomain claims and the fallback allocator
//! - [`usage`]: append-only usage and audit records

pub mod api;
pub mod apps;
pub mod auth;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod forwarding;
pub mod observability;
pub mod policy;
pub mod storage;
pub mod subdomain;
pub mod usage;
pub mod vault;

pub use config::AppConfig;
pub use errors::{Error, GatewayError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
