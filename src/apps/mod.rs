//! # Apps
//!
//! Published client applications. Each app has an immutable, globally unique
//! slug (always reachable at `/a/{slug}`) and at most one claimed subdomain.

pub mod service;

pub use service::{AppService, PublishOutcome};
