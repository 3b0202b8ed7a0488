//! # Error Handling
//!
//! Error types shared by every gateway component. Failures are always scoped
//! to the request that produced them.

pub mod types;

pub use types::{ErrorContext, GatewayError, Result};

/// Short alias used throughout the crate
pub type Error = GatewayError;
