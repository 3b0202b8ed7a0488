//! # Forwarding Engine
//!
//! Relays caller requests to a fixed set of named upstream APIs, injecting
//! the tenant's stored credential on the way out.

pub mod engine;
pub mod headers;
pub mod targets;

pub use engine::ForwardingEngine;
pub use targets::{AuthStyle, Target, TargetTable};
