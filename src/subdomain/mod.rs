//! # Subdomain Arbitration
//!
//! Validation, claim/release arbitration and fallback allocation of app
//! subdomains.

pub mod allocator;
pub mod arbiter;
pub mod validation;

pub use allocator::SubdomainAllocator;
pub use arbiter::{Availability, SubdomainArbiter};
pub use validation::{is_reserved, normalize_subdomain, slugify};
