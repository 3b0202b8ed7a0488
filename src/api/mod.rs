//! # HTTP API
//!
//! Axum router, handlers and the middleware that resolves identities.
//! Handlers translate [`crate::errors::GatewayError`] into JSON bodies via
//! [`error::ApiError`].

pub mod docs;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub(crate) mod util;

pub use error::ApiError;
pub use routes::{build_router, ApiState};
pub use server::start_api_server;
