//! Remote API access.
//!
//! `client` is the authenticated request client every data-fetching caller
//! uses; `transport` is the HTTP seam beneath it; `types` holds the wire
//! records and error types shared across the crate.

pub mod client;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::{ApiError, Role, User};
