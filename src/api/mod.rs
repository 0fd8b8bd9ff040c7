//! Data access against the Uniboe backend.
//!
//! `transport` performs a single HTTP exchange, `client` turns it into JSON
//! or a typed `ApiError`, `endpoints` names every route, `envelope` folds the
//! backend's list wrappers into one shape, and `service` puts them together
//! as one typed method per endpoint.

pub mod client;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod service;
pub mod transport;
pub mod types;

pub use client::{ApiClient, UnauthorizedListener};
pub use error::ApiError;
pub use service::UniboeApi;
