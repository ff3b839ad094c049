//! REST API client module for the RoadEye hazard service.
//!
//! [`HazardApi`] is the contract the sync layer depends on; [`ApiClient`]
//! implements it over HTTP with a bearer token when one is configured.

pub mod client;
pub mod error;
pub mod remote;

pub use client::ApiClient;
pub use error::ApiError;
pub use remote::HazardApi;
