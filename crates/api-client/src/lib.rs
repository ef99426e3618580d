//! REST client for the federated moderation API
//!
//! This crate provides the request/response types, the error type carrying
//! the server's human-readable message, and the reqwest-backed HTTP client
//! used by the moderation services.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod rest;

pub use rest::{ApiClient, ApiClientConfig, ApiError, ApiRequest, ApiResponse, HttpMethod};
