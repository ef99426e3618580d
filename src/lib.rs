//! Blocklist and moderation action engine for a federated video platform
//!
//! This crate ties the workspace together:
//!
//! - [`api_client`]: REST transport to the platform API
//! - [`moderation`]: identity, authorization policy, block registry,
//!   moderation engine and blocklist listing
//! - [`app_state`]: session store and the paginated blocklist view

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use api_client;
pub use app_state;
pub use moderation;
