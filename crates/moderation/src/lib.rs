//! Blocklist and moderation actions
//!
//! This crate decides which moderation actions a viewer may take on a user
//! or account, runs them against the block registry and the user store, and
//! lists the viewer's own blocklists.
//!
//! - [`policy`]: pure authorization rules and the action table
//! - [`engine`]: orchestration, confirmation, protected principals, events
//! - [`blocklist`]: block records, listing parameters, [`BlockRegistry`]
//! - [`blocking`] and [`users`]: REST bindings of the registry and user store
//! - [`listing`]: paginated, caller-scoped blocklist reads

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blocking;
pub mod blocklist;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod listing;
pub mod policy;
pub mod users;

pub use blocking::RestBlocklistService;
pub use blocklist::{
    AccountBlock, BlockRegistry, InMemoryBlockRegistry, Page, Pagination, ServerBlock, Sort,
    SortOrder,
};
pub use config::ModerationConfig;
pub use engine::{
    BanRequest, Confirmation, Dispatch, ModerationEngine, ModerationEvent, ModerationOutcome,
    ModerationTarget,
};
pub use error::{ModerationError, Result};
pub use identity::{Account, Session, User, UserRight, UserRole};
pub use listing::BlocklistListing;
pub use policy::{authorize, compute_actions, edit_user_link, ActionScope, ActionSet, ModerationAction};
pub use users::{InMemoryUserDirectory, RestUserService, UserAdmin};
