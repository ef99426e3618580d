//! Client-side state for the moderation views
//!
//! This crate holds the logged-in session and the paginated blocklist view,
//! keeping the most recent listing response and discarding late ones.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blocklist_view;
pub mod session;

pub use blocklist_view::{BlocklistSnapshot, BlocklistView, RequestTicket};
pub use session::SessionStore;
