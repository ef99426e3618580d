//! Moderation configuration

use crate::blocklist::{Sort, SortOrder};
use crate::identity::ROOT_USERNAME;

/// Default number of rows per blocklist page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Maximum length of a ban reason, in characters
pub const MAX_BAN_REASON_LENGTH: usize = 250;

/// Configuration for the moderation engine and listing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationConfig {
    /// Usernames that can never be banned or removed
    pub protected_usernames: Vec<String>,
    /// Rows per blocklist page
    pub page_size: u32,
    /// Initial blocklist ordering
    pub default_sort: Sort,
    /// Maximum ban reason length
    pub max_ban_reason_length: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            protected_usernames: vec![ROOT_USERNAME.to_string()],
            page_size: DEFAULT_PAGE_SIZE,
            default_sort: Sort::new("createdAt", SortOrder::Descending),
            max_ban_reason_length: MAX_BAN_REASON_LENGTH,
        }
    }
}

impl ModerationConfig {
    /// Add a protected username
    pub fn with_protected_username(mut self, username: impl Into<String>) -> Self {
        self.protected_usernames.push(username.into());
        self
    }

    /// Set the page size (at least 1)
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the default sort
    pub fn with_default_sort(mut self, sort: Sort) -> Self {
        self.default_sort = sort;
        self
    }

    /// Whether a username is immune to ban and removal
    pub fn is_protected(&self, username: &str) -> bool {
        self.protected_usernames.iter().any(|u| u == username)
    }
}
