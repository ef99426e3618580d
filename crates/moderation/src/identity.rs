//! Identity and rights model
//!
//! A [`User`] is a local principal holding rights; an [`Account`] is a
//! federated actor that may or may not be backed by a local user. The
//! [`Session`] is passed explicitly into every policy and engine call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{ModerationError, Result};

/// Reserved administrative username, immune to ban and removal
pub const ROOT_USERNAME: &str = "root";

/// A named capability granted to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRight {
    /// Every right
    All,
    /// Edit, delete, ban and unban local users
    ManageUsers,
    /// Manage instance follows
    ManageServerFollow,
    /// Manage video redundancy
    ManageServerRedundancy,
    /// Review video abuse reports
    ManageVideoAbuses,
    /// Inspect background jobs
    ManageJobs,
    /// Edit the instance configuration
    ManageConfiguration,
    /// Manage the instance-wide account blocklist
    ManageAccountsBlocklist,
    /// Manage the instance-wide server blocklist
    ManageServersBlocklist,
    /// Manage the video blacklist
    ManageVideoBlacklist,
    /// Remove any video
    RemoveAnyVideo,
    /// Remove any channel
    RemoveAnyVideoChannel,
    /// Remove any comment
    RemoveAnyVideoComment,
    /// Update any video
    UpdateAnyVideo,
    /// See private and unlisted videos
    SeeAllVideos,
    /// Accept or refuse ownership changes
    ChangeVideoOwnership,
}

/// Role of a local user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Instance administrator
    Administrator,
    /// Instance moderator
    Moderator,
    /// Regular user
    #[default]
    User,
}

impl UserRole {
    /// Rights every user with this role holds
    pub fn rights(&self) -> &'static [UserRight] {
        match self {
            UserRole::Administrator => &[UserRight::All],
            UserRole::Moderator => &[
                UserRight::ManageVideoBlacklist,
                UserRight::ManageVideoAbuses,
                UserRight::RemoveAnyVideo,
                UserRight::RemoveAnyVideoChannel,
                UserRight::RemoveAnyVideoComment,
                UserRight::UpdateAnyVideo,
                UserRight::SeeAllVideos,
                UserRight::ManageAccountsBlocklist,
                UserRight::ManageServersBlocklist,
                UserRight::ManageUsers,
            ],
            UserRole::User => &[],
        }
    }
}

/// Federated actor identity
///
/// `blocked` and `server_blocked` describe the relationship from the current
/// viewer's perspective; they are only flipped after the registry
/// acknowledges a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account id
    pub id: u64,
    /// Local name of the actor
    pub name: String,
    /// Domain of origin (empty for the local instance)
    #[serde(default)]
    pub host: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Backing local user, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    /// Blocked by the viewer
    #[serde(default)]
    pub blocked: bool,
    /// Origin server blocked by the viewer
    #[serde(default)]
    pub server_blocked: bool,
}

impl Account {
    /// Account backed by a local user
    pub fn local(id: u64, name: impl Into<String>, host: impl Into<String>, user_id: u64) -> Self {
        Self {
            id,
            name: name.into(),
            host: host.into(),
            display_name: None,
            user_id: Some(user_id),
            blocked: false,
            server_blocked: false,
        }
    }

    /// Remote-only account
    pub fn remote(id: u64, name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            host: host.into(),
            display_name: None,
            user_id: None,
            blocked: false,
            server_blocked: false,
        }
    }

    /// Display identity, `name@host` (or just `name` without a host)
    pub fn name_with_host(&self) -> String {
        if self.host.is_empty() {
            self.name.clone()
        } else {
            format!("{}@{}", self.name, self.host)
        }
    }

    /// Whether a local user backs this account
    pub fn is_local(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Local principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User id
    pub id: u64,
    /// Unique, immutable username
    pub username: String,
    /// Role
    #[serde(default)]
    pub role: UserRole,
    /// Rights granted on top of the role
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub rights: BTreeSet<UserRight>,
    /// Banned
    #[serde(default)]
    pub blocked: bool,
    /// Reason given when the user was banned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    /// The user's own account
    pub account: Account,
}

impl User {
    /// Create a user with the given role; its account is local to `host`
    pub fn new(id: u64, username: impl Into<String>, role: UserRole, host: &str) -> Self {
        let username = username.into();
        Self {
            id,
            account: Account::local(id, username.clone(), host, id),
            username,
            role,
            rights: BTreeSet::new(),
            blocked: false,
            blocked_reason: None,
        }
    }

    /// Grant an extra right
    pub fn with_right(mut self, right: UserRight) -> Self {
        self.rights.insert(right);
        self
    }

    /// Whether the user holds `right`, through its role or an explicit grant
    pub fn has_right(&self, right: UserRight) -> bool {
        let granted = |r: &UserRight| *r == UserRight::All || *r == right;
        self.role.rights().iter().any(granted) || self.rights.iter().any(granted)
    }
}

/// Authenticated (or anonymous) session of the acting user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    /// Session with nobody logged in
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    /// Session for `user`
    pub fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }

    /// Whether someone is logged in
    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// The logged-in user
    pub fn current_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(ModerationError::NotLoggedIn)
    }

    /// The logged-in user's account, the blocker in registry calls
    pub fn current_account(&self) -> Result<&Account> {
        self.current_user().map(|u| &u.account)
    }

    /// Whether the logged-in user holds `right` (false when anonymous)
    pub fn has_right(&self, right: UserRight) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_right(right))
    }
}
