//! Authorization policy
//!
//! Pure decision rules mapping `(session, target user, target account)` to
//! the moderation actions currently available. Each [`ModerationAction`]
//! carries its own predicate; [`compute_actions`] walks the action table and
//! keeps those whose predicate passes. The same predicate backs
//! [`authorize`], which the engine calls before issuing any request, so the
//! offered actions and the accepted actions never disagree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{ModerationError, Result};
use crate::identity::{Account, Session, User, UserRight};

/// Which entity an action operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionScope {
    /// Privileged action on a local user
    User,
    /// Self-service action on the viewer's relationship with an account
    Account,
}

/// Moderation action offered for an `(actor, target)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModerationAction {
    /// Open the user edit form
    EditUser,
    /// Remove the user
    DeleteUser,
    /// Ban the user
    BanUser,
    /// Lift the user's ban
    UnbanUser,
    /// Block the account
    BlockAccount,
    /// Unblock the account
    UnblockAccount,
    /// Block the account's origin server
    BlockServer,
    /// Unblock the account's origin server
    UnblockServer,
}

impl ModerationAction {
    /// Every action, in menu order
    pub const ALL: [ModerationAction; 8] = [
        ModerationAction::EditUser,
        ModerationAction::DeleteUser,
        ModerationAction::BanUser,
        ModerationAction::UnbanUser,
        ModerationAction::BlockAccount,
        ModerationAction::UnblockAccount,
        ModerationAction::BlockServer,
        ModerationAction::UnblockServer,
    ];

    /// Menu label
    pub fn label(&self) -> &'static str {
        match self {
            ModerationAction::EditUser => "Edit",
            ModerationAction::DeleteUser => "Delete",
            ModerationAction::BanUser => "Ban",
            ModerationAction::UnbanUser => "Unban",
            ModerationAction::BlockAccount => "Block this account",
            ModerationAction::UnblockAccount => "Unblock this account",
            ModerationAction::BlockServer => "Block the instance",
            ModerationAction::UnblockServer => "Unblock the instance",
        }
    }

    /// Entity the action operates on
    pub fn scope(&self) -> ActionScope {
        match self {
            ModerationAction::EditUser
            | ModerationAction::DeleteUser
            | ModerationAction::BanUser
            | ModerationAction::UnbanUser => ActionScope::User,
            _ => ActionScope::Account,
        }
    }

    /// Whether the caller must confirm before the action runs
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, ModerationAction::DeleteUser | ModerationAction::UnbanUser)
    }

    /// Visibility predicate for an already logged-in, non-self actor
    fn check(&self, session: &Session, user: Option<&User>, account: Option<&Account>) -> Result<()> {
        match self.scope() {
            ActionScope::User => {
                let user = user.ok_or_else(|| {
                    ModerationError::Forbidden("This account has no local user".to_string())
                })?;

                if !session.has_right(UserRight::ManageUsers) {
                    return Err(ModerationError::Forbidden(
                        "You are not allowed to manage users".to_string(),
                    ));
                }

                match self {
                    ModerationAction::BanUser if user.blocked => Err(ModerationError::Conflict(
                        format!("User {} is already banned", user.username),
                    )),
                    ModerationAction::UnbanUser if !user.blocked => Err(ModerationError::NotFound(
                        format!("User {} is not banned", user.username),
                    )),
                    _ => Ok(()),
                }
            }
            ActionScope::Account => {
                let account = account.ok_or_else(|| {
                    ModerationError::Forbidden("No target account".to_string())
                })?;

                match self {
                    ModerationAction::BlockAccount if account.blocked => Err(ModerationError::Conflict(
                        format!("Account {} is already blocked", account.name_with_host()),
                    )),
                    ModerationAction::UnblockAccount if !account.blocked => Err(ModerationError::NotFound(
                        format!("Account {} is not blocked", account.name_with_host()),
                    )),
                    ModerationAction::BlockServer | ModerationAction::UnblockServer
                        if account.is_local() =>
                    {
                        Err(ModerationError::Forbidden(
                            "Cannot block the server of a local account".to_string(),
                        ))
                    }
                    ModerationAction::BlockServer if account.server_blocked => Err(ModerationError::Conflict(
                        format!("Instance {} is already blocked", account.host),
                    )),
                    ModerationAction::UnblockServer if !account.server_blocked => Err(ModerationError::NotFound(
                        format!("Instance {} is not blocked", account.host),
                    )),
                    _ => Ok(()),
                }
            }
        }
    }
}

/// Set of available actions, iterated in menu order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet(BTreeSet<ModerationAction>);

impl ActionSet {
    /// Whether `action` is available
    pub fn contains(&self, action: ModerationAction) -> bool {
        self.0.contains(&action)
    }

    /// Whether nothing is available
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of available actions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Available actions in menu order
    pub fn iter(&self) -> impl Iterator<Item = ModerationAction> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ModerationAction> for ActionSet {
    fn from_iter<I: IntoIterator<Item = ModerationAction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Decide whether `action` is permitted right now
///
/// Rules, in order:
/// 1. nobody logged in: [`ModerationError::NotLoggedIn`];
/// 2. the target user is the actor: [`ModerationError::SelfTarget`];
/// 3. user actions need a target user and `ManageUsers`; ban/unban follow the
///    user's `blocked` flag;
/// 4. account actions follow `blocked`/`server_blocked`; server actions only
///    apply to accounts without a local user.
pub fn authorize(
    session: &Session,
    action: ModerationAction,
    target_user: Option<&User>,
    target_account: Option<&Account>,
) -> Result<()> {
    let actor = session.current_user()?;

    if target_user.is_some_and(|u| u.id == actor.id) {
        return Err(ModerationError::SelfTarget);
    }

    action.check(session, target_user, target_account)
}

/// Actions available to the session's user on the given target
pub fn compute_actions(
    session: &Session,
    target_user: Option<&User>,
    target_account: &Account,
) -> ActionSet {
    ModerationAction::ALL
        .iter()
        .copied()
        .filter(|action| authorize(session, *action, target_user, Some(target_account)).is_ok())
        .collect()
}

/// Route of the admin edit form for `user`
pub fn edit_user_link(user: &User) -> String {
    format!("/admin/users/update/{}", user.id)
}
