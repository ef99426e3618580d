//! Moderation action engine
//!
//! The engine evaluates the policy, issues the matching registry or
//! user-management command, and flips local state only once the command is
//! acknowledged. A failed command leaves the target exactly as it was and
//! hands the error back unchanged; nothing is retried.
//!
//! Protected principals (root) are rejected before any request is issued.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::blocklist::BlockRegistry;
use crate::config::ModerationConfig;
use crate::error::{ModerationError, Result};
use crate::identity::{Account, Session, User};
use crate::policy::{authorize, compute_actions, edit_user_link, ActionSet, ModerationAction};
use crate::users::UserAdmin;

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What a moderation dropdown operates on: an account and, when the account
/// is local, its user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationTarget {
    /// Local user, if any
    pub user: Option<User>,
    /// Account
    pub account: Account,
}

impl ModerationTarget {
    /// Target a local user through its own account
    pub fn for_user(user: User) -> Self {
        Self {
            account: user.account.clone(),
            user: Some(user),
        }
    }

    /// Target an account with no local user in view
    pub fn for_account(account: Account) -> Self {
        Self { user: None, account }
    }

    fn set_account_blocked(&mut self, blocked: bool) {
        self.account.blocked = blocked;
        if let Some(user) = self.user.as_mut().filter(|u| u.account.id == self.account.id) {
            user.account.blocked = blocked;
        }
    }

    fn set_server_blocked(&mut self, server_blocked: bool) {
        self.account.server_blocked = server_blocked;
        if let Some(user) = self.user.as_mut().filter(|u| u.account.id == self.account.id) {
            user.account.server_blocked = server_blocked;
        }
    }

    fn require_user(&self) -> Result<&User> {
        self.user
            .as_ref()
            .ok_or_else(|| ModerationError::Forbidden("This account has no local user".to_string()))
    }
}

/// Caller's answer to a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Go ahead
    Confirmed,
    /// Abort without side effects
    Declined,
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Declined
        }
    }
}

/// State change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationEvent {
    /// The target user or account changed (ban, unban, block, unblock)
    UserChanged {
        /// `name@host` of the affected account
        name_with_host: String,
    },
    /// The target user was removed
    UserDeleted {
        /// Removed user's id
        user_id: u64,
        /// Removed user's username
        username: String,
    },
}

/// Result of an acknowledged moderation command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationOutcome {
    /// Action that ran
    pub action: ModerationAction,
    /// Emitted event
    pub event: ModerationEvent,
    /// Success notification text
    pub message: String,
}

/// Ticket proving the ban workflow was opened for a non-protected user
///
/// Only [`ModerationEngine::open_ban`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRequest {
    user_id: u64,
    username: String,
}

impl BanRequest {
    /// User the ban applies to
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Username the ban applies to
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// What a dispatched action resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Presentation should navigate to this route
    Navigate(String),
    /// Presentation should collect a ban reason, then call
    /// [`ModerationEngine::ban_user`]
    OpenBan(BanRequest),
    /// Command acknowledged
    Completed(ModerationOutcome),
    /// Caller declined the confirmation
    Cancelled,
}

impl From<Option<ModerationOutcome>> for Dispatch {
    fn from(outcome: Option<ModerationOutcome>) -> Self {
        outcome.map_or(Dispatch::Cancelled, Dispatch::Completed)
    }
}

/// Orchestrates moderation actions against the block registry and the user
/// store
pub struct ModerationEngine<R, U> {
    registry: Arc<R>,
    users: Arc<U>,
    config: ModerationConfig,
    events: broadcast::Sender<ModerationEvent>,
}

impl<R, U> ModerationEngine<R, U>
where
    R: BlockRegistry,
    U: UserAdmin,
{
    /// Create an engine with the default configuration
    pub fn new(registry: Arc<R>, users: Arc<U>) -> Self {
        Self::with_config(registry, users, ModerationConfig::default())
    }

    /// Create an engine with an explicit configuration
    pub fn with_config(registry: Arc<R>, users: Arc<U>, config: ModerationConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            users,
            config,
            events,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    /// Shared block registry
    pub fn registry(&self) -> Arc<R> {
        Arc::clone(&self.registry)
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<ModerationEvent> {
        self.events.subscribe()
    }

    /// Actions currently available on `target`
    pub fn available_actions(&self, session: &Session, target: &ModerationTarget) -> ActionSet {
        compute_actions(session, target.user.as_ref(), &target.account)
    }

    /// Reload the target's block flags from the registry
    ///
    /// Local accounts and accounts without a host have no server to look up.
    pub async fn refresh(&self, session: &Session, target: &mut ModerationTarget) -> Result<()> {
        let by = session.current_account()?;

        let blocked = self.registry.is_account_blocked(by, &target.account).await?;
        let server_blocked = if target.account.is_local() || target.account.host.trim().is_empty() {
            false
        } else {
            self.registry.is_server_blocked(by, &target.account.host).await?
        };

        target.set_account_blocked(blocked);
        target.set_server_blocked(server_blocked);
        Ok(())
    }

    /// Run `action` through the action table
    pub async fn dispatch(
        &self,
        session: &Session,
        target: &mut ModerationTarget,
        action: ModerationAction,
        confirmation: Confirmation,
    ) -> Result<Dispatch> {
        match action {
            ModerationAction::EditUser => {
                let user = target.require_user()?;
                authorize(session, action, Some(user), Some(&target.account))?;
                Ok(Dispatch::Navigate(edit_user_link(user)))
            }
            ModerationAction::DeleteUser => {
                self.remove_user(session, target, confirmation).await.map(Dispatch::from)
            }
            ModerationAction::BanUser => self.open_ban(session, target).map(Dispatch::OpenBan),
            ModerationAction::UnbanUser => {
                self.unban_user(session, target, confirmation).await.map(Dispatch::from)
            }
            ModerationAction::BlockAccount => {
                self.block_account(session, target).await.map(Dispatch::Completed)
            }
            ModerationAction::UnblockAccount => {
                self.unblock_account(session, target).await.map(Dispatch::Completed)
            }
            ModerationAction::BlockServer => {
                self.block_server(session, target).await.map(Dispatch::Completed)
            }
            ModerationAction::UnblockServer => {
                self.unblock_server(session, target).await.map(Dispatch::Completed)
            }
        }
    }

    // =========================================================================
    // User operations
    // =========================================================================

    /// Remove the target user
    ///
    /// Returns `Ok(None)` when the caller declined.
    pub async fn remove_user(
        &self,
        session: &Session,
        target: &ModerationTarget,
        confirmation: Confirmation,
    ) -> Result<Option<ModerationOutcome>> {
        let user = target.require_user()?;
        self.guard_protected(user, "delete")?;
        authorize(session, ModerationAction::DeleteUser, Some(user), Some(&target.account))?;

        if confirmation == Confirmation::Declined {
            return Ok(None);
        }

        tracing::debug!(user_id = user.id, username = %user.username, "removing user");
        if let Err(e) = self.users.delete_user(user).await {
            tracing::warn!(username = %user.username, error = %e, "user removal failed");
            return Err(e);
        }

        tracing::info!(username = %user.username, "user removed");
        let event = ModerationEvent::UserDeleted {
            user_id: user.id,
            username: user.username.clone(),
        };
        let message = format!("User {} deleted.", user.username);
        Ok(Some(self.emit(ModerationAction::DeleteUser, event, message)))
    }

    /// Open the ban workflow for the target user
    pub fn open_ban(&self, session: &Session, target: &ModerationTarget) -> Result<BanRequest> {
        let user = target.require_user()?;
        self.guard_protected(user, "ban")?;
        authorize(session, ModerationAction::BanUser, Some(user), Some(&target.account))?;

        Ok(BanRequest {
            user_id: user.id,
            username: user.username.clone(),
        })
    }

    /// Ban the target user with the reason collected for `request`
    pub async fn ban_user(
        &self,
        session: &Session,
        target: &mut ModerationTarget,
        request: BanRequest,
        reason: Option<String>,
    ) -> Result<ModerationOutcome> {
        let user = target.require_user()?;
        if user.id != request.user_id {
            return Err(ModerationError::InvalidInput(format!(
                "Ban was opened for {}, not {}",
                request.username, user.username
            )));
        }
        self.guard_protected(user, "ban")?;
        authorize(session, ModerationAction::BanUser, Some(user), Some(&target.account))?;

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        if let Some(r) = &reason {
            if r.chars().count() > self.config.max_ban_reason_length {
                return Err(ModerationError::InvalidInput(format!(
                    "Ban reason must be at most {} characters",
                    self.config.max_ban_reason_length
                )));
            }
        }

        tracing::debug!(user_id = user.id, username = %user.username, "banning user");
        if let Err(e) = self.users.ban_user(user, reason.clone()).await {
            tracing::warn!(username = %user.username, error = %e, "ban failed");
            return Err(e);
        }

        let username = user.username.clone();
        if let Some(user) = target.user.as_mut() {
            user.blocked = true;
            user.blocked_reason = reason;
        }

        tracing::info!(username = %username, "user banned");
        let event = ModerationEvent::UserChanged {
            name_with_host: target.account.name_with_host(),
        };
        Ok(self.emit(ModerationAction::BanUser, event, format!("User {} banned.", username)))
    }

    /// Lift the target user's ban
    ///
    /// Returns `Ok(None)` when the caller declined.
    pub async fn unban_user(
        &self,
        session: &Session,
        target: &mut ModerationTarget,
        confirmation: Confirmation,
    ) -> Result<Option<ModerationOutcome>> {
        let user = target.require_user()?;
        authorize(session, ModerationAction::UnbanUser, Some(user), Some(&target.account))?;

        if confirmation == Confirmation::Declined {
            return Ok(None);
        }

        tracing::debug!(user_id = user.id, username = %user.username, "unbanning user");
        if let Err(e) = self.users.unban_user(user).await {
            tracing::warn!(username = %user.username, error = %e, "unban failed");
            return Err(e);
        }

        let username = user.username.clone();
        if let Some(user) = target.user.as_mut() {
            user.blocked = false;
            user.blocked_reason = None;
        }

        tracing::info!(username = %username, "user unbanned");
        let event = ModerationEvent::UserChanged {
            name_with_host: target.account.name_with_host(),
        };
        let message = format!("User {} unbanned.", username);
        Ok(Some(self.emit(ModerationAction::UnbanUser, event, message)))
    }

    // =========================================================================
    // Block operations
    // =========================================================================

    /// Block the target account
    pub async fn block_account(
        &self,
        session: &Session,
        target: &mut ModerationTarget,
    ) -> Result<ModerationOutcome> {
        let action = ModerationAction::BlockAccount;
        authorize(session, action, target.user.as_ref(), Some(&target.account))?;
        let by = session.current_account()?;
        let name_with_host = target.account.name_with_host();

        tracing::debug!(account = %name_with_host, "blocking account");
        match self.registry.block_account(by, &target.account).await {
            Ok(_) => {}
            Err(ModerationError::Conflict(_)) => {
                tracing::warn!(account = %name_with_host, "account was already blocked, reconciling");
            }
            Err(e) => {
                tracing::warn!(account = %name_with_host, error = %e, "account block failed");
                return Err(e);
            }
        }

        target.set_account_blocked(true);
        tracing::info!(account = %name_with_host, "account blocked");
        let message = format!("Account {} blocked.", name_with_host);
        Ok(self.emit(action, ModerationEvent::UserChanged { name_with_host }, message))
    }

    /// Unblock the target account
    pub async fn unblock_account(
        &self,
        session: &Session,
        target: &mut ModerationTarget,
    ) -> Result<ModerationOutcome> {
        let action = ModerationAction::UnblockAccount;
        authorize(session, action, target.user.as_ref(), Some(&target.account))?;
        let by = session.current_account()?;
        let name_with_host = target.account.name_with_host();

        tracing::debug!(account = %name_with_host, "unblocking account");
        match self.registry.unblock_account(by, &target.account).await {
            Ok(()) => {}
            Err(ModerationError::NotFound(_)) => {
                tracing::warn!(account = %name_with_host, "account was not blocked, reconciling");
            }
            Err(e) => {
                tracing::warn!(account = %name_with_host, error = %e, "account unblock failed");
                return Err(e);
            }
        }

        target.set_account_blocked(false);
        tracing::info!(account = %name_with_host, "account unblocked");
        let message = format!("Account {} unblocked.", name_with_host);
        Ok(self.emit(action, ModerationEvent::UserChanged { name_with_host }, message))
    }

    /// Block the target account's server
    pub async fn block_server(
        &self,
        session: &Session,
        target: &mut ModerationTarget,
    ) -> Result<ModerationOutcome> {
        let action = ModerationAction::BlockServer;
        authorize(session, action, target.user.as_ref(), Some(&target.account))?;
        let by = session.current_account()?;
        let host = target.account.host.clone();

        tracing::debug!(host = %host, "blocking server");
        match self.registry.block_server(by, &host).await {
            Ok(_) => {}
            Err(ModerationError::Conflict(_)) => {
                tracing::warn!(host = %host, "server was already blocked, reconciling");
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "server block failed");
                return Err(e);
            }
        }

        target.set_server_blocked(true);
        tracing::info!(host = %host, "server blocked");
        let event = ModerationEvent::UserChanged {
            name_with_host: target.account.name_with_host(),
        };
        Ok(self.emit(action, event, format!("Instance {} blocked.", host)))
    }

    /// Unblock the target account's server
    pub async fn unblock_server(
        &self,
        session: &Session,
        target: &mut ModerationTarget,
    ) -> Result<ModerationOutcome> {
        let action = ModerationAction::UnblockServer;
        authorize(session, action, target.user.as_ref(), Some(&target.account))?;
        let by = session.current_account()?;
        let host = target.account.host.clone();

        tracing::debug!(host = %host, "unblocking server");
        match self.registry.unblock_server(by, &host).await {
            Ok(()) => {}
            Err(ModerationError::NotFound(_)) => {
                tracing::warn!(host = %host, "server was not blocked, reconciling");
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "server unblock failed");
                return Err(e);
            }
        }

        target.set_server_blocked(false);
        tracing::info!(host = %host, "server unblocked");
        let event = ModerationEvent::UserChanged {
            name_with_host: target.account.name_with_host(),
        };
        Ok(self.emit(action, event, format!("Instance {} unblocked.", host)))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn guard_protected(&self, user: &User, verb: &str) -> Result<()> {
        if self.config.is_protected(&user.username) {
            tracing::warn!(username = %user.username, verb, "refused action on protected user");
            return Err(ModerationError::ProtectedPrincipal(format!(
                "You cannot {} {}.",
                verb, user.username
            )));
        }
        Ok(())
    }

    fn emit(&self, action: ModerationAction, event: ModerationEvent, message: String) -> ModerationOutcome {
        // No subscribers is fine
        let _ = self.events.send(event.clone());
        ModerationOutcome {
            action,
            event,
            message,
        }
    }
}
