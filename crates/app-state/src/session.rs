//! Logged-in user state
//!
//! [`SessionStore`] owns the current user and hands out immutable
//! [`Session`] snapshots. Subscribers are told whenever the user logs in,
//! logs out, or their record is replaced.

use moderation::{Session, User};
use parking_lot::RwLock;
use tokio::sync::watch;

/// Holder of the current session
pub struct SessionStore {
    user: RwLock<Option<User>>,
    changes: watch::Sender<Session>,
}

impl SessionStore {
    /// Create a store with nobody logged in
    pub fn new() -> Self {
        let (changes, _) = watch::channel(Session::anonymous());
        Self {
            user: RwLock::new(None),
            changes,
        }
    }

    /// Log `user` in, replacing any previous user
    pub fn login(&self, user: User) {
        tracing::info!(username = %user.username, "session started");
        *self.user.write() = Some(user);
        self.publish();
    }

    /// Log out
    pub fn logout(&self) {
        let previous = self.user.write().take();
        if let Some(user) = previous {
            tracing::info!(username = %user.username, "session ended");
            self.publish();
        }
    }

    /// Replace the current user's record (e.g. after a rights change)
    ///
    /// Ignored when nobody is logged in or `user` is someone else.
    pub fn refresh_user(&self, user: User) -> bool {
        let mut current = self.user.write();
        match current.as_ref() {
            Some(existing) if existing.id == user.id => {
                *current = Some(user);
                drop(current);
                self.publish();
                true
            }
            _ => false,
        }
    }

    /// Whether someone is logged in
    pub fn is_logged_in(&self) -> bool {
        self.user.read().is_some()
    }

    /// Current session snapshot
    pub fn snapshot(&self) -> Session {
        match self.user.read().as_ref() {
            Some(user) => Session::authenticated(user.clone()),
            None => Session::anonymous(),
        }
    }

    /// Subscribe to session changes
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.changes.subscribe()
    }

    fn publish(&self) {
        self.changes.send_replace(self.snapshot());
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
