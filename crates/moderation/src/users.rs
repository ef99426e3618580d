//! User administration commands
//!
//! [`UserAdmin`] is the command surface of the external identity store:
//! delete, ban and unban a local user. [`RestUserService`] issues them
//! against the REST API; [`InMemoryUserDirectory`] keeps them in process.

use api_client::rest::resource_path;
use api_client::{ApiClient, ApiRequest};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ModerationError, Result};
use crate::identity::User;

/// Users resource
const USERS_PATH: &str = "/users";

/// User-management commands
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserAdmin: Send + Sync {
    /// Delete a user for good
    async fn delete_user(&self, user: &User) -> Result<()>;

    /// Ban a user, with an optional reason
    async fn ban_user(&self, user: &User, reason: Option<String>) -> Result<()>;

    /// Lift a ban
    async fn unban_user(&self, user: &User) -> Result<()>;
}

// =============================================================================
// REST binding
// =============================================================================

#[derive(Debug, Serialize)]
struct BanBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// User administration over the REST API
///
/// - `DELETE /users/{id}`
/// - `POST   /users/{id}/ban` with `{"reason": ...}`
/// - `POST   /users/{id}/unban`
pub struct RestUserService {
    client: Arc<RwLock<ApiClient>>,
}

impl RestUserService {
    /// Create a new user service
    pub fn new(client: ApiClient) -> Self {
        Self { client: Arc::new(RwLock::new(client)) }
    }

    /// Create a new user service with a shared client
    pub fn with_shared_client(client: Arc<RwLock<ApiClient>>) -> Self {
        Self { client }
    }

    fn user_path(user: &User) -> String {
        resource_path(USERS_PATH, &user.id.to_string())
    }

    async fn execute(&self, request: ApiRequest) -> Result<()> {
        let client = self.client.read().await;
        client.execute(request).await?;
        Ok(())
    }
}

#[async_trait]
impl UserAdmin for RestUserService {
    async fn delete_user(&self, user: &User) -> Result<()> {
        self.execute(ApiRequest::delete(Self::user_path(user))).await
    }

    async fn ban_user(&self, user: &User, reason: Option<String>) -> Result<()> {
        let request = ApiRequest::post(format!("{}/ban", Self::user_path(user)))
            .json_body(&BanBody { reason })?;
        self.execute(request).await
    }

    async fn unban_user(&self, user: &User) -> Result<()> {
        self.execute(ApiRequest::post(format!("{}/unban", Self::user_path(user))))
            .await
    }
}

// =============================================================================
// In-memory directory
// =============================================================================

#[derive(Debug, Default)]
struct DirectoryState {
    users: BTreeMap<u64, User>,
    /// Usernames ever registered; a removed username is never reused
    taken_usernames: BTreeSet<String>,
}

/// In-process user store
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    state: RwLock<DirectoryState>,
    requests: AtomicUsize,
}

impl InMemoryUserDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user
    ///
    /// Fails with [`ModerationError::Conflict`] if the id or the username was
    /// ever used, including by a since-removed user.
    pub async fn register(&self, user: User) -> Result<()> {
        let mut state = self.state.write().await;

        if state.users.contains_key(&user.id) || state.taken_usernames.contains(&user.username) {
            return Err(ModerationError::Conflict(format!(
                "Username {} is not available",
                user.username
            )));
        }

        state.taken_usernames.insert(user.username.clone());
        state.users.insert(user.id, user);
        Ok(())
    }

    /// Current record of a user
    pub async fn get(&self, id: u64) -> Option<User> {
        self.state.read().await.users.get(&id).cloned()
    }

    /// Number of commands served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    async fn update<F>(&self, user: &User, apply: F) -> Result<()>
    where
        F: FnOnce(&mut User) -> Result<()> + Send,
    {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| ModerationError::NotFound(format!("User {} not found", user.username)))?;
        apply(stored)
    }
}

#[async_trait]
impl UserAdmin for InMemoryUserDirectory {
    async fn delete_user(&self, user: &User) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;
        state
            .users
            .remove(&user.id)
            .map(|_| ())
            .ok_or_else(|| ModerationError::NotFound(format!("User {} not found", user.username)))
    }

    async fn ban_user(&self, user: &User, reason: Option<String>) -> Result<()> {
        self.update(user, move |stored| {
            if stored.blocked {
                return Err(ModerationError::Conflict(format!("User {} is already banned", stored.username)));
            }
            stored.blocked = true;
            stored.blocked_reason = reason;
            Ok(())
        })
        .await
    }

    async fn unban_user(&self, user: &User) -> Result<()> {
        self.update(user, |stored| {
            if !stored.blocked {
                return Err(ModerationError::NotFound(format!("User {} is not banned", stored.username)));
            }
            stored.blocked = false;
            stored.blocked_reason = None;
            Ok(())
        })
        .await
    }
}
