//! Shared fixtures for the end-to-end tests

#![allow(dead_code)]

use fedi_moderation::moderation::{
    InMemoryBlockRegistry, InMemoryUserDirectory, ModerationEngine, Session, User, UserRole,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const HOST: &str = "videos.local";

/// Route engine logs to the test harness; `RUST_LOG=debug` shows them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn admin() -> User {
    User::new(1, "admin", UserRole::Administrator, HOST)
}

pub fn root() -> User {
    User::new(2, "root", UserRole::Administrator, HOST)
}

pub fn alice() -> User {
    User::new(3, "alice", UserRole::User, HOST)
}

pub fn carol() -> User {
    User::new(4, "carol", UserRole::User, HOST)
}

pub fn admin_session() -> Session {
    Session::authenticated(admin())
}

pub struct Platform {
    pub registry: Arc<InMemoryBlockRegistry>,
    pub users: Arc<InMemoryUserDirectory>,
    pub engine: ModerationEngine<InMemoryBlockRegistry, InMemoryUserDirectory>,
}

/// In-process platform with admin, root, alice and carol registered
pub async fn platform() -> Platform {
    init_tracing();

    let registry = Arc::new(InMemoryBlockRegistry::new());
    let users = Arc::new(InMemoryUserDirectory::new());
    for user in [admin(), root(), alice(), carol()] {
        users.register(user).await.expect("fixture users are unique");
    }

    let engine = ModerationEngine::new(Arc::clone(&registry), Arc::clone(&users));
    Platform {
        registry,
        users,
        engine,
    }
}
