//! Block registry
//!
//! This module defines the block relationship records, the listing query
//! parameters, and the [`BlockRegistry`] trait that owns them. Two scopes
//! exist side by side:
//!
//! - **Account blocks**: one `(byAccount, accountBlocked)` pair per record.
//! - **Server blocks**: one `(byAccount, blockedHost)` pair per record.
//!
//! [`InMemoryBlockRegistry`] is the authoritative in-process store; the REST
//! binding lives in [`crate::blocking`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

use crate::error::{ModerationError, Result};
use crate::identity::Account;

// =============================================================================
// Records
// =============================================================================

/// Account-level block relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBlock {
    /// Blocker
    pub by_account: Account,
    /// Blocked account
    pub account_blocked: Account,
    /// When the block was created
    pub created_at: DateTime<Utc>,
}

/// Server-level block relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerBlock {
    /// Blocker
    pub by_account: Account,
    /// Blocked domain
    pub blocked_host: String,
    /// When the block was created
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Listing parameters
// =============================================================================

/// Page window: `count` rows starting at zero-based offset `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page size, at least 1
    pub count: u32,
    /// Zero-based offset
    pub start: u64,
}

impl Pagination {
    /// Create a window; a zero `count` is raised to 1
    pub fn new(count: u32, start: u64) -> Self {
        Self {
            count: count.max(1),
            start,
        }
    }

    /// Window for the zero-based page `index` of `count` rows
    pub fn page(index: u64, count: u32) -> Self {
        let count = count.max(1);
        Self {
            count,
            start: index.saturating_mul(u64::from(count)),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PAGE_SIZE, 0)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending (+1)
    Ascending,
    /// Descending (-1)
    Descending,
}

/// Ordering of a listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    /// Sortable attribute name (e.g. "createdAt")
    pub field: String,
    /// Direction
    pub order: SortOrder,
}

impl Sort {
    /// Create a sort
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Query-string form: `field` or `-field`
    pub fn to_query(&self) -> String {
        match self.order {
            SortOrder::Ascending => self.field.clone(),
            SortOrder::Descending => format!("-{}", self.field),
        }
    }
}

/// One page of results plus the total number of matching records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Records in this window, in listing order
    pub data: Vec<T>,
    /// Total matching records
    pub total: u64,
}

impl<T> Page<T> {
    /// Page with no records
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// Registry trait
// =============================================================================

/// Authoritative store of block relationships
///
/// Mutations fail with [`ModerationError::Conflict`] when the record already
/// exists and [`ModerationError::NotFound`] when it does not.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlockRegistry: Send + Sync {
    /// Create an account block
    async fn block_account(&self, by_account: &Account, target: &Account) -> Result<AccountBlock>;

    /// Delete an account block
    async fn unblock_account(&self, by_account: &Account, target: &Account) -> Result<()>;

    /// Create a server block
    async fn block_server(&self, by_account: &Account, host: &str) -> Result<ServerBlock>;

    /// Delete a server block
    async fn unblock_server(&self, by_account: &Account, host: &str) -> Result<()>;

    /// Whether `by_account` blocks `target`
    async fn is_account_blocked(&self, by_account: &Account, target: &Account) -> Result<bool>;

    /// Whether `by_account` blocks `host`
    async fn is_server_blocked(&self, by_account: &Account, host: &str) -> Result<bool>;

    /// List `by_account`'s account blocks
    async fn list_account_blocks(
        &self,
        by_account: &Account,
        pagination: &Pagination,
        sort: &Sort,
    ) -> Result<Page<AccountBlock>>;

    /// List `by_account`'s server blocks
    async fn list_server_blocks(
        &self,
        by_account: &Account,
        pagination: &Pagination,
        sort: &Sort,
    ) -> Result<Page<ServerBlock>>;
}

// =============================================================================
// In-memory registry
// =============================================================================

#[derive(Debug, Clone)]
struct Entry<T> {
    id: u64,
    record: T,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    last_created_at: Option<DateTime<Utc>>,
    account_blocks: Vec<Entry<AccountBlock>>,
    server_blocks: Vec<Entry<ServerBlock>>,
}

impl RegistryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Creation timestamps strictly increase within one registry
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_created_at {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_created_at = Some(ts);
        ts
    }
}

/// In-process authoritative block registry
#[derive(Debug, Default)]
pub struct InMemoryBlockRegistry {
    state: RwLock<RegistryState>,
    requests: AtomicUsize,
}

impl InMemoryBlockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    fn count_request(&self) {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn normalize_host(host: &str) -> Result<String> {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return Err(ModerationError::InvalidInput("Host cannot be empty".to_string()));
    }
    Ok(host)
}

fn compare_account_blocks(field: &str, a: &AccountBlock, b: &AccountBlock) -> Ordering {
    match field {
        "accountBlocked" | "name" => a.account_blocked.name_with_host().cmp(&b.account_blocked.name_with_host()),
        _ => a.created_at.cmp(&b.created_at),
    }
}

fn compare_server_blocks(field: &str, a: &ServerBlock, b: &ServerBlock) -> Ordering {
    match field {
        "blockedHost" | "host" => a.blocked_host.cmp(&b.blocked_host),
        _ => a.created_at.cmp(&b.created_at),
    }
}

/// Sort by the requested field, ties by id ascending, then cut the window
fn paginate<T: Clone>(
    mut entries: Vec<&Entry<T>>,
    pagination: &Pagination,
    sort: &Sort,
    compare: fn(&str, &T, &T) -> Ordering,
) -> Page<T> {
    entries.sort_by(|a, b| {
        let ordering = compare(&sort.field, &a.record, &b.record);
        let ordering = match sort.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };
        ordering.then(a.id.cmp(&b.id))
    });

    let total = entries.len() as u64;
    let start = usize::try_from(pagination.start).unwrap_or(usize::MAX);
    let data = entries
        .into_iter()
        .skip(start)
        .take(pagination.count as usize)
        .map(|e| e.record.clone())
        .collect();

    Page { data, total }
}

#[async_trait]
impl BlockRegistry for InMemoryBlockRegistry {
    async fn block_account(&self, by_account: &Account, target: &Account) -> Result<AccountBlock> {
        self.count_request();

        if by_account.id == target.id {
            return Err(ModerationError::SelfTarget);
        }

        let mut state = self.state.write().await;

        let exists = state
            .account_blocks
            .iter()
            .any(|e| e.record.by_account.id == by_account.id && e.record.account_blocked.id == target.id);
        if exists {
            return Err(ModerationError::Conflict(format!(
                "Account {} is already blocked",
                target.name_with_host()
            )));
        }

        let mut account_blocked = target.clone();
        account_blocked.blocked = true;

        let record = AccountBlock {
            by_account: by_account.clone(),
            account_blocked,
            created_at: state.next_timestamp(),
        };
        let id = state.next_id();
        state.account_blocks.push(Entry { id, record: record.clone() });

        tracing::debug!(by = %by_account.name_with_host(), account = %target.name_with_host(), "account block created");
        Ok(record)
    }

    async fn unblock_account(&self, by_account: &Account, target: &Account) -> Result<()> {
        self.count_request();

        let mut state = self.state.write().await;
        let before = state.account_blocks.len();
        state
            .account_blocks
            .retain(|e| !(e.record.by_account.id == by_account.id && e.record.account_blocked.id == target.id));

        if state.account_blocks.len() == before {
            return Err(ModerationError::NotFound(format!(
                "Account {} is not blocked",
                target.name_with_host()
            )));
        }

        tracing::debug!(by = %by_account.name_with_host(), account = %target.name_with_host(), "account block deleted");
        Ok(())
    }

    async fn block_server(&self, by_account: &Account, host: &str) -> Result<ServerBlock> {
        self.count_request();
        let host = normalize_host(host)?;

        let mut state = self.state.write().await;

        let exists = state
            .server_blocks
            .iter()
            .any(|e| e.record.by_account.id == by_account.id && e.record.blocked_host == host);
        if exists {
            return Err(ModerationError::Conflict(format!("Instance {} is already blocked", host)));
        }

        let record = ServerBlock {
            by_account: by_account.clone(),
            blocked_host: host,
            created_at: state.next_timestamp(),
        };
        let id = state.next_id();
        state.server_blocks.push(Entry { id, record: record.clone() });

        tracing::debug!(by = %by_account.name_with_host(), host = %record.blocked_host, "server block created");
        Ok(record)
    }

    async fn unblock_server(&self, by_account: &Account, host: &str) -> Result<()> {
        self.count_request();
        let host = normalize_host(host)?;

        let mut state = self.state.write().await;
        let before = state.server_blocks.len();
        state
            .server_blocks
            .retain(|e| !(e.record.by_account.id == by_account.id && e.record.blocked_host == host));

        if state.server_blocks.len() == before {
            return Err(ModerationError::NotFound(format!("Instance {} is not blocked", host)));
        }

        tracing::debug!(by = %by_account.name_with_host(), host = %host, "server block deleted");
        Ok(())
    }

    async fn is_account_blocked(&self, by_account: &Account, target: &Account) -> Result<bool> {
        self.count_request();
        let state = self.state.read().await;
        Ok(state
            .account_blocks
            .iter()
            .any(|e| e.record.by_account.id == by_account.id && e.record.account_blocked.id == target.id))
    }

    async fn is_server_blocked(&self, by_account: &Account, host: &str) -> Result<bool> {
        self.count_request();
        let host = normalize_host(host)?;
        let state = self.state.read().await;
        Ok(state
            .server_blocks
            .iter()
            .any(|e| e.record.by_account.id == by_account.id && e.record.blocked_host == host))
    }

    async fn list_account_blocks(
        &self,
        by_account: &Account,
        pagination: &Pagination,
        sort: &Sort,
    ) -> Result<Page<AccountBlock>> {
        self.count_request();
        let state = self.state.read().await;
        let entries = state
            .account_blocks
            .iter()
            .filter(|e| e.record.by_account.id == by_account.id)
            .collect();
        Ok(paginate(entries, pagination, sort, compare_account_blocks))
    }

    async fn list_server_blocks(
        &self,
        by_account: &Account,
        pagination: &Pagination,
        sort: &Sort,
    ) -> Result<Page<ServerBlock>> {
        self.count_request();
        let state = self.state.read().await;
        let entries = state
            .server_blocks
            .iter()
            .filter(|e| e.record.by_account.id == by_account.id)
            .collect();
        Ok(paginate(entries, pagination, sort, compare_server_blocks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> Account {
        Account::local(1, "alice", "local.test", 1)
    }

    fn remote(id: u64, name: &str) -> Account {
        Account::remote(id, name, "remote.example")
    }

    fn newest_first() -> Sort {
        Sort::new("createdAt", SortOrder::Descending)
    }

    #[tokio::test]
    async fn test_block_and_unblock_account() {
        let registry = InMemoryBlockRegistry::new();
        let target = remote(10, "bob");

        let record = registry.block_account(&me(), &target).await.unwrap();
        assert_eq!(record.account_blocked.id, 10);
        assert!(record.account_blocked.blocked);
        assert!(registry.is_account_blocked(&me(), &target).await.unwrap());

        registry.unblock_account(&me(), &target).await.unwrap();
        assert!(!registry.is_account_blocked(&me(), &target).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_account_block_conflicts() {
        let registry = InMemoryBlockRegistry::new();
        let target = remote(10, "bob");

        registry.block_account(&me(), &target).await.unwrap();
        let err = registry.block_account(&me(), &target).await.unwrap_err();
        assert!(matches!(err, ModerationError::Conflict(_)));

        let page = registry
            .list_account_blocks(&me(), &Pagination::default(), &newest_first())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_unblock_missing_account_not_found() {
        let registry = InMemoryBlockRegistry::new();
        let err = registry.unblock_account(&me(), &remote(10, "bob")).await.unwrap_err();
        assert!(matches!(err, ModerationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_self_block_rejected() {
        let registry = InMemoryBlockRegistry::new();
        let err = registry.block_account(&me(), &me()).await.unwrap_err();
        assert_eq!(err, ModerationError::SelfTarget);
    }

    #[tokio::test]
    async fn test_blocks_are_per_blocker() {
        let registry = InMemoryBlockRegistry::new();
        let other = Account::local(2, "carol", "local.test", 2);
        let target = remote(10, "bob");

        registry.block_account(&me(), &target).await.unwrap();
        assert!(!registry.is_account_blocked(&other, &target).await.unwrap());

        // Same target, different blocker: no conflict
        registry.block_account(&other, &target).await.unwrap();
    }

    #[tokio::test]
    async fn test_server_block_host_normalized() {
        let registry = InMemoryBlockRegistry::new();

        let record = registry.block_server(&me(), "Spam.Example").await.unwrap();
        assert_eq!(record.blocked_host, "spam.example");
        assert!(registry.is_server_blocked(&me(), "spam.example").await.unwrap());

        let err = registry.block_server(&me(), "spam.example").await.unwrap_err();
        assert!(matches!(err, ModerationError::Conflict(_)));

        registry.unblock_server(&me(), "SPAM.example").await.unwrap();
        let err = registry.unblock_server(&me(), "spam.example").await.unwrap_err();
        assert!(matches!(err, ModerationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_host_rejected() {
        let registry = InMemoryBlockRegistry::new();
        let err = registry.block_server(&me(), "  ").await.unwrap_err();
        assert!(matches!(err, ModerationError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let registry = InMemoryBlockRegistry::new();
        for (id, name) in [(10, "first"), (11, "second"), (12, "third")] {
            registry.block_account(&me(), &remote(id, name)).await.unwrap();
        }

        let page = registry
            .list_account_blocks(&me(), &Pagination::new(10, 0), &newest_first())
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        let names: Vec<_> = page.data.iter().map(|b| b.account_blocked.name.as_str()).collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_list_pagination_window() {
        let registry = InMemoryBlockRegistry::new();
        for id in 10..15 {
            registry.block_account(&me(), &remote(id, &format!("user{}", id))).await.unwrap();
        }

        let sort = Sort::new("createdAt", SortOrder::Ascending);
        let page = registry
            .list_account_blocks(&me(), &Pagination::new(2, 2), &sort)
            .await
            .unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].account_blocked.id, 12);
        assert_eq!(page.data[1].account_blocked.id, 13);
    }

    #[tokio::test]
    async fn test_list_out_of_range_start() {
        let registry = InMemoryBlockRegistry::new();
        registry.block_account(&me(), &remote(10, "bob")).await.unwrap();

        let page = registry
            .list_account_blocks(&me(), &Pagination::new(10, 50), &newest_first())
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert!(page.data.is_empty());
    }

    #[tokio::test]
    async fn test_list_empty() {
        let registry = InMemoryBlockRegistry::new();
        let page = registry
            .list_server_blocks(&me(), &Pagination::default(), &newest_first())
            .await
            .unwrap();
        assert_eq!(page, Page::empty());
    }

    #[tokio::test]
    async fn test_list_by_name() {
        let registry = InMemoryBlockRegistry::new();
        registry.block_account(&me(), &remote(10, "zed")).await.unwrap();
        registry.block_account(&me(), &remote(11, "amy")).await.unwrap();

        let sort = Sort::new("accountBlocked", SortOrder::Ascending);
        let page = registry
            .list_account_blocks(&me(), &Pagination::default(), &sort)
            .await
            .unwrap();
        assert_eq!(page.data[0].account_blocked.name, "amy");
        assert_eq!(page.data[1].account_blocked.name, "zed");
    }

    #[tokio::test]
    async fn test_request_count() {
        let registry = InMemoryBlockRegistry::new();
        assert_eq!(registry.request_count(), 0);
        registry.block_server(&me(), "spam.example").await.unwrap();
        let _ = registry.is_server_blocked(&me(), "spam.example").await;
        assert_eq!(registry.request_count(), 2);
    }

    #[test]
    fn test_sort_query_form() {
        assert_eq!(Sort::new("createdAt", SortOrder::Descending).to_query(), "-createdAt");
        assert_eq!(Sort::new("createdAt", SortOrder::Ascending).to_query(), "createdAt");
    }

    #[test]
    fn test_pagination() {
        assert_eq!(Pagination::new(0, 5), Pagination { count: 1, start: 5 });
        assert_eq!(Pagination::page(2, 10), Pagination { count: 10, start: 20 });
        assert_eq!(Pagination::default(), Pagination { count: 10, start: 0 });
    }

    #[test]
    fn test_account_block_json_shape() {
        let json = r#"{
            "byAccount": {"id": 1, "name": "alice", "host": "local.test", "userId": 1},
            "accountBlocked": {"id": 10, "name": "bob", "host": "remote.example"},
            "createdAt": "2024-03-01T12:00:00Z"
        }"#;

        let block: AccountBlock = serde_json::from_str(json).unwrap();
        assert_eq!(block.by_account.name, "alice");
        assert_eq!(block.account_blocked.name_with_host(), "bob@remote.example");
        assert_eq!(block.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }
}
