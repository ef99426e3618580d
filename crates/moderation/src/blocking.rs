//! Blocklist REST binding
//!
//! This module talks to the blocklist endpoints of the API:
//!
//! - `GET    /blocklist/accounts?start&count&sort` lists account blocks
//! - `POST   /blocklist/accounts/{nameWithHost}` creates one (204)
//! - `DELETE /blocklist/accounts/{nameWithHost}` removes one (204, 404 if absent)
//! - the same three under `/blocklist/servers/{host}` for server blocks
//!
//! The endpoints are scoped to the authenticated caller, so the `by_account`
//! argument of [`BlockRegistry`] only shapes the records returned locally.
//!
//! # Example
//!
//! ```rust,no_run
//! use api_client::{ApiClient, ApiClientConfig};
//! use moderation::blocking::RestBlocklistService;
//! use moderation::blocklist::BlockRegistry;
//! use moderation::identity::Account;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(ApiClientConfig::new("https://peertube.example/api/v1"))?;
//!     let service = RestBlocklistService::new(client);
//!
//!     let me = Account::local(1, "alice", "peertube.example", 1);
//!     service.block_server(&me, "spam.example").await?;
//!
//!     Ok(())
//! }
//! ```

use api_client::rest::resource_path;
use api_client::{ApiClient, ApiRequest};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::blocklist::{
    AccountBlock, BlockRegistry, Page, Pagination, ServerBlock, Sort, SortOrder,
};
use crate::error::Result;
use crate::identity::Account;

/// Account blocklist resource
const ACCOUNTS_PATH: &str = "/blocklist/accounts";

/// Server blocklist resource
const SERVERS_PATH: &str = "/blocklist/servers";

/// Page size used when scanning the whole blocklist
const SCAN_PAGE_SIZE: u32 = 100;

/// Maximum pages to fetch when scanning the whole blocklist
const MAX_PAGES: u64 = 10;

/// Blocklist service backed by the REST API
pub struct RestBlocklistService {
    /// REST client
    client: Arc<RwLock<ApiClient>>,
}

impl RestBlocklistService {
    /// Create a new blocklist service
    pub fn new(client: ApiClient) -> Self {
        Self { client: Arc::new(RwLock::new(client)) }
    }

    /// Create a new blocklist service with a shared client
    pub fn with_shared_client(client: Arc<RwLock<ApiClient>>) -> Self {
        Self { client }
    }

    async fn execute(&self, request: ApiRequest) -> Result<()> {
        let client = self.client.read().await;
        client.execute(request).await?;
        Ok(())
    }

    async fn list<T>(&self, path: &str, pagination: &Pagination, sort: &Sort) -> Result<Page<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let request = ApiRequest::get(path)
            .param("start", pagination.start.to_string())
            .param("count", pagination.count.to_string())
            .param("sort", sort.to_query());

        let client = self.client.read().await;
        let response = client.send_json::<Page<T>>(request).await?;
        Ok(response.data)
    }

    /// Walk the caller's blocklist pages until `found` matches (up to `MAX_PAGES`)
    async fn scan<T, F>(&self, path: &str, found: F) -> Result<bool>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let sort = Sort::new("createdAt", SortOrder::Descending);

        for index in 0..MAX_PAGES {
            let pagination = Pagination::page(index, SCAN_PAGE_SIZE);
            let page = self.list::<T>(path, &pagination, &sort).await?;

            if page.data.iter().any(&found) {
                return Ok(true);
            }

            let seen = pagination.start + page.data.len() as u64;
            if page.data.is_empty() || seen >= page.total {
                break;
            }
        }

        Ok(false)
    }
}

#[async_trait]
impl BlockRegistry for RestBlocklistService {
    async fn block_account(&self, by_account: &Account, target: &Account) -> Result<AccountBlock> {
        let name_with_host = target.name_with_host();
        self.execute(ApiRequest::post(resource_path(ACCOUNTS_PATH, &name_with_host)))
            .await?;

        let mut account_blocked = target.clone();
        account_blocked.blocked = true;

        Ok(AccountBlock {
            by_account: by_account.clone(),
            account_blocked,
            created_at: Utc::now(),
        })
    }

    async fn unblock_account(&self, _by_account: &Account, target: &Account) -> Result<()> {
        let name_with_host = target.name_with_host();
        self.execute(ApiRequest::delete(resource_path(ACCOUNTS_PATH, &name_with_host)))
            .await
    }

    async fn block_server(&self, by_account: &Account, host: &str) -> Result<ServerBlock> {
        self.execute(ApiRequest::post(resource_path(SERVERS_PATH, host)))
            .await?;

        Ok(ServerBlock {
            by_account: by_account.clone(),
            blocked_host: host.to_string(),
            created_at: Utc::now(),
        })
    }

    async fn unblock_server(&self, _by_account: &Account, host: &str) -> Result<()> {
        self.execute(ApiRequest::delete(resource_path(SERVERS_PATH, host)))
            .await
    }

    async fn is_account_blocked(&self, _by_account: &Account, target: &Account) -> Result<bool> {
        let name_with_host = target.name_with_host();
        self.scan::<AccountBlock, _>(ACCOUNTS_PATH, |b| {
            b.account_blocked.name_with_host() == name_with_host
        })
        .await
    }

    async fn is_server_blocked(&self, _by_account: &Account, host: &str) -> Result<bool> {
        self.scan::<ServerBlock, _>(SERVERS_PATH, |b| b.blocked_host.eq_ignore_ascii_case(host))
            .await
    }

    async fn list_account_blocks(
        &self,
        _by_account: &Account,
        pagination: &Pagination,
        sort: &Sort,
    ) -> Result<Page<AccountBlock>> {
        self.list(ACCOUNTS_PATH, pagination, sort).await
    }

    async fn list_server_blocks(
        &self,
        _by_account: &Account,
        pagination: &Pagination,
        sort: &Sort,
    ) -> Result<Page<ServerBlock>> {
        self.list(SERVERS_PATH, pagination, sort).await
    }
}
