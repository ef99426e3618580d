//! Caller-scoped blocklist listing

use std::sync::Arc;

use crate::blocklist::{AccountBlock, BlockRegistry, Page, Pagination, ServerBlock, Sort};
use crate::config::ModerationConfig;
use crate::error::Result;
use crate::identity::Session;

/// Reads the session user's own blocklists
pub struct BlocklistListing<R> {
    registry: Arc<R>,
    config: ModerationConfig,
}

impl<R: BlockRegistry> BlocklistListing<R> {
    /// Create a listing over `registry` with the default configuration
    pub fn new(registry: Arc<R>) -> Self {
        Self::with_config(registry, ModerationConfig::default())
    }

    /// Create a listing with an explicit configuration
    pub fn with_config(registry: Arc<R>, config: ModerationConfig) -> Self {
        Self { registry, config }
    }

    /// First page with the configured size and sort
    pub fn default_query(&self) -> (Pagination, Sort) {
        (Pagination::new(self.config.page_size, 0), self.config.default_sort.clone())
    }

    /// One page of the accounts the session user blocks
    ///
    /// `total` counts every block the user holds, not just this page.
    pub async fn get_own_blocklist(
        &self,
        session: &Session,
        pagination: &Pagination,
        sort: &Sort,
    ) -> Result<Page<AccountBlock>> {
        let by = session.current_account()?;
        tracing::debug!(
            by = %by.name_with_host(),
            start = pagination.start,
            count = pagination.count,
            sort = %sort.to_query(),
            "listing account blocklist"
        );
        self.registry.list_account_blocks(by, pagination, sort).await
    }

    /// One page of the servers the session user blocks
    pub async fn get_own_server_blocklist(
        &self,
        session: &Session,
        pagination: &Pagination,
        sort: &Sort,
    ) -> Result<Page<ServerBlock>> {
        let by = session.current_account()?;
        tracing::debug!(
            by = %by.name_with_host(),
            start = pagination.start,
            count = pagination.count,
            "listing server blocklist"
        );
        self.registry.list_server_blocks(by, pagination, sort).await
    }
}
