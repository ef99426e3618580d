//! Paginated view of the user's own account blocklist
//!
//! Every load takes a [`RequestTicket`] carrying a sequence number. A
//! response is applied only if its ticket is newer than the one last
//! applied, so a slow response for an old page or sort never overwrites a
//! newer one.

use moderation::{
    AccountBlock, BlockRegistry, BlocklistListing, ModerationConfig, ModerationError, Page,
    Pagination, Session, Sort,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Identifies one listing request and the query it was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    /// Sequence number, strictly increasing per view
    pub seq: u64,
    /// Requested window
    pub pagination: Pagination,
    /// Requested order
    pub sort: Sort,
}

/// What the view currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocklistSnapshot {
    /// Window of the applied response
    pub pagination: Pagination,
    /// Order of the applied response
    pub sort: Sort,
    /// Rows
    pub records: Vec<AccountBlock>,
    /// Total rows across all pages
    pub total: u64,
    /// Error of the last applied request, if it failed
    pub last_error: Option<ModerationError>,
}

#[derive(Debug)]
struct ViewState {
    /// Query the next load will use
    pagination: Pagination,
    sort: Sort,
    shown: BlocklistSnapshot,
    /// Last ticket issued
    issued_seq: u64,
    applied_seq: u64,
}

/// Blocklist table state
pub struct BlocklistView<R> {
    listing: BlocklistListing<R>,
    state: Mutex<ViewState>,
}

impl<R: BlockRegistry> BlocklistView<R> {
    /// Create a view using the default page size and newest-first order
    pub fn new(registry: Arc<R>) -> Self {
        Self::with_config(registry, ModerationConfig::default())
    }

    /// Create a view with an explicit configuration
    pub fn with_config(registry: Arc<R>, config: ModerationConfig) -> Self {
        let listing = BlocklistListing::with_config(registry, config);
        let (pagination, sort) = listing.default_query();

        let shown = BlocklistSnapshot {
            pagination,
            sort: sort.clone(),
            records: Vec::new(),
            total: 0,
            last_error: None,
        };

        Self {
            listing,
            state: Mutex::new(ViewState {
                pagination,
                sort,
                shown,
                issued_seq: 0,
                applied_seq: 0,
            }),
        }
    }

    /// Move to the zero-based page `index`, keeping the page size
    pub fn set_page(&self, index: u64) {
        let mut state = self.state.lock();
        state.pagination = Pagination::page(index, state.pagination.count);
    }

    /// Change the order and go back to the first page
    pub fn set_sort(&self, sort: Sort) {
        let mut state = self.state.lock();
        state.pagination = Pagination::new(state.pagination.count, 0);
        state.sort = sort;
    }

    /// Issue a ticket for the current query
    ///
    /// The number and the query are taken under one lock, so a higher
    /// number never carries an older query.
    pub fn begin_request(&self) -> RequestTicket {
        let mut state = self.state.lock();
        state.issued_seq += 1;
        RequestTicket {
            seq: state.issued_seq,
            pagination: state.pagination,
            sort: state.sort.clone(),
        }
    }

    /// Apply a response; returns `false` if a newer one was already applied
    pub fn apply(&self, ticket: &RequestTicket, result: Result<Page<AccountBlock>, ModerationError>) -> bool {
        let mut state = self.state.lock();

        if ticket.seq <= state.applied_seq {
            tracing::warn!(
                seq = ticket.seq,
                applied = state.applied_seq,
                "discarding stale blocklist response"
            );
            return false;
        }
        state.applied_seq = ticket.seq;

        match result {
            Ok(page) => {
                state.shown = BlocklistSnapshot {
                    pagination: ticket.pagination,
                    sort: ticket.sort.clone(),
                    records: page.data,
                    total: page.total,
                    last_error: None,
                };
            }
            Err(e) => {
                // Keep the rows on screen, surface the error
                state.shown.last_error = Some(e);
            }
        }
        true
    }

    /// Fetch the current query and apply the response
    ///
    /// Returns `Ok(false)` when the response arrived after a newer one.
    pub async fn load(&self, session: &Session) -> Result<bool, ModerationError> {
        let ticket = self.begin_request();
        let result = self
            .listing
            .get_own_blocklist(session, &ticket.pagination, &ticket.sort)
            .await;

        match result {
            Ok(page) => Ok(self.apply(&ticket, Ok(page))),
            Err(e) => {
                self.apply(&ticket, Err(e.clone()));
                Err(e)
            }
        }
    }

    /// What the view currently shows
    pub fn snapshot(&self) -> BlocklistSnapshot {
        self.state.lock().shown.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use moderation::{Account, InMemoryBlockRegistry, SortOrder, User, UserRole};

    fn alice() -> User {
        User::new(1, "alice", UserRole::User, "local.test")
    }

    fn block(id: u64, name: &str) -> AccountBlock {
        AccountBlock {
            by_account: alice().account,
            account_blocked: Account::remote(id, name, "remote.example"),
            created_at: Utc::now(),
        }
    }

    fn page(names: &[&str], total: u64) -> Page<AccountBlock> {
        Page {
            data: names.iter().enumerate().map(|(i, n)| block(10 + i as u64, n)).collect(),
            total,
        }
    }

    fn view() -> BlocklistView<InMemoryBlockRegistry> {
        BlocklistView::new(Arc::new(InMemoryBlockRegistry::new()))
    }

    #[test]
    fn test_defaults() {
        let snapshot = view().snapshot();
        assert_eq!(snapshot.pagination, Pagination::new(10, 0));
        assert_eq!(snapshot.sort, Sort::new("createdAt", SortOrder::Descending));
        assert!(snapshot.records.is_empty());
    }

    #[test]
    fn test_late_response_discarded() {
        let view = view();
        let first = view.begin_request();
        view.set_page(1);
        let second = view.begin_request();

        assert!(view.apply(&second, Ok(page(&["newer"], 11))));
        assert!(!view.apply(&first, Ok(page(&["older"], 11))));

        let snapshot = view.snapshot();
        assert_eq!(snapshot.pagination, Pagination::page(1, 10));
        assert_eq!(snapshot.records[0].account_blocked.name, "newer");
    }

    #[test]
    fn test_tickets_follow_query_order() {
        let owned = view();
        let view = &owned;

        std::thread::scope(|scope| {
            scope.spawn(move || {
                for index in 1..=200 {
                    view.set_page(index);
                }
            });

            let workers: Vec<_> = (0..4)
                .map(|_| scope.spawn(move || (0..100).map(|_| view.begin_request()).collect::<Vec<_>>()))
                .collect();

            let mut tickets: Vec<RequestTicket> = workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect();
            tickets.sort_by_key(|t| t.seq);

            let seqs: Vec<u64> = tickets.iter().map(|t| t.seq).collect();
            assert_eq!(seqs, (1..=400).collect::<Vec<u64>>());
            assert!(tickets
                .windows(2)
                .all(|pair| pair[0].pagination.start <= pair[1].pagination.start));
        });
    }

    #[test]
    fn test_error_keeps_rows() {
        let view = view();
        let ok = view.begin_request();
        view.apply(&ok, Ok(page(&["bob"], 1)));

        let failing = view.begin_request();
        assert!(view.apply(&failing, Err(ModerationError::Transport("timeout".to_string()))));

        let snapshot = view.snapshot();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.last_error, Some(ModerationError::Transport("timeout".to_string())));
    }

    #[test]
    fn test_set_sort_resets_page() {
        let view = view();
        view.set_page(3);
        view.set_sort(Sort::new("accountBlocked", SortOrder::Ascending));

        let ticket = view.begin_request();
        assert_eq!(ticket.pagination, Pagination::new(10, 0));
        assert_eq!(ticket.sort.to_query(), "accountBlocked");
    }

    #[tokio::test]
    async fn test_load_from_registry() {
        let registry = Arc::new(InMemoryBlockRegistry::new());
        for id in 0..3 {
            registry
                .block_account(&alice().account, &Account::remote(100 + id, format!("user{}", id), "remote.example"))
                .await
                .unwrap();
        }

        let view = BlocklistView::new(registry);
        assert!(view.load(&Session::authenticated(alice())).await.unwrap());

        let snapshot = view.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.records[0].account_blocked.name, "user2");
    }

    #[tokio::test]
    async fn test_load_anonymous() {
        let view = view();
        let err = view.load(&Session::anonymous()).await.unwrap_err();
        assert_eq!(err, ModerationError::NotLoggedIn);
        assert_eq!(view.snapshot().last_error, Some(ModerationError::NotLoggedIn));
    }
}
