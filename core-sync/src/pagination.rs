//! Cursor-driven pagination
//!
//! [`PaginatedLister`] drains a paged result set through a caller-supplied
//! `fetch_page` closure, whatever the cursor looks like on the wire (a page
//! token, a full next-link URL, a record cursor).
//!
//! ```
//! use core_sync::pagination::{Page, PageRequest, PaginatedLister};
//!
//! # tokio_test_block_on(async {
//! let lister = PaginatedLister::new(2);
//! let items = lister
//!     .drain(
//!         |request: PageRequest| async move {
//!             Ok::<_, std::convert::Infallible>(match request.cursor.as_deref() {
//!                 None => Page::new(vec![1, 2], Some("p2".to_string())),
//!                 Some(_) => Page::last(vec![3]),
//!             })
//!         },
//!         10,
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(items, vec![1, 2, 3]);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::future::Future;
use tracing::{debug, warn};

/// What `fetch_page` is asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// `None` for the first page
    pub cursor: Option<String>,
    /// Never above the provider's page cap nor the items still needed
    pub page_size: usize,
}

/// One page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` once enumeration is complete
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// Final page
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Drains cursor-paginated result sets up to a finite limit.
///
/// The result preserves provider order and never holds more than
/// `max_items` elements. A provider that keeps answering with the cursor it
/// was just given is stopped after that page, with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginatedLister {
    page_cap: usize,
}

impl PaginatedLister {
    /// `page_cap` is the largest page the provider accepts
    pub fn new(page_cap: usize) -> Self {
        Self {
            page_cap: page_cap.max(1),
        }
    }

    pub fn page_cap(&self) -> usize {
        self.page_cap
    }

    /// Collect every item until the cursor runs out or `max_items` is reached.
    pub async fn drain<T, E, F, Fut>(&self, fetch_page: F, max_items: usize) -> Result<Vec<T>, E>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        self.drain_filtered(fetch_page, |_| true, max_items).await
    }

    /// Like [`drain`](Self::drain), keeping only items accepted by `keep`.
    ///
    /// Rejected items are dropped page by page and do not count toward
    /// `max_items`.
    pub async fn drain_filtered<T, E, F, Fut, P>(
        &self,
        mut fetch_page: F,
        mut keep: P,
        max_items: usize,
    ) -> Result<Vec<T>, E>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
        P: FnMut(&T) -> bool,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        while items.len() < max_items {
            let page_size = self.page_cap.min(max_items - items.len());
            pages += 1;
            debug!(
                page = pages,
                page_size,
                has_cursor = cursor.is_some(),
                "Fetching page"
            );

            let requested = cursor.clone();
            let page = fetch_page(PageRequest { cursor, page_size }).await?;

            let remaining = max_items - items.len();
            items.extend(
                page.items
                    .into_iter()
                    .filter(|item| keep(item))
                    .take(remaining),
            );

            cursor = match page.next_cursor.filter(|next| !next.is_empty()) {
                None => break,
                Some(next) if requested.as_deref() == Some(next.as_str()) => {
                    warn!(page = pages, "Provider returned a non-advancing cursor, stopping");
                    break;
                }
                Some(next) => Some(next),
            };
        }

        debug!(pages, items = items.len(), "Pagination finished");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[tokio::test]
    async fn test_zero_max_items_fetches_nothing() {
        let lister = PaginatedLister::new(10);
        let mut calls = 0;

        let items: Vec<u32> = lister
            .drain(
                |_| {
                    calls += 1;
                    async { Ok::<_, Infallible>(Page::last(vec![1])) }
                },
                0,
            )
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_error_is_propagated() {
        let lister = PaginatedLister::new(10);

        let result: Result<Vec<u32>, &str> = lister
            .drain(|_| async { Err::<Page<u32>, _>("boom") }, 5)
            .await;

        assert_eq!(result, Err("boom"));
    }

    #[tokio::test]
    async fn test_non_advancing_cursor_stops() {
        let lister = PaginatedLister::new(2);
        let mut calls = 0;

        let items = lister
            .drain(
                |_| {
                    calls += 1;
                    async { Ok::<_, Infallible>(Page::new(vec![7, 7], Some("same".to_string()))) }
                },
                1_000,
            )
            .await
            .unwrap();

        // First request has no cursor, second repeats "same" and is the last.
        assert_eq!(calls, 2);
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_cursor_ends_enumeration() {
        let lister = PaginatedLister::new(5);
        let items = lister
            .drain(
                |_| async { Ok::<_, Infallible>(Page::new(vec!["a"], Some(String::new()))) },
                10,
            )
            .await
            .unwrap();

        assert_eq!(items, vec!["a"]);
    }

    #[test]
    fn test_page_cap_is_at_least_one() {
        assert_eq!(PaginatedLister::new(0).page_cap(), 1);
    }
}
