// File: src/session.rs
//! Pagination driver for one results screen.
//!
//! [`SearchSession`] is the synchronous state machine: it hands out a
//! [`LoadTicket`] when a fetch should start and accepts or discards the page
//! when it arrives. [`SearchController`] runs the fetches through a
//! [`RideFetcher`].

use crate::client::RideFetcher;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::filter::{SearchFilters, active_filter_count};
use crate::model::{PagedResponse, Ride, SearchParams};
use crate::store::{RideStore, should_load_more};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    LoadingFirstPage,
    Ready,
    LoadingMore,
    Exhausted,
    /// First page failed. Only a retry leaves this state.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    page: u32,
    first: bool,
}

impl LoadTicket {
    pub fn page(&self) -> u32 {
        self.page
    }
}

/// What the results list should show.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResults {
    Loading,
    Failed(String),
    /// The API returned nothing for this search.
    NoRides,
    /// Rides were fetched but the filters hide all of them; offer a reset.
    NoMatchingRides,
    Rides(Vec<Ride>),
}

#[derive(Debug, Default)]
pub struct SearchSession {
    params: SearchParams,
    filters: SearchFilters,
    store: RideStore,
    phase: Phase,
    next_page: u32,
    total_elements: u64,
    generation: u64,
    closed: bool,
    load_more_error: Option<String>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    pub fn store(&self) -> &RideStore {
        &self.store
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    /// Last non-fatal error from a "load more" request.
    pub fn load_more_error(&self) -> Option<&str> {
        self.load_more_error.as_deref()
    }

    /// Starts (or restarts) the search. Any fetch still in flight becomes stale.
    pub fn begin_initial_load(&mut self, params: SearchParams) -> Option<LoadTicket> {
        if self.closed {
            return None;
        }
        self.params = params;
        self.store.clear();
        self.next_page = 0;
        self.total_elements = 0;
        self.load_more_error = None;
        self.generation += 1;
        self.phase = Phase::LoadingFirstPage;
        log::debug!("Search started (generation {})", self.generation);
        Some(LoadTicket {
            generation: self.generation,
            page: 0,
            first: true,
        })
    }

    pub fn retry(&mut self) -> Option<LoadTicket> {
        let params = self.params.clone();
        self.begin_initial_load(params)
    }

    /// Ticket for the next page, or `None` while loading, exhausted, failed or closed.
    pub fn begin_load_more(&mut self) -> Option<LoadTicket> {
        if self.closed || self.phase != Phase::Ready {
            return None;
        }
        self.phase = Phase::LoadingMore;
        Some(LoadTicket {
            generation: self.generation,
            page: self.next_page,
            first: false,
        })
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        !self.closed && ticket.generation == self.generation
    }

    /// Applies a fetched page. Returns false when the page was discarded.
    pub fn complete(&mut self, ticket: LoadTicket, page: PagedResponse<Ride>) -> bool {
        if !self.is_current(&ticket) {
            log::debug!("Dropping stale page {} (generation {})", ticket.page, ticket.generation);
            return false;
        }

        let last = page.is_last_page();
        self.total_elements = page.total_elements;
        if ticket.first {
            self.store.replace(page.content);
        } else {
            self.store.append(page.content);
        }
        self.load_more_error = None;

        if last {
            self.phase = Phase::Exhausted;
        } else {
            self.next_page = page.number.max(ticket.page) + 1;
            self.phase = Phase::Ready;
        }
        true
    }

    /// Records a failed fetch. Already loaded rides are kept.
    pub fn fail(&mut self, ticket: LoadTicket, message: String) -> bool {
        if !self.is_current(&ticket) {
            return false;
        }
        log::warn!("Search page {} failed: {}", ticket.page, message);
        if ticket.first {
            self.phase = Phase::Error(message);
        } else {
            self.load_more_error = Some(message);
            self.phase = Phase::Ready;
        }
        true
    }

    /// Screen teardown: every later result is ignored.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn update_filters(&mut self, filters: SearchFilters) {
        self.filters = filters;
    }

    pub fn reset_filters(&mut self) {
        self.filters = SearchFilters::default();
    }

    pub fn active_filter_count(&self) -> usize {
        active_filter_count(&self.filters)
    }

    /// Scroll hook. True when the caller should start a "load more" fetch now.
    pub fn on_scroll(&self, last_visible_index: usize, total_items_count: usize) -> bool {
        !self.closed
            && self.phase == Phase::Ready
            && should_load_more(last_visible_index, total_items_count)
    }

    pub fn visible_rides(&self) -> Vec<Ride> {
        self.store.view(&self.filters)
    }

    pub fn results(&self) -> SearchResults {
        match &self.phase {
            Phase::Idle | Phase::LoadingFirstPage => SearchResults::Loading,
            Phase::Error(message) => SearchResults::Failed(message.clone()),
            Phase::Ready | Phase::LoadingMore | Phase::Exhausted => {
                if self.store.is_empty() {
                    return SearchResults::NoRides;
                }
                let rides = self.visible_rides();
                if rides.is_empty() {
                    SearchResults::NoMatchingRides
                } else {
                    SearchResults::Rides(rides)
                }
            }
        }
    }
}

/// Runs a [`SearchSession`] against a [`RideFetcher`].
pub struct SearchController<F> {
    fetcher: F,
    page_size: u32,
    session: SearchSession,
}

impl<F: RideFetcher> SearchController<F> {
    pub fn new(fetcher: F, page_size: u32) -> Self {
        Self {
            fetcher,
            page_size: if page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
            session: SearchSession::new(),
        }
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    pub async fn load_initial(&mut self, params: SearchParams) -> SearchResults {
        if let Some(ticket) = self.session.begin_initial_load(params) {
            self.run(ticket).await;
        }
        self.session.results()
    }

    pub async fn retry(&mut self) -> SearchResults {
        if let Some(ticket) = self.session.retry() {
            self.run(ticket).await;
        }
        self.session.results()
    }

    /// Fetches the next page if the session allows it. Returns whether a page was applied.
    pub async fn load_more(&mut self) -> bool {
        match self.session.begin_load_more() {
            Some(ticket) => self.run(ticket).await,
            None => false,
        }
    }

    /// Scroll hook that fetches when the prefetch trigger fires.
    pub async fn on_scroll(&mut self, last_visible_index: usize, total_items_count: usize) -> bool {
        if self.session.on_scroll(last_visible_index, total_items_count) {
            self.load_more().await
        } else {
            false
        }
    }

    async fn run(&mut self, ticket: LoadTicket) -> bool {
        let params = self.session.params().clone();
        match self
            .fetcher
            .search_rides(&params, ticket.page(), self.page_size)
            .await
        {
            Ok(page) => self.session.complete(ticket, page),
            Err(e) => {
                self.session.fail(ticket, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SortBy;

    fn ride(id: &str, price: f64) -> Ride {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "departureTime": "2025-05-02T09:00:00",
            "pricePerSeat": price,
            "availableSeats": 2
        }))
        .unwrap()
    }

    fn page(ids: &[&str], number: u32, total_pages: u32) -> PagedResponse<Ride> {
        PagedResponse {
            content: ids.iter().map(|id| ride(id, 10.0)).collect(),
            total_elements: 40,
            total_pages,
            size: 20,
            number,
        }
    }

    #[test]
    fn test_first_page_then_more_then_exhausted() {
        let mut s = SearchSession::new();
        assert_eq!(s.results(), SearchResults::Loading);

        let t0 = s.begin_initial_load(SearchParams::default()).unwrap();
        assert_eq!(s.phase(), &Phase::LoadingFirstPage);
        assert!(s.begin_load_more().is_none());
        assert!(s.complete(t0, page(&["a", "b"], 0, 2)));
        assert_eq!(s.phase(), &Phase::Ready);

        let t1 = s.begin_load_more().unwrap();
        assert_eq!(t1.page(), 1);
        assert_eq!(s.phase(), &Phase::LoadingMore);
        // Guard against a second concurrent request
        assert!(s.begin_load_more().is_none());
        assert!(!s.on_scroll(1, 2));

        assert!(s.complete(t1, page(&["b", "c"], 1, 2)));
        assert_eq!(s.phase(), &Phase::Exhausted);
        assert_eq!(s.store().len(), 3);
        assert!(s.begin_load_more().is_none());
        assert!(!s.on_scroll(2, 3));
    }

    #[test]
    fn test_first_page_failure_and_retry() {
        let mut s = SearchSession::new();
        let t0 = s.begin_initial_load(SearchParams::default()).unwrap();
        assert!(s.fail(t0, "HTTP 500".into()));
        assert_eq!(s.results(), SearchResults::Failed("HTTP 500".into()));
        assert!(s.begin_load_more().is_none());

        let t1 = s.retry().unwrap();
        assert_eq!(s.phase(), &Phase::LoadingFirstPage);
        assert!(s.complete(t1, page(&["a"], 0, 1)));
        assert_eq!(s.phase(), &Phase::Exhausted);
    }

    #[test]
    fn test_load_more_failure_keeps_rides() {
        let mut s = SearchSession::new();
        let t0 = s.begin_initial_load(SearchParams::default()).unwrap();
        s.complete(t0, page(&["a", "b"], 0, 3));
        let t1 = s.begin_load_more().unwrap();
        assert!(s.fail(t1, "timeout".into()));
        assert_eq!(s.phase(), &Phase::Ready);
        assert_eq!(s.load_more_error(), Some("timeout"));
        assert_eq!(s.store().len(), 2);

        let again = s.begin_load_more().unwrap();
        assert_eq!(again.page(), 1);
    }

    #[test]
    fn test_stale_and_closed_results_are_dropped() {
        let mut s = SearchSession::new();
        let old = s.begin_initial_load(SearchParams::default()).unwrap();
        let fresh = s.retry().unwrap();
        assert!(!s.complete(old, page(&["stale"], 0, 1)));
        assert_eq!(s.phase(), &Phase::LoadingFirstPage);
        assert!(!s.fail(old, "late".into()));

        s.close();
        assert!(!s.complete(fresh, page(&["a"], 0, 1)));
        assert!(s.store().is_empty());
        assert!(s.begin_initial_load(SearchParams::default()).is_none());
    }

    #[test]
    fn test_empty_states_are_distinct() {
        let mut s = SearchSession::new();
        let t0 = s.begin_initial_load(SearchParams::default()).unwrap();
        s.complete(t0, page(&[], 0, 0));
        assert_eq!(s.results(), SearchResults::NoRides);

        let t1 = s.retry().unwrap();
        s.complete(t1, page(&["a"], 0, 1));
        s.update_filters(SearchFilters {
            max_price: Some(1.0),
            ..Default::default()
        });
        assert_eq!(s.results(), SearchResults::NoMatchingRides);
        assert_eq!(s.active_filter_count(), 1);

        s.reset_filters();
        assert!(matches!(s.results(), SearchResults::Rides(r) if r.len() == 1));
    }

    #[test]
    fn test_filters_rerun_without_fetching() {
        let mut s = SearchSession::new();
        let t0 = s.begin_initial_load(SearchParams::default()).unwrap();
        let mut p = page(&[], 0, 1);
        p.content = vec![ride("x", 40.0), ride("y", 15.0)];
        s.complete(t0, p);

        s.update_filters(SearchFilters {
            sort_by: Some(SortBy::PriceAsc),
            ..Default::default()
        });
        let ids: Vec<String> = s.visible_rides().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["y", "x"]);
        assert_eq!(s.phase(), &Phase::Exhausted);
    }

    struct FakeFetcher {
        pages: Vec<Result<PagedResponse<Ride>, String>>,
    }

    impl RideFetcher for std::sync::Mutex<FakeFetcher> {
        fn search_rides(
            &self,
            _params: &SearchParams,
            page: u32,
            _size: u32,
        ) -> impl std::future::Future<Output = Result<PagedResponse<Ride>, String>> + Send {
            let result = self
                .lock()
                .map(|mut f| {
                    if f.pages.is_empty() {
                        Err(format!("no page {}", page))
                    } else {
                        f.pages.remove(0)
                    }
                })
                .unwrap_or_else(|_| Err("poisoned".to_string()));
            async move { result }
        }
    }

    #[tokio::test]
    async fn test_controller_drives_pages() {
        let fetcher = std::sync::Mutex::new(FakeFetcher {
            pages: vec![
                Ok(page(&["a", "b", "c"], 0, 2)),
                Ok(page(&["d"], 1, 2)),
            ],
        });
        let mut controller = SearchController::new(fetcher, 0);

        let results = controller.load_initial(SearchParams::default()).await;
        assert!(matches!(results, SearchResults::Rides(ref r) if r.len() == 3));

        assert!(!controller.on_scroll(0, 3).await);
        assert!(controller.on_scroll(1, 3).await);
        assert_eq!(controller.session().store().len(), 4);
        assert_eq!(controller.session().phase(), &Phase::Exhausted);
        assert!(!controller.load_more().await);
    }

    #[tokio::test]
    async fn test_controller_error_then_retry() {
        let fetcher = std::sync::Mutex::new(FakeFetcher {
            pages: vec![Err("HTTP 503: down".into()), Ok(page(&["a"], 0, 1))],
        });
        let mut controller = SearchController::new(fetcher, 20);

        let failed = controller.load_initial(SearchParams::default()).await;
        assert_eq!(failed, SearchResults::Failed("HTTP 503: down".into()));

        let ok = controller.retry().await;
        assert!(matches!(ok, SearchResults::Rides(ref r) if r.len() == 1));
    }
}
