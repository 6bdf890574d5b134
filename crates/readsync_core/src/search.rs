//! Search session handlers.
//!
//! Every page request gets a fresh sequence number; a response carrying any
//! other number belongs to an abandoned request and is dropped on arrival.

use engine_logging::{engine_debug, engine_info};
use serde_json::Value;

use crate::effect::{Effect, RequestSeq};
use crate::normalize::normalize_listing;
use crate::paging::PageOutcome;
use crate::state::ScreenState;

impl ScreenState {
    pub(crate) fn change_query(&mut self, query: String) -> Vec<Effect> {
        let query = query.trim().to_string();
        self.search.estimator.reset();
        self.search.results.clear();
        self.search.settling = None;
        self.mark_dirty();
        if query.is_empty() {
            // Bump the sequence so anything still in flight is discarded.
            self.search.seq += 1;
            self.search.query = None;
            self.search.loading = false;
            return Vec::new();
        }
        self.search.query = Some(query);
        self.page_request(1, None)
    }

    pub(crate) fn request_page(&mut self, page: u32) -> Vec<Effect> {
        if self.search.query.is_none() {
            return Vec::new();
        }
        if !self.search.estimator.is_selectable(page) {
            engine_debug!("Page {} is outside the known range; ignoring", page);
            return Vec::new();
        }
        self.page_request(page, None)
    }

    fn page_request(&mut self, page: u32, settling: Option<u32>) -> Vec<Effect> {
        let Some(query) = self.search.query.clone() else {
            return Vec::new();
        };
        self.search.seq += 1;
        self.search.loading = true;
        self.search.settling = settling;
        self.mark_dirty();
        vec![Effect::FetchPage {
            seq: self.search.seq,
            query,
            page,
            page_size: self.search.estimator.page_size(),
        }]
    }

    pub(crate) fn page_loaded(&mut self, seq: RequestSeq, page: u32, body: &Value) -> Vec<Effect> {
        if seq != self.search.seq {
            engine_debug!(
                "Discarding page {} response (seq {}, latest {})",
                page,
                seq,
                self.search.seq
            );
            return Vec::new();
        }
        self.search.loading = false;
        self.mark_dirty();

        let listing = match normalize_listing(body) {
            Ok(listing) => listing,
            Err(err) => {
                self.surface_error(format!("Could not read search results: {err}"));
                return Vec::new();
            }
        };
        if let Some(reported) = listing.page.filter(|reported| *reported != page) {
            engine_debug!("Listing reported page {} for a request of page {}", reported, page);
        }
        let returned = listing.items.len();
        let estimator = &self.search.estimator;
        let authoritative = listing
            .total_pages
            .or_else(|| listing.total_results.map(|n| estimator.pages_for_results(n)));

        if let Some(total) = authoritative {
            self.search.estimator.adopt_authoritative(page, total);
            self.search.settling = None;
            if returned == 0 && page > total && total > 0 {
                return self.page_request(total, Some(total));
            }
            self.search.results = listing.items;
            return Vec::new();
        }

        if self.search.settling.take() == Some(page) {
            // Refetch after an overshoot: take the rows, leave the estimate alone.
            self.search.results = listing.items;
            return Vec::new();
        }

        match self.search.estimator.observe(page, returned) {
            PageOutcome::Settled => {
                self.search.results = listing.items;
                Vec::new()
            }
            PageOutcome::Overshot { refetch } => {
                engine_info!(
                    "Page {} was past the end; settling on page {}",
                    page,
                    refetch
                );
                self.page_request(refetch, Some(refetch))
            }
        }
    }

    pub(crate) fn page_failed(&mut self, seq: RequestSeq, message: &str) -> Vec<Effect> {
        if seq != self.search.seq {
            return Vec::new();
        }
        self.search.loading = false;
        self.search.settling = None;
        self.surface_error(format!("Search failed: {message}"));
        Vec::new()
    }
}
