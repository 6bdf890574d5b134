//! Page-count estimation for listings that may not report a total.

use std::ops::RangeInclusive;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Guess used after a full first page.
const SEED_TOTAL_PAGES: u32 = 5;
/// Pages added whenever the guess is about to run out.
const EXTEND_BY: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEstimate {
    pub page: u32,
    pub page_size: u32,
    pub certain: bool,
    pub total_pages: u32,
}

impl PageEstimate {
    pub fn initial(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size,
            certain: false,
            total_pages: 1,
        }
    }
}

/// What the coordinator has to do after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// The fetched page is current.
    Settled,
    /// The fetched page was past the end; fetch `refetch` and adopt it instead.
    Overshot { refetch: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEstimator {
    estimate: PageEstimate,
}

impl Default for PageEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PageEstimator {
    pub fn new(page_size: u32) -> Self {
        Self {
            estimate: PageEstimate::initial(page_size.max(1)),
        }
    }

    pub fn estimate(&self) -> PageEstimate {
        self.estimate
    }

    pub fn page_size(&self) -> u32 {
        self.estimate.page_size
    }

    /// Back to `{page: 1, certain: false, total_pages: 1}`; query or filters changed.
    pub fn reset(&mut self) {
        self.estimate = PageEstimate::initial(self.estimate.page_size);
    }

    /// Feed the item count returned for `page`.
    pub fn observe(&mut self, page: u32, returned: usize) -> PageOutcome {
        let page = page.max(1);
        let size = self.estimate.page_size as usize;
        let est = &mut self.estimate;

        if page == 1 {
            est.page = 1;
            match returned {
                0 => {
                    est.certain = true;
                    est.total_pages = 0;
                }
                n if n < size => {
                    est.certain = true;
                    est.total_pages = 1;
                }
                _ => {
                    est.certain = false;
                    est.total_pages = SEED_TOTAL_PAGES;
                }
            }
            return PageOutcome::Settled;
        }

        match returned {
            0 => {
                let last = page - 1;
                est.page = last;
                est.certain = true;
                est.total_pages = last;
                PageOutcome::Overshot { refetch: last }
            }
            n if n < size => {
                est.page = page;
                est.certain = true;
                est.total_pages = page;
                PageOutcome::Settled
            }
            _ => {
                est.page = page;
                if page >= est.total_pages.saturating_sub(1) {
                    // Never below the page just seen full.
                    est.total_pages = est.total_pages.saturating_add(EXTEND_BY).max(page);
                    est.certain = false;
                }
                PageOutcome::Settled
            }
        }
    }

    /// The backend reported its own totals; take them as given.
    pub fn adopt_authoritative(&mut self, page: u32, total_pages: u32) {
        self.estimate.page = page.max(1).min(total_pages.max(1));
        self.estimate.total_pages = total_pages;
        self.estimate.certain = true;
    }

    pub fn pages_for_results(&self, total_results: u64) -> u32 {
        let size = u64::from(self.estimate.page_size);
        u32::try_from(total_results.div_ceil(size)).unwrap_or(u32::MAX)
    }

    /// "Page N" while the bound is a guess, "Page N of M" once it is known.
    pub fn display_label(&self) -> String {
        let est = self.estimate;
        if est.certain {
            format!("Page {} of {}", est.page, est.total_pages)
        } else {
            format!("Page {}", est.page)
        }
    }

    /// Page numbers the UI may offer and the coordinator will fetch.
    ///
    /// While the bound is a guess, one page past it stays reachable so an
    /// overshoot can be discovered.
    pub fn selectable_pages(&self) -> RangeInclusive<u32> {
        let est = self.estimate;
        if est.certain {
            1..=est.total_pages
        } else {
            1..=est.total_pages.max(est.page).saturating_add(1)
        }
    }

    pub fn can_go_next(&self) -> bool {
        let est = self.estimate;
        !est.certain || est.page < est.total_pages
    }

    pub fn can_go_previous(&self) -> bool {
        self.estimate.page > 1
    }

    pub fn is_selectable(&self, page: u32) -> bool {
        self.selectable_pages().contains(&page)
    }
}
