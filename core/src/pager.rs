//! Sizing and sequential page reads over one range.

use crate::Result;
use crate::range::Range;
use crate::record::Record;
use crate::store::DocumentStore;
use crate::store::RecordFilter;

/// Upstream batch repair accepts at most this many coordinates.
pub const MAX_PAGE_SIZE: u64 = 500;
pub const DEFAULT_PAGE_SIZE: u64 = MAX_PAGE_SIZE;

/// Advisory processing cost used for the completion estimate.
pub const MINUTES_PER_PAGE: f64 = 2.5;
pub const CONCURRENCY: f64 = 1.0;

/// Pages needed to cover the records left after `initial_skip`.
pub fn page_count(missing: u64, initial_skip: u64, page_size: u64) -> u64 {
    missing
        .saturating_sub(initial_skip)
        .div_ceil(page_size.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionEstimate {
    pub hours: f64,
    pub days: f64,
}

impl CompletionEstimate {
    pub fn for_pages(pages: u64) -> Self {
        let minutes = pages as f64 * MINUTES_PER_PAGE / CONCURRENCY;
        let hours = minutes / 60.0;
        Self {
            hours,
            days: hours / 24.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlan {
    /// Every record in the window.
    pub total_documents: u64,
    /// Records in the window without a declared value.
    pub missing_documents: u64,
    pub pages: u64,
    pub estimate: CompletionEstimate,
}

impl PagePlan {
    pub fn missing_percent(&self) -> f64 {
        crate::stats::percent(self.missing_documents, self.total_documents)
    }
}

/// Counts the range population and the missing subset and sizes the page walk.
/// A range with nothing missing plans zero pages.
pub async fn plan(
    store: &dyn DocumentStore,
    range: &Range,
    page_size: u64,
    initial_skip: u64,
) -> Result<PagePlan> {
    let total_documents = store.count(&range.filter_all()).await?;
    let missing_documents = store.count(&range.filter_missing()).await?;
    tracing::info!(
        range = %range.label,
        total_documents,
        missing_documents,
        "counted documents"
    );

    if missing_documents == 0 {
        tracing::warn!(range = %range.label, "no documents are missing a declared value");
        return Ok(PagePlan {
            total_documents,
            missing_documents,
            pages: 0,
            estimate: CompletionEstimate::for_pages(0),
        });
    }

    let pages = page_count(missing_documents, initial_skip, page_size);
    let estimate = CompletionEstimate::for_pages(pages);
    tracing::info!(
        range = %range.label,
        pages,
        "estimated completion in {:.2} hours ({:.2} days)",
        estimate.hours,
        estimate.days
    );
    Ok(PagePlan {
        total_documents,
        missing_documents,
        pages,
        estimate,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Zero-based page index within this run.
    pub number: u64,
    pub skip: u64,
    pub records: Vec<Record>,
}

/// Walks pages with `skip = page * page_size + initial_skip`.
///
/// The walk ends at the first empty page, or after the first page in
/// single-pass mode.
#[derive(Debug, Clone)]
pub struct PageCursor {
    filter: RecordFilter,
    page_size: u64,
    initial_skip: u64,
    single_pass: bool,
    page: u64,
    done: bool,
}

impl PageCursor {
    pub fn new(filter: RecordFilter, page_size: u64, initial_skip: u64) -> Self {
        Self {
            filter,
            page_size: page_size.max(1),
            initial_skip,
            single_pass: false,
            page: 0,
            done: false,
        }
    }

    pub fn single_pass(mut self) -> Self {
        self.single_pass = true;
        self
    }

    pub fn next_skip(&self) -> u64 {
        self.page * self.page_size + self.initial_skip
    }

    pub async fn next_page(&mut self, store: &dyn DocumentStore) -> Result<Option<Page>> {
        if self.done {
            return Ok(None);
        }
        let skip = self.next_skip();
        let records = store.find_page(&self.filter, skip, self.page_size).await?;
        if records.is_empty() {
            self.done = true;
            return Ok(None);
        }
        let page = Page {
            number: self.page,
            skip,
            records,
        };
        self.page += 1;
        self.done = self.single_pass;
        Ok(Some(page))
    }
}
