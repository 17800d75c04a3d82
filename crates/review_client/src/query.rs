//! Search, tag filter and pagination state behind the summary list.

use shared::domain::{PatientId, SearchField};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Single filter sent with a list request. Never more than one per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListFilter {
    pub field: SearchField,
    pub term: String,
}

/// Parameters of one `GET /summaries` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListRequest {
    pub page: u32,
    pub per_page: u32,
    pub filter: Option<ListFilter>,
}

impl ListRequest {
    pub fn for_patient(patient_id: &PatientId, per_page: u32) -> Self {
        Self {
            page: 1,
            per_page,
            filter: Some(ListFilter {
                field: SearchField::PatientId,
                term: patient_id.as_str().to_string(),
            }),
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ];
        if let Some(filter) = &self.filter {
            pairs.push((filter.field.as_param(), filter.term.clone()));
        }
        pairs
    }
}

/// What a controller mutation did, so the caller knows whether to refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryChange {
    Unchanged,
    PageChanged,
    FilterReset,
}

impl QueryChange {
    pub fn needs_fetch(self) -> bool {
        self != Self::Unchanged
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    field: SearchField,
    term: String,
    clicked_tag: Option<String>,
    page: u32,
    page_size: u32,
    total: Option<TrustedTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TrustedTotal {
    filter: Option<ListFilter>,
    value: u64,
}

impl QueryState {
    pub fn new(page_size: u32) -> Self {
        Self {
            field: SearchField::Keyword,
            term: String::new(),
            clicked_tag: None,
            page: 1,
            page_size: page_size.max(1),
            total: None,
        }
    }

    pub fn field(&self) -> SearchField {
        self.field
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The clicked tag, but only while the field/term still reflect the click.
    pub fn active_tag(&self) -> Option<&str> {
        self.clicked_tag
            .as_deref()
            .filter(|tag| self.field == SearchField::Keyword && self.term == *tag)
    }

    pub fn filter(&self) -> Option<ListFilter> {
        let term = self.term.trim();
        (!term.is_empty()).then(|| ListFilter {
            field: self.field,
            term: term.to_string(),
        })
    }

    /// Total matching records, trusted only if it was produced for the current filter.
    pub fn total(&self) -> Option<u64> {
        let current = self.filter();
        self.total
            .as_ref()
            .filter(|total| total.filter == current)
            .map(|total| total.value)
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total().unwrap_or(0), self.page_size)
    }

    pub fn request(&self) -> ListRequest {
        ListRequest {
            page: self.page,
            per_page: self.page_size,
            filter: self.filter(),
        }
    }
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let pages = total.div_ceil(u64::from(page_size.max(1))).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Default)]
pub struct QueryController {
    state: QueryState,
}

impl QueryController {
    pub fn new(page_size: u32) -> Self {
        Self {
            state: QueryState::new(page_size),
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn request(&self) -> ListRequest {
        self.state.request()
    }

    pub fn set_search_field(&mut self, field: SearchField) -> QueryChange {
        let before = self.state.filter();
        self.state.field = field;
        self.reset_page(before)
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) -> QueryChange {
        let before = self.state.filter();
        self.state.term = term.into();
        self.reset_page(before)
    }

    /// Clamps into `[1, total_pages]`.
    pub fn set_page(&mut self, page: u32) -> QueryChange {
        let page = page.clamp(1, self.state.total_pages());
        if page == self.state.page {
            return QueryChange::Unchanged;
        }
        self.state.page = page;
        QueryChange::PageChanged
    }

    pub fn first_page(&mut self) -> QueryChange {
        self.set_page(1)
    }

    pub fn previous_page(&mut self) -> QueryChange {
        self.set_page(self.state.page.saturating_sub(1))
    }

    pub fn next_page(&mut self) -> QueryChange {
        self.set_page(self.state.page.saturating_add(1))
    }

    pub fn last_page(&mut self) -> QueryChange {
        self.set_page(self.state.total_pages())
    }

    /// Re-clicking the tag that is already active does nothing.
    pub fn click_tag(&mut self, keyword: &str) -> QueryChange {
        if keyword.trim().is_empty() || self.state.active_tag() == Some(keyword) {
            return QueryChange::Unchanged;
        }
        let before = self.state.filter();
        self.state.field = SearchField::Keyword;
        self.state.term = keyword.to_string();
        self.state.clicked_tag = Some(keyword.to_string());
        self.reset_page(before)
    }

    pub fn clear_filter(&mut self) -> QueryChange {
        let before = self.state.filter();
        self.state.field = SearchField::Keyword;
        self.state.term.clear();
        self.state.clicked_tag = None;
        self.reset_page(before)
    }

    /// Records the total reported for `request`. Ignored when the request's
    /// filter no longer matches the current one.
    pub fn accept_total(&mut self, request: &ListRequest, total: u64) -> bool {
        if request.filter != self.state.filter() {
            return false;
        }
        self.state.total = Some(TrustedTotal {
            filter: request.filter.clone(),
            value: total,
        });
        true
    }

    /// Pagination controls are only offered when results span several pages.
    pub fn pagination_visible(&self) -> bool {
        self.state
            .total()
            .is_some_and(|total| total > u64::from(self.state.page_size))
    }

    /// 1-based inclusive record positions shown on the current page.
    pub fn visible_range(&self) -> Option<(u64, u64)> {
        let total = self.state.total()?;
        let size = u64::from(self.state.page_size);
        let start = u64::from(self.state.page - 1) * size + 1;
        if start > total {
            return None;
        }
        Some((start, (start + size - 1).min(total)))
    }

    /// Back to page 1. A changed filter also drops the total, which only the
    /// next applied fetch for the new filter may re-establish.
    fn reset_page(&mut self, before: Option<ListFilter>) -> QueryChange {
        let page_changed = self.state.page != 1;
        self.state.page = 1;
        if self.state.filter() != before {
            self.state.total = None;
            QueryChange::FilterReset
        } else if page_changed {
            QueryChange::PageChanged
        } else {
            QueryChange::Unchanged
        }
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
