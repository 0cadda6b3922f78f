//! Pagination types for bounded result windows.
//!
//! A [`PageRequest`] names a 1-indexed page and a page size; a [`Page`] carries the
//! window of items together with the total count of matching documents, so callers
//! can navigate without issuing a second query.

use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A single page of paginated results.
///
/// # Example
///
/// ```ignore
/// use blogstore::page::Page;
///
/// let page = Page::new(vec!["a", "b"], 12, 1, 2);
///
/// assert_eq!(page.pages(), 6);
/// assert_eq!(page.next_page(), Some(2));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of matching items across all pages.
    pub total: u64,
    /// The page number (1-indexed).
    pub page: usize,
    /// Maximum number of items per page.
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: usize, limit: usize) -> Self {
        Self { items, total, page, limit }
    }

    /// An empty page for the given request.
    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request.page, request.limit)
    }

    /// Total number of pages needed to hold every matching item.
    pub fn pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }

        self.total.div_ceil(self.limit as u64)
    }

    /// Whether items exist beyond this page.
    pub fn has_more(&self) -> bool {
        (self.page as u64) < self.pages()
    }

    /// The next page number, if more pages exist.
    pub fn next_page(&self) -> Option<usize> {
        self.has_more().then(|| self.page + 1)
    }

    /// The previous page number, if this is not the first page.
    pub fn previous_page(&self) -> Option<usize> {
        (self.page > 1).then(|| self.page - 1)
    }

    /// Maps the items of this page, keeping the pagination metadata.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Parameters selecting one page of a result set.
///
/// Pages are 1-indexed (page 1 is the first page).
///
/// ```ignore
/// use blogstore::page::PageRequest;
///
/// let request = PageRequest::new(3, 20)?;
/// assert_eq!(request.offset(), 40);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub limit: usize,
}

impl PageRequest {
    /// Creates new pagination parameters.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if `page` or `limit` is zero.
    pub fn new(page: usize, limit: usize) -> DocumentStoreResult<Self> {
        let request = Self { page, limit };
        request.validate()?;

        Ok(request)
    }

    /// Creates a new builder for constructing pagination parameters.
    pub fn builder() -> PageRequestBuilder {
        PageRequestBuilder::new()
    }

    /// Checks that both the page number and the page size are at least 1.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.page < 1 {
            return Err(DocumentStoreError::Validation(format!(
                "page must be at least 1, got {}",
                self.page
            )));
        }
        if self.limit < 1 {
            return Err(DocumentStoreError::Validation(format!(
                "limit must be at least 1, got {}",
                self.limit
            )));
        }

        Ok(())
    }

    /// Number of items to skip for this page.
    ///
    /// Saturates instead of overflowing for absurdly large page numbers.
    pub fn offset(&self) -> usize {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// Builder for constructing [`PageRequest`] instances.
///
/// Uses defaults for any unset values (page=1, limit=10).
#[derive(Debug, Default)]
pub struct PageRequestBuilder {
    page: Option<usize>,
    limit: Option<usize>,
}

impl PageRequestBuilder {
    pub fn new() -> Self {
        Self { page: None, limit: None }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> DocumentStoreResult<PageRequest> {
        PageRequest::new(self.page.unwrap_or(1), self.limit.unwrap_or(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 10, 0)]
    #[case(2, 10, 10)]
    #[case(3, 20, 40)]
    #[case(7, 1, 6)]
    fn offset_skips_previous_pages(#[case] page: usize, #[case] limit: usize, #[case] offset: usize) {
        assert_eq!(PageRequest::new(page, limit).unwrap().offset(), offset);
    }

    #[rstest]
    #[case(0, 10)]
    #[case(1, 0)]
    #[case(0, 0)]
    fn zero_page_or_limit_is_rejected(#[case] page: usize, #[case] limit: usize) {
        let err = PageRequest::new(page, limit).unwrap_err();

        assert!(err.is_validation());
    }

    #[test]
    fn offset_saturates_for_huge_pages() {
        let request = PageRequest { page: usize::MAX, limit: usize::MAX };

        assert_eq!(request.offset(), usize::MAX);
    }

    #[test]
    fn builder_falls_back_to_defaults() {
        let request = PageRequest::builder().with_page(4).build().unwrap();

        assert_eq!(request, PageRequest { page: 4, limit: 10 });
    }

    #[rstest]
    #[case(0, 1, 0, false, None, None)]
    #[case(25, 1, 3, true, Some(2), None)]
    #[case(25, 3, 3, false, None, Some(2))]
    #[case(30, 3, 3, false, None, Some(2))]
    #[case(5, 100000, 1, false, None, Some(99999))]
    fn page_navigation(
        #[case] total: u64,
        #[case] page: usize,
        #[case] pages: u64,
        #[case] has_more: bool,
        #[case] next: Option<usize>,
        #[case] previous: Option<usize>,
    ) {
        let page = Page::<u8>::new(Vec::new(), total, page, 10);

        assert_eq!(page.pages(), pages);
        assert_eq!(page.has_more(), has_more);
        assert_eq!(page.next_page(), next);
        assert_eq!(page.previous_page(), previous);
    }
}
