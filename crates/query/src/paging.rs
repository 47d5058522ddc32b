//! Page and slice request/result types.
//!
//! A `Page` carries the total element count and derives its navigation
//! flags from it. A `Slice` only knows whether another slice follows.

use crate::sort::Sort;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// A request for one page of results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: usize,
    /// 0 means "use the configured default size".
    #[serde(default)]
    size: usize,
    #[serde(default)]
    sort: Sort,
}

impl PageRequest {
    /// Creates an unsorted request for page `page` (0-based) of `size` rows.
    pub fn of(page: usize, size: usize) -> Self {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    pub fn of_sorted(page: usize, size: usize, sort: Sort) -> Self {
        Self { page, size, sort }
    }

    /// First page of `size` rows.
    pub fn first_of(size: usize) -> Self {
        Self::of(0, size)
    }

    #[inline]
    pub fn page_number(&self) -> usize {
        self.page
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    pub fn next(&self) -> Self {
        Self::of_sorted(self.page + 1, self.size, self.sort.clone())
    }

    pub fn previous_or_first(&self) -> Self {
        Self::of_sorted(self.page.saturating_sub(1), self.size, self.sort.clone())
    }

    pub fn first(&self) -> Self {
        Self::of_sorted(0, self.size, self.sort.clone())
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    /// Returns a copy with the size replaced, keeping page and sort.
    pub fn with_size(&self, size: usize) -> Self {
        Self::of_sorted(self.page, size, self.sort.clone())
    }

    /// Returns a copy with the sort replaced.
    pub fn with_sort(&self, sort: Sort) -> Self {
        Self::of_sorted(self.page, self.size, sort)
    }
}

/// A page of results with the total element count.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    content: Vec<T>,
    total_elements: u64,
    request: PageRequest,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            total_elements,
            request,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    /// `ceil(total_elements / size)`.
    pub fn total_pages(&self) -> usize {
        let size = self.request.size as u64;
        if size == 0 {
            return if self.total_elements == 0 { 0 } else { 1 };
        }
        self.total_elements.div_ceil(size) as usize
    }

    pub fn number(&self) -> usize {
        self.request.page
    }

    pub fn size(&self) -> usize {
        self.request.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn sort(&self) -> &Sort {
        &self.request.sort
    }

    pub fn is_first(&self) -> bool {
        self.request.page == 0
    }

    pub fn has_next(&self) -> bool {
        self.request.page + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.request.page > 0
    }

    /// True on the final page, and on any page when there is no next one.
    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn next_request(&self) -> Option<PageRequest> {
        self.has_next().then(|| self.request.next())
    }

    /// Converts the content, keeping paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            request: self.request,
        }
    }
}

/// A window of results that knows only whether more follow.
#[derive(Clone, Debug, PartialEq)]
pub struct Slice<T> {
    content: Vec<T>,
    has_next: bool,
    request: PageRequest,
}

impl<T> Slice<T> {
    pub fn new(content: Vec<T>, request: PageRequest, has_next: bool) -> Self {
        Self {
            content,
            has_next,
            request,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn number(&self) -> usize {
        self.request.page
    }

    pub fn size(&self) -> usize {
        self.request.size
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn is_first(&self) -> bool {
        self.request.page == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next
    }

    pub fn next_request(&self) -> Option<PageRequest> {
        self.has_next.then(|| self.request.next())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            has_next: self.has_next,
            request: self.request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::Direction;
    use alloc::vec;

    #[test]
    fn test_request_from_json() {
        let request: PageRequest =
            serde_json::from_str(r#"{"page":2,"sort":[{"property":"age","direction":"desc"}]}"#).unwrap();
        assert_eq!(request.page_number(), 2);
        assert_eq!(request.page_size(), 0);
        assert_eq!(request.sort().orders()[0].direction, Direction::Desc);
    }

    #[test]
    fn test_page_flags() {
        let request = PageRequest::of_sorted(0, 3, Sort::by(&["username"]).descending());
        let page = Page::new(vec![1, 2, 3], request, 5);
        assert_eq!(page.content().len(), 3);
        assert_eq!(page.total_elements(), 5);
        assert_eq!(page.total_pages(), 2);
        assert!(page.is_first());
        assert!(page.has_next());
        assert!(!page.is_last());
    }

    #[test]
    fn test_last_page() {
        let page = Page::new(vec![4, 5], PageRequest::of(1, 3), 5);
        assert!(page.is_last());
        assert!(!page.has_next());
        assert!(page.has_previous());
        assert_eq!(page.next_request(), None);
    }

    #[test]
    fn test_empty_page() {
        let page: Page<u8> = Page::new(vec![], PageRequest::of(0, 10), 0);
        assert_eq!(page.total_pages(), 0);
        assert!(page.is_first());
        assert!(page.is_last());
    }

    #[test]
    fn test_exact_multiple() {
        let page = Page::new(vec![1, 2], PageRequest::of(1, 2), 4);
        assert_eq!(page.total_pages(), 2);
        assert!(page.is_last());
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(vec![1, 2], PageRequest::of(0, 2), 9).map(|v| v * 10);
        assert_eq!(page.content(), &[10, 20]);
        assert_eq!(page.total_pages(), 5);
    }

    #[test]
    fn test_request_navigation() {
        let r = PageRequest::of(2, 10);
        assert_eq!(r.offset(), 20);
        assert_eq!(r.next().page_number(), 3);
        assert_eq!(r.previous_or_first().page_number(), 1);
        assert_eq!(PageRequest::of(0, 10).previous_or_first().page_number(), 0);
        assert_eq!(r.first().page_number(), 0);
    }

    #[test]
    fn test_slice() {
        let slice = Slice::new(vec!["a", "b"], PageRequest::of(0, 2), true);
        assert!(slice.has_next());
        assert!(slice.is_first());
        assert_eq!(slice.next_request().map(|r| r.page_number()), Some(1));
        let upper = slice.map(|s| s.len());
        assert_eq!(upper.content(), &[1, 1]);
    }

    #[test]
    fn test_request_with_size_from_json() {
        let request: PageRequest = serde_json::from_str(r#"{"page":1,"size":3}"#).unwrap();
        assert_eq!(request, PageRequest::of(1, 3));
    }
}
