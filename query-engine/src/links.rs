//! FILENAME: query-engine/src/links.rs
//! Pagination windows for response assembly.
//!
//! Pure offset arithmetic; the HTTP boundary turns these into URLs.

use serde::{Deserialize, Serialize};

/// One addressable page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub start: usize,
    pub limit: usize,
}

/// Navigation set around the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    pub current: PageWindow,
    pub next: Option<PageWindow>,
    pub prev: Option<PageWindow>,
    pub first: PageWindow,
    pub last: PageWindow,
}

/// Computes the navigation set for a page of `limit` records at offset
/// `start` over `total` records. A zero limit is treated as one.
pub fn page_links(start: usize, limit: usize, total: usize) -> PageLinks {
    let limit = limit.max(1);
    let window = |start| PageWindow { start, limit };

    let last_start = if total == 0 {
        0
    } else {
        ((total - 1) / limit) * limit
    };

    PageLinks {
        current: window(start),
        next: (start + limit < total).then(|| window(start + limit)),
        prev: (start > 0).then(|| window(start.saturating_sub(limit))),
        first: window(0),
        last: window(last_start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_page_has_both_neighbors() {
        let links = page_links(10, 10, 35);
        assert_eq!(links.prev, Some(PageWindow { start: 0, limit: 10 }));
        assert_eq!(links.next, Some(PageWindow { start: 20, limit: 10 }));
        assert_eq!(links.last.start, 30);
    }

    #[test]
    fn test_first_and_last_pages() {
        let links = page_links(0, 10, 35);
        assert_eq!(links.prev, None);
        assert!(links.next.is_some());

        let links = page_links(30, 10, 35);
        assert_eq!(links.next, None);
        assert_eq!(links.current, links.last);
    }

    #[test]
    fn test_empty_result_set() {
        let links = page_links(0, 10, 0);
        assert_eq!(links.next, None);
        assert_eq!(links.prev, None);
        assert_eq!(links.last.start, 0);
    }

    #[test]
    fn test_exact_multiple_has_no_phantom_page() {
        let links = page_links(10, 10, 20);
        assert_eq!(links.next, None);
        assert_eq!(links.last.start, 10);
    }
}
