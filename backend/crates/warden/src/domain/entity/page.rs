//! Page of records for paginated listings

use serde::Serialize;

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page_size: u32,
    pub page_number: u32,
    pub total_count: u64,
    pub page_count: u64,
    pub record_count: usize,
    pub first: bool,
    pub last: bool,
    pub empty: bool,
    pub records: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(page_number: u32, page_size: u32, total_count: u64, records: Vec<T>) -> Self {
        let page_count = if page_size == 0 {
            1
        } else {
            total_count.div_ceil(u64::from(page_size))
        };

        Self {
            page_size,
            page_number,
            total_count,
            page_count,
            record_count: records.len(),
            first: page_number == 1,
            last: u64::from(page_number) >= page_count,
            empty: records.is_empty(),
            records,
        }
    }

    pub fn empty(page_number: u32, page_size: u32) -> Self {
        Self::new(page_number, page_size, 0, Vec::new())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        let records: Vec<U> = self.records.into_iter().map(f).collect();
        Page {
            page_size: self.page_size,
            page_number: self.page_number,
            total_count: self.total_count,
            page_count: self.page_count,
            record_count: records.len(),
            first: self.first,
            last: self.last,
            empty: records.is_empty(),
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_arithmetic() {
        let page = Page::new(2, 10, 25, vec![0; 10]);
        assert_eq!(page.page_count, 3);
        assert!(!page.first);
        assert!(!page.last);
        assert_eq!(page.record_count, 10);

        let tail = Page::new(3, 10, 25, vec![0; 5]);
        assert!(tail.last);
    }

    #[test]
    fn test_zero_page_size_is_single_page() {
        let page: Page<u8> = Page::new(1, 0, 7, Vec::new());
        assert_eq!(page.page_count, 1);
        assert!(page.first && page.last && page.empty);
    }

    #[test]
    fn test_map_keeps_counts() {
        let page = Page::new(1, 2, 2, vec![1, 2]).map(|n| n * 10);
        assert_eq!(page.records, vec![10, 20]);
        assert_eq!(page.total_count, 2);
    }
}
