// Reference counted byte pages
//
// Message payloads are accumulated into lists of fixed-size pages.
// Cloning a PageList retains the underlying pages; dropping it releases
// them. A page that is shared by more than one list is immutable, so
// appending to a shared list always starts a fresh page.

use std::sync::Arc;

/// Default size for the pages of a pool
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Fixed-size byte page
pub struct Page {
    /// Page contents (capacity is the pool page size)
    data: Vec<u8>,
}

impl Page {
    /// Gets the filled bytes of the page
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Gets the number of filled bytes
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// Allocator of fixed-size byte pages
#[derive(Clone)]
pub struct PagePool {
    /// Size of each allocated page, in bytes
    page_size: usize,
}

impl PagePool {
    /// Creates a page pool
    ///
    /// # Arguments
    ///
    /// * `page_size` - Size of each page, in bytes. Must be greater than 0
    pub fn new(page_size: usize) -> PagePool {
        PagePool {
            page_size: page_size.max(1),
        }
    }

    /// Gets the page size of the pool
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Appends bytes to a page list, continuing the last page when it
    /// still has room and is not shared with another list
    ///
    /// # Arguments
    ///
    /// * `page_list` - The list to fill
    /// * `mem` - The bytes to append
    pub fn fill_pages(&self, page_list: &mut PageList, mem: &[u8]) {
        let mut rest = mem;

        while !rest.is_empty() {
            let room = match page_list.pages.last_mut().and_then(Arc::get_mut) {
                Some(last) => self.page_size - last.data.len(),
                None => 0,
            };

            if room == 0 {
                page_list.pages.push(Arc::new(Page {
                    data: Vec::with_capacity(self.page_size),
                }));
                continue;
            }

            let tofill = room.min(rest.len());

            // The page was just checked for exclusive access
            if let Some(last) = page_list.pages.last_mut().and_then(Arc::get_mut) {
                last.data.extend_from_slice(&rest[..tofill]);
            }

            page_list.total_len += tofill;
            rest = &rest[tofill..];
        }
    }
}

/// Owned list of pages holding one message
///
/// Cloning the list retains every page; dropping it releases them.
#[derive(Default)]
pub struct PageList {
    /// The pages, in message order
    pages: Vec<Arc<Page>>,

    /// Total number of filled bytes across the pages
    total_len: usize,
}

impl Clone for PageList {
    fn clone(&self) -> PageList {
        PageList {
            pages: self.pages.clone(),
            total_len: self.total_len,
        }
    }
}

impl PageList {
    /// Creates an empty page list
    pub fn new() -> PageList {
        PageList {
            pages: Vec::new(),
            total_len: 0,
        }
    }

    /// Checks if the list has no bytes
    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    /// Gets the total number of bytes in the list
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Releases every page of the list
    pub fn reset(&mut self) {
        self.pages.clear();
        self.total_len = 0;
    }

    /// Gets the pages of the list, in message order
    pub fn pages(&self) -> &[Arc<Page>] {
        &self.pages
    }

    /// Copies up to n bytes from the start of the list
    ///
    /// # Arguments
    ///
    /// * `n` - Maximum number of bytes to copy
    pub fn first_bytes(&self, n: usize) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::with_capacity(n.min(self.total_len));

        for page in &self.pages {
            if out.len() >= n {
                break;
            }

            let left = n - out.len();
            let bytes = page.bytes();

            out.extend_from_slice(&bytes[..left.min(bytes.len())]);
        }

        out
    }

    /// Copies the whole list into a contiguous buffer
    pub fn copy_to_vec(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::with_capacity(self.total_len);

        for page in &self.pages {
            out.extend_from_slice(page.bytes());
        }

        out
    }
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_pages() {
        let pool = PagePool::new(8);
        let mut list = PageList::new();

        pool.fill_pages(&mut list, &[1, 2, 3, 4, 5, 6]);

        assert_eq!(list.total_len(), 6);
        assert_eq!(list.pages().len(), 1);

        pool.fill_pages(&mut list, &[7, 8, 9, 10]);

        assert_eq!(list.total_len(), 10);
        assert_eq!(list.pages().len(), 2);
        assert_eq!(list.copy_to_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_shared_pages_are_not_mutated() {
        let pool = PagePool::new(8);
        let mut list = PageList::new();

        pool.fill_pages(&mut list, &[1, 2, 3]);

        let retained = list.clone();

        // The last page is shared now, so the fill must open a new page
        pool.fill_pages(&mut list, &[4, 5]);

        assert_eq!(retained.copy_to_vec(), vec![1, 2, 3]);
        assert_eq!(list.copy_to_vec(), vec![1, 2, 3, 4, 5]);
        assert_eq!(list.pages().len(), 2);
    }

    #[test]
    fn test_first_bytes() {
        let pool = PagePool::new(4);
        let mut list = PageList::new();

        pool.fill_pages(&mut list, &[1, 2, 3, 4, 5, 6]);

        assert_eq!(list.first_bytes(2), vec![1, 2]);
        assert_eq!(list.first_bytes(5), vec![1, 2, 3, 4, 5]);
        assert_eq!(list.first_bytes(100), vec![1, 2, 3, 4, 5, 6]);
    }
}
