//! # Pages and Allocation Tags
//!
//! A page is the unit of recycling: a fixed-capacity payload buffer
//! plus the bookkeeping header the allocator needs (list links, bump
//! cursor, live count, ownership tag).
//!
//! Pages live in one indexed table owned by the allocator instance and
//! are addressed by [`PageId`]. Which list currently holds a page - an
//! arena's chain or the global free pool - is recorded in an explicit
//! [`PageState`] tag, never inferred from link traversal.

/// Stable handle to a page slot in the allocator's page table.
///
/// Slots are never removed while the instance is alive (retired pages
/// park in the free pool), so a `PageId` stays valid for the lifetime
/// of the allocator that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PageId(u32);

impl PageId {
    /// Creates a page ID from a table slot index.
    #[inline]
    #[must_use]
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the table slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which list a page is currently reachable from.
///
/// Exactly one of these holds at any time; the allocator updates the
/// tag in the same operation that moves the page between lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageState {
    /// Permanent zero-capacity head of an arena's chain. Never serves
    /// payload bytes and is never reclaimed.
    Sentinel {
        /// The arena whose chain this sentinel heads.
        arena: u32,
    },
    /// Linked into an arena's page chain and eligible to hold live
    /// allocations.
    InChain {
        /// The owning arena.
        arena: u32,
    },
    /// Retired to the global free pool, awaiting reuse by any arena.
    Free,
}

/// Tag identifying one allocation: the owning page, the page's
/// generation at allocation time, and the byte range carved for it.
///
/// This is what [`allocate`](crate::PagedArena::allocate) returns in
/// place of a raw pointer. Resolving a tag back to its page is O(1)
/// and validated against the page's ownership state and generation, so
/// a stale or foreign tag - including one whose page has since been
/// recycled into another chain - is detected instead of corrupting
/// another page's accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockRef {
    page: PageId,
    generation: u32,
    offset: usize,
    len: usize,
}

impl BlockRef {
    #[inline]
    pub(crate) const fn new(page: PageId, generation: u32, offset: usize, len: usize) -> Self {
        Self {
            page,
            generation,
            offset,
            len,
        }
    }

    /// The page generation this block was carved under. Stale after
    /// the page is recycled.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// The page this block was carved from.
    #[inline]
    #[must_use]
    pub const fn page(self) -> PageId {
        self.page
    }

    /// Byte offset of the block within its page's payload.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Length of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.len
    }

    /// Whether this is a zero-byte block.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// Payload byte range of the block.
    #[inline]
    #[must_use]
    pub(crate) const fn range(self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// One page: bookkeeping header plus owned payload buffer.
#[derive(Debug)]
pub(crate) struct Page {
    /// Successor in the current list, `None` for a terminal page.
    pub(crate) next: Option<PageId>,
    /// Predecessor in the current list, `None` at a list head.
    pub(crate) prev: Option<PageId>,
    /// Offset of the next free payload byte. Monotonically increasing
    /// until the page is recycled; never exceeds `limit()`.
    pub(crate) available: usize,
    /// Outstanding allocations carved from this page.
    pub(crate) live_count: u32,
    /// Bumped every time the page is (re)linked into a chain, so tags
    /// issued against an earlier incarnation stop resolving.
    pub(crate) generation: u32,
    /// Which list currently holds this page.
    pub(crate) state: PageState,
    /// Payload storage. Empty for sentinels, so the first request on a
    /// fresh arena always falls through to page acquisition.
    pub(crate) buf: Box<[u8]>,
}

impl Page {
    /// Builds the permanent sentinel head for an arena chain.
    pub(crate) fn sentinel(arena: u32) -> Self {
        Self {
            next: None,
            prev: None,
            available: 0,
            live_count: 0,
            generation: 0,
            state: PageState::Sentinel { arena },
            buf: Box::default(),
        }
    }

    /// Builds a fresh unlinked page owned by `arena`.
    pub(crate) fn fresh(buf: Box<[u8]>, arena: u32) -> Self {
        Self {
            next: None,
            prev: None,
            available: 0,
            live_count: 0,
            generation: 0,
            state: PageState::InChain { arena },
            buf,
        }
    }

    /// Payload capacity in bytes, fixed at creation.
    #[inline]
    pub(crate) fn limit(&self) -> usize {
        self.buf.len()
    }

    /// Whether a request of `n` bytes fits behind the cursor.
    #[inline]
    pub(crate) fn fits(&self, n: usize) -> bool {
        // Cursor-relative check; `available <= limit` is an invariant,
        // so the subtraction cannot underflow.
        n <= self.limit() - self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_never_fits() {
        let sentinel = Page::sentinel(0);
        assert_eq!(sentinel.limit(), 0);
        assert!(!sentinel.fits(1));
        // A zero-byte request trivially fits anywhere, sentinels included.
        assert!(sentinel.fits(0));
    }

    #[test]
    fn test_fresh_page_fits_up_to_limit() {
        let page = Page::fresh(vec![0u8; 64].into_boxed_slice(), 0);
        assert!(page.fits(64));
        assert!(!page.fits(65));
    }

    #[test]
    fn test_block_ref_range() {
        let block = BlockRef::new(PageId::new(3), 1, 16, 8);
        assert_eq!(block.page().index(), 3);
        assert_eq!(block.generation(), 1);
        assert_eq!(block.range(), 16..24);
        assert_eq!(block.len(), 8);
        assert!(!block.is_empty());
    }
}
