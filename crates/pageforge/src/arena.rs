//! # Multi-Arena Paged Allocator
//!
//! N independent bump arenas sharing one page table and one free-page
//! pool.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────┐
//!                 │              PagedArena              │
//!                 │                                      │
//!                 │  arena 0: [sentinel]→[page]→[tail]   │
//!                 │  arena 1: [sentinel]→[tail]          │
//!                 │  arena 2: [sentinel]                 │
//!                 │                                      │
//!                 │  free pool: [page]→[page]            │
//!                 └──────────────────────────────────────┘
//! ```
//!
//! Every page, sentinel or not, lives in one indexed table; the chains
//! and the pool are threaded through it by `PageId` links. Allocation
//! order on a full tail: pool page first, fresh page second.
//!
//! ## Thread Safety
//!
//! This allocator is NOT thread-safe and takes `&mut self` on every
//! mutating operation. Use one instance per thread.

use crate::config::{ArenaConfig, TeardownPolicy};
use crate::error::ArenaError;
use crate::page::{BlockRef, Page, PageId, PageState};

/// Counters describing an allocator instance's page traffic.
///
/// Plain counters, no atomics: the allocator is single-threaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Pages requested fresh from the system allocator.
    pub pages_created: u64,
    /// Pool pages relinked into an arena chain.
    pub pages_recycled: u64,
    /// Pages retired to the pool when their live count hit zero.
    pub pages_reclaimed: u64,
    /// Total payload bytes handed out by `allocate`.
    pub bytes_allocated: u64,
    /// Pages currently linked into some arena chain (sentinels not
    /// counted).
    pub live_pages: usize,
    /// Pages currently parked in the free pool.
    pub free_pages: usize,
}

/// The four operations any consumer needs from "an allocator".
///
/// Tree builders, parsers and other allocation-heavy components should
/// be generic over this trait rather than the concrete [`PagedArena`].
pub trait BumpAlloc {
    /// Carves `n` contiguous bytes out of the given arena.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidArena`] for an out-of-range index,
    /// [`ArenaError::OutOfMemory`] if a fresh page cannot be backed.
    fn allocate(&mut self, n: usize, arena: usize) -> Result<BlockRef, ArenaError>;

    /// Moves a block to a fresh `n_new`-byte allocation, copying the
    /// leading `min(old len, n_new)` bytes, and releases the old block.
    ///
    /// # Errors
    ///
    /// Same as [`BumpAlloc::allocate`]; on error the old block is left
    /// untouched and still live.
    fn reallocate(
        &mut self,
        block: BlockRef,
        n_new: usize,
        arena: usize,
    ) -> Result<BlockRef, ArenaError>;

    /// Releases one allocation. A block that does not resolve to a live
    /// page of this arena is ignored.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidArena`] for an out-of-range index.
    fn free_block(&mut self, arena: usize, block: BlockRef) -> Result<(), ArenaError>;

    /// Releases every allocation in the arena at once, invalidating all
    /// blocks previously returned for it.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidArena`] for an out-of-range index.
    fn free_arena(&mut self, arena: usize) -> Result<(), ArenaError>;
}

/// Fixed-capacity multi-arena bump allocator with page recycling.
///
/// Construction fixes the number of arenas. Allocations are O(1)
/// cursor bumps against the arena's tail page; exhausted tails are
/// replaced first from the cross-arena free pool and only then by a
/// fresh page. Pages whose live count drops to zero are retired back
/// to the pool, where any arena may claim them.
///
/// Memory is never returned to the system while the instance is alive;
/// what happens at drop is the configured [`TeardownPolicy`].
#[derive(Debug)]
pub struct PagedArena {
    /// Page table. Slots `0..arena_count` are the permanent sentinels;
    /// slots are never removed while the instance lives.
    pages: Vec<Page>,
    /// Per-arena tail: the page currently receiving allocations.
    tails: Vec<PageId>,
    /// Head of the cross-arena free-page pool.
    free_head: Option<PageId>,
    /// Pages currently in the pool, kept in lockstep with `free_head`.
    pool_pages: usize,
    config: ArenaConfig,
    stats: ArenaStats,
}

impl PagedArena {
    /// Creates an allocator with `arena_count` arenas and default
    /// sizing.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidConfig`] if `arena_count` is zero.
    pub fn new(arena_count: usize) -> Result<Self, ArenaError> {
        Self::with_config(ArenaConfig::with_arenas(arena_count)?)
    }

    /// Creates an allocator from a validated configuration.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidConfig`] if the configuration fails
    /// validation.
    pub fn with_config(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        if u32::try_from(config.arena_count).is_err() {
            return Err(ArenaError::InvalidConfig(
                "arena_count exceeds the supported range".to_string(),
            ));
        }
        let count = config.arena_count;
        let mut pages = Vec::with_capacity(count);
        let mut tails = Vec::with_capacity(count);
        for arena in 0..count {
            pages.push(Page::sentinel(arena as u32));
            // Each arena starts bumping against its own sentinel, whose
            // zero capacity forces page acquisition on first use.
            tails.push(PageId::new(arena as u32));
        }
        Ok(Self {
            pages,
            tails,
            free_head: None,
            pool_pages: 0,
            config,
            stats: ArenaStats::default(),
        })
    }

    /// Number of arenas, fixed at construction.
    #[inline]
    #[must_use]
    pub fn arena_count(&self) -> usize {
        self.tails.len()
    }

    /// The configuration this instance was built from.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Snapshot of the instance's page-traffic counters.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let mut stats = self.stats;
        stats.free_pages = self.pool_pages;
        stats.live_pages = self.pages.len() - self.arena_count() - self.pool_pages;
        stats
    }

    /// Carves `n` contiguous bytes out of the given arena.
    ///
    /// Contents are unspecified: zero-filled on a page's first use,
    /// stale after recycling. The hot path is a single bounds check and
    /// cursor bump.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidArena`] for an out-of-range index,
    /// [`ArenaError::OutOfMemory`] if a fresh page cannot be backed.
    /// A failed request leaves the arena unchanged and the instance
    /// usable.
    pub fn allocate(&mut self, n: usize, arena: usize) -> Result<BlockRef, ArenaError> {
        self.check_arena(arena)?;
        loop {
            let tail = self.tails[arena];
            let page = &mut self.pages[tail.index()];
            if page.fits(n) {
                let offset = page.available;
                let generation = page.generation;
                page.available += n;
                page.live_count += 1;
                self.stats.bytes_allocated += n as u64;
                return Ok(BlockRef::new(tail, generation, offset, n));
            }
            // The tail is always the terminal page of its chain; a full
            // tail means the whole chain is full.
            debug_assert!(page.next.is_none(), "tail page must be terminal");
            if let Some(id) = self.pop_free() {
                // A recycled page keeps its original capacity and may
                // still be too small; the loop then tries the pool
                // again or falls through to a fresh page.
                self.attach_tail(id, arena);
                self.stats.pages_recycled += 1;
                tracing::debug!("arena {}: recycled page {} from pool", arena, id.index());
            } else {
                self.grow(n, arena)?;
            }
        }
    }

    /// Moves a block to a fresh `n_new`-byte allocation.
    ///
    /// The leading `min(old len, n_new)` bytes are copied. The old
    /// block is released afterwards; its page is reclaimed as a whole
    /// if that release was the last outstanding reference. The new
    /// block may land in a different page or further along the same
    /// page - old bytes are never freed individually.
    ///
    /// # Errors
    ///
    /// Same as [`PagedArena::allocate`]; on error the old block is
    /// left untouched and still live.
    pub fn reallocate(
        &mut self,
        block: BlockRef,
        n_new: usize,
        arena: usize,
    ) -> Result<BlockRef, ArenaError> {
        let new_block = self.allocate(n_new, arena)?;
        let copy_len = block.len().min(n_new);
        if self.resolve(arena, block).is_some() {
            if copy_len > 0 {
                self.copy_bytes(block, new_block, copy_len);
            }
            // If the new block landed in the old page, `allocate` has
            // already counted it there, so this release cannot reclaim
            // a page that still backs the new block.
            self.release_ref(block.page(), arena);
        }
        Ok(new_block)
    }

    /// Releases one allocation.
    ///
    /// Decrements the owning page's live count and retires the page to
    /// the free pool when the count reaches zero. A block that does not
    /// resolve to a live page of this arena (stale, foreign, or carved
    /// from the sentinel) is ignored.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidArena`] for an out-of-range index.
    pub fn free_block(&mut self, arena: usize, block: BlockRef) -> Result<(), ArenaError> {
        self.check_arena(arena)?;
        if self.resolve(arena, block).is_some() {
            self.release_ref(block.page(), arena);
        }
        Ok(())
    }

    /// Releases every allocation in the arena at once.
    ///
    /// Splices the whole chain behind the sentinel onto the free pool
    /// and resets the tail to the sentinel. Invalidates every block
    /// previously returned for this arena. Calling it again on an
    /// already-empty arena is a no-op.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidArena`] for an out-of-range index.
    pub fn free_arena(&mut self, arena: usize) -> Result<(), ArenaError> {
        self.check_arena(arena)?;
        let sentinel = PageId::new(arena as u32);
        let Some(first) = self.pages[sentinel.index()].next else {
            return Ok(());
        };
        // Retag the chain while finding its terminal page.
        let mut last = first;
        let mut moved = 0usize;
        let mut cursor = Some(first);
        while let Some(id) = cursor {
            let page = &mut self.pages[id.index()];
            page.state = PageState::Free;
            last = id;
            moved += 1;
            cursor = page.next;
        }
        debug_assert_eq!(last, self.tails[arena]);
        // Splice [first..last] onto the pool head in one operation.
        self.pages[last.index()].next = self.free_head;
        if let Some(old) = self.free_head {
            self.pages[old.index()].prev = Some(last);
        }
        self.pages[first.index()].prev = None;
        self.free_head = Some(first);
        self.pool_pages += moved;
        // The arena shrinks back to its permanent sentinel.
        self.pages[sentinel.index()].next = None;
        self.tails[arena] = sentinel;
        tracing::trace!("arena {}: bulk reset pooled {} pages", arena, moved);
        Ok(())
    }

    /// Read access to a block's bytes.
    ///
    /// Returns `None` if the block does not resolve to a live page of
    /// this arena, or for zero-length blocks on a sentinel.
    #[must_use]
    pub fn bytes(&self, arena: usize, block: BlockRef) -> Option<&[u8]> {
        self.resolve(arena, block)?;
        Some(&self.pages[block.page().index()].buf[block.range()])
    }

    /// Write access to a block's bytes.
    ///
    /// Returns `None` under the same conditions as
    /// [`PagedArena::bytes`].
    pub fn bytes_mut(&mut self, arena: usize, block: BlockRef) -> Option<&mut [u8]> {
        self.resolve(arena, block)?;
        Some(&mut self.pages[block.page().index()].buf[block.range()])
    }

    /// Ownership state of a page, for consumers that want to observe
    /// recycling (tests, diagnostics).
    #[must_use]
    pub fn page_state(&self, page: PageId) -> Option<PageState> {
        self.pages.get(page.index()).map(|p| p.state)
    }

    fn check_arena(&self, arena: usize) -> Result<(), ArenaError> {
        if arena >= self.tails.len() {
            return Err(ArenaError::InvalidArena {
                index: arena,
                arena_count: self.tails.len(),
            });
        }
        Ok(())
    }

    /// Validates that a block belongs to the current incarnation of a
    /// live page of `arena`.
    ///
    /// This replaces the address-range scan of the classic design: the
    /// block's tag names its page directly, the page's state tag says
    /// which list owns it, and the generation check rejects tags issued
    /// before the page was last recycled. A stale or foreign block
    /// resolves to `None` instead of corrupting another page's
    /// accounting.
    fn resolve(&self, arena: usize, block: BlockRef) -> Option<()> {
        let page = self.pages.get(block.page().index())?;
        match page.state {
            PageState::InChain { arena: owner }
                if owner as usize == arena
                    && page.generation == block.generation()
                    && block.range().end <= page.available =>
            {
                Some(())
            }
            _ => None,
        }
    }

    /// Decrements a page's live count, reclaiming the page at zero.
    fn release_ref(&mut self, id: PageId, arena: usize) {
        let page = &mut self.pages[id.index()];
        // The count reaching zero retires the page, so a zero count on
        // a chained page means an unbalanced release. Check it, don't
        // trust it.
        if page.live_count == 0 {
            tracing::warn!(
                "arena {}: unbalanced release on page {}, ignoring",
                arena,
                id.index()
            );
            debug_assert!(page.live_count > 0, "unbalanced release");
            return;
        }
        page.live_count -= 1;
        if page.live_count == 0 {
            self.reclaim(id, arena);
        }
    }

    /// Unlinks a page from its arena chain and pushes it onto the free
    /// pool. Never called on a sentinel.
    fn reclaim(&mut self, id: PageId, arena: usize) {
        let (prev, next) = {
            let page = &self.pages[id.index()];
            (page.prev, page.next)
        };
        debug_assert!(prev.is_some(), "sentinels are never reclaimed");
        if self.tails[arena] == id {
            if let Some(prev) = prev {
                self.tails[arena] = prev;
            }
        }
        if let Some(prev) = prev {
            self.pages[prev.index()].next = next;
        }
        if let Some(next) = next {
            self.pages[next.index()].prev = prev;
        }
        self.push_free(id);
        self.stats.pages_reclaimed += 1;
        tracing::trace!("arena {}: reclaimed page {}", arena, id.index());
    }

    /// Pops the head of the free pool, if any.
    fn pop_free(&mut self) -> Option<PageId> {
        let id = self.free_head?;
        let next = self.pages[id.index()].next;
        if let Some(next) = next {
            self.pages[next.index()].prev = None;
        }
        self.free_head = next;
        self.pool_pages -= 1;
        Some(id)
    }

    /// Pushes a page onto the head of the free pool.
    fn push_free(&mut self, id: PageId) {
        let old = self.free_head;
        {
            let page = &mut self.pages[id.index()];
            page.prev = None;
            page.next = old;
            page.state = PageState::Free;
        }
        if let Some(old) = old {
            self.pages[old.index()].prev = Some(id);
        }
        self.free_head = Some(id);
        self.pool_pages += 1;
    }

    /// Links a page (fresh or recycled) as the arena's new tail,
    /// resetting its cursor and live count.
    fn attach_tail(&mut self, id: PageId, arena: usize) {
        let old_tail = self.tails[arena];
        self.pages[old_tail.index()].next = Some(id);
        let page = &mut self.pages[id.index()];
        page.prev = Some(old_tail);
        page.next = None;
        page.available = 0;
        page.live_count = 0;
        // New incarnation: tags from the previous chain stop resolving.
        page.generation = page.generation.wrapping_add(1);
        page.state = PageState::InChain {
            arena: arena as u32,
        };
        self.tails[arena] = id;
    }

    /// Creates a fresh page big enough for `n` bytes and links it as
    /// the arena's tail.
    // Reservation must be fallible before the zero-fill.
    #[allow(clippy::slow_vector_initialization)]
    fn grow(&mut self, n: usize, arena: usize) -> Result<(), ArenaError> {
        let capacity = self.fresh_capacity(n);
        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| ArenaError::OutOfMemory {
                requested: capacity,
            })?;
        buf.resize(capacity, 0);
        // The page table is indexed by u32; refuse to grow past that,
        // mirroring the arena_count guard at construction.
        let slot = u32::try_from(self.pages.len())
            .map_err(|_| ArenaError::OutOfMemory {
                requested: capacity,
            })?;
        let id = PageId::new(slot);
        self.pages.push(Page::fresh(buf.into_boxed_slice(), arena as u32));
        self.attach_tail(id, arena);
        self.stats.pages_created += 1;
        tracing::debug!(
            "arena {}: created fresh page {} ({} bytes)",
            arena,
            id.index(),
            capacity
        );
        Ok(())
    }

    /// Capacity for a fresh page backing an `n`-byte request: the
    /// resize factor's headroom, floored by `min_page_size` and always
    /// strictly greater than `n`, so the growth loop in `allocate`
    /// terminates on the next iteration.
    fn fresh_capacity(&self, n: usize) -> usize {
        let scaled = (n as f64 * self.config.resize_factor).ceil() as usize;
        scaled
            .max(n.saturating_add(1))
            .max(self.config.min_page_size)
    }

    /// Copies `len` leading bytes from `src` to `dst`. The blocks may
    /// share a page; bump allocation guarantees their ranges are
    /// disjoint.
    fn copy_bytes(&mut self, src: BlockRef, dst: BlockRef, len: usize) {
        let src_range = src.offset()..src.offset() + len;
        let dst_start = dst.offset();
        let (src_idx, dst_idx) = (src.page().index(), dst.page().index());
        if src_idx == dst_idx {
            self.pages[src_idx].buf.copy_within(src_range, dst_start);
        } else if src_idx < dst_idx {
            let (head, tail) = self.pages.split_at_mut(dst_idx);
            tail[0].buf[dst_start..dst_start + len].copy_from_slice(&head[src_idx].buf[src_range]);
        } else {
            let (head, tail) = self.pages.split_at_mut(src_idx);
            head[dst_idx].buf[dst_start..dst_start + len]
                .copy_from_slice(&tail[0].buf[src_range]);
        }
    }
}

impl BumpAlloc for PagedArena {
    fn allocate(&mut self, n: usize, arena: usize) -> Result<BlockRef, ArenaError> {
        Self::allocate(self, n, arena)
    }

    fn reallocate(
        &mut self,
        block: BlockRef,
        n_new: usize,
        arena: usize,
    ) -> Result<BlockRef, ArenaError> {
        Self::reallocate(self, block, n_new, arena)
    }

    fn free_block(&mut self, arena: usize, block: BlockRef) -> Result<(), ArenaError> {
        Self::free_block(self, arena, block)
    }

    fn free_arena(&mut self, arena: usize) -> Result<(), ArenaError> {
        Self::free_arena(self, arena)
    }
}

impl Drop for PagedArena {
    /// Applies the configured [`TeardownPolicy`]: `Release` lets the
    /// page table drop normally, `Abandon` forgets it and leaves the
    /// memory for the OS to reclaim at process exit.
    fn drop(&mut self) {
        if self.config.teardown == TeardownPolicy::Abandon {
            std::mem::forget(std::mem::take(&mut self.pages));
        }
    }
}
