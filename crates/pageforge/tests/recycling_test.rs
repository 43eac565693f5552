//! Integration tests for page recycling across the public API.

use pageforge::{ArenaConfig, ArenaError, BumpAlloc, PagedArena, PageState};

fn tight_arena(arena_count: usize, min_page_size: usize) -> PagedArena {
    let mut config = ArenaConfig::with_arenas(arena_count).unwrap();
    config.min_page_size = min_page_size;
    PagedArena::with_config(config).unwrap()
}

#[test]
fn test_single_arena_scenario() {
    let mut arena = PagedArena::new(1).unwrap();

    // Two small requests land back to back in the same page.
    let a = arena.allocate(8, 0).unwrap();
    let b = arena.allocate(8, 0).unwrap();
    assert_eq!(a.page(), b.page());
    assert_eq!(b.offset(), a.offset() + 8);

    // A request larger than the page's remaining capacity opens a new
    // page; the block lives entirely inside it.
    let big = arena.allocate(8192, 0).unwrap();
    assert_ne!(big.page(), a.page());
    assert_eq!(arena.bytes(0, big).unwrap().len(), 8192);

    // After a bulk reset the arena allocates again, from the pool or
    // fresh, and old blocks no longer resolve.
    arena.free_arena(0).unwrap();
    let c = arena.allocate(16, 0).unwrap();
    assert!(arena.bytes(0, a).is_none());
    assert_eq!(arena.bytes(0, c).unwrap().len(), 16);
}

#[test]
fn test_allocations_are_disjoint() {
    let mut arena = tight_arena(1, 128);
    let blocks: Vec<_> = (0..16)
        .map(|_| arena.allocate(24, 0).unwrap())
        .collect();

    // Stamp every block with its own pattern, then verify none of the
    // writes bled into a neighbour - same-page or cross-page.
    for (i, block) in blocks.iter().enumerate() {
        arena.bytes_mut(0, *block).unwrap().fill(i as u8);
    }
    for (i, block) in blocks.iter().enumerate() {
        assert!(arena.bytes(0, *block).unwrap().iter().all(|&v| v == i as u8));
    }
}

#[test]
fn test_arena_isolation_across_reset() {
    let mut arena = tight_arena(2, 64);

    let keep = arena.allocate(32, 1).unwrap();
    arena.bytes_mut(1, keep).unwrap().fill(0xAB);

    // Churn arena 0 through several pages, then reset it.
    for _ in 0..8 {
        let block = arena.allocate(48, 0).unwrap();
        arena.bytes_mut(0, block).unwrap().fill(0xCD);
    }
    arena.free_arena(0).unwrap();

    // New arena-0 allocations may reuse pooled pages, but never the
    // page still holding arena 1's live block.
    let fresh = arena.allocate(48, 0).unwrap();
    assert_ne!(fresh.page(), keep.page());
    assert!(arena.bytes(1, keep).unwrap().iter().all(|&v| v == 0xAB));
}

#[test]
fn test_cross_arena_page_reuse() {
    let mut arena = tight_arena(2, 64);

    let a = arena.allocate(16, 0).unwrap();
    let donor = a.page();
    arena.free_block(0, a).unwrap();
    assert_eq!(arena.page_state(donor), Some(PageState::Free));

    // Arena 1's next request is served from the exact page arena 0
    // retired: bit-identical backing, different owner.
    let b = arena.allocate(16, 1).unwrap();
    assert_eq!(b.page(), donor);
    assert_eq!(arena.page_state(donor), Some(PageState::InChain { arena: 1 }));
}

#[test]
fn test_bulk_reset_twice_is_noop() {
    let mut arena = tight_arena(1, 32);
    for _ in 0..4 {
        arena.allocate(24, 0).unwrap();
    }
    arena.free_arena(0).unwrap();
    let pooled = arena.stats().free_pages;

    arena.free_arena(0).unwrap();
    assert_eq!(arena.stats().free_pages, pooled);
    assert_eq!(arena.stats().live_pages, 0);
}

#[test]
fn test_reallocate_round_trip_content() {
    let mut arena = PagedArena::new(1).unwrap();
    let a = arena.allocate(12, 0).unwrap();
    arena
        .bytes_mut(0, a)
        .unwrap()
        .copy_from_slice(b"hello, pages");

    let b = arena.reallocate(a, 64, 0).unwrap();
    assert_eq!(&arena.bytes(0, b).unwrap()[..12], b"hello, pages");

    let c = arena.reallocate(b, 5, 0).unwrap();
    assert_eq!(arena.bytes(0, c).unwrap(), b"hello");
}

#[test]
fn test_invalid_arena_on_every_operation() {
    let mut arena = PagedArena::new(1).unwrap();
    let block = arena.allocate(4, 0).unwrap();

    let expected = ArenaError::InvalidArena {
        index: 3,
        arena_count: 1,
    };
    assert_eq!(arena.allocate(4, 3).unwrap_err(), expected);
    assert_eq!(arena.reallocate(block, 8, 3).unwrap_err(), expected);
    assert_eq!(arena.free_block(3, block).unwrap_err(), expected);
    assert_eq!(arena.free_arena(3).unwrap_err(), expected);

    // The failed calls left the instance fully usable.
    assert!(arena.allocate(4, 0).is_ok());
}

#[test]
fn test_toml_config_end_to_end() {
    let config = ArenaConfig::from_toml_str(
        r#"
        arena_count = 3
        resize_factor = 2.0
        min_page_size = 256
        teardown = "release"
        "#,
    )
    .unwrap();
    let mut arena = PagedArena::with_config(config).unwrap();
    assert_eq!(arena.arena_count(), 3);

    // resize_factor 2.0: a 300-byte request gets a 600-byte page, so a
    // second 300-byte request shares it.
    let a = arena.allocate(300, 2).unwrap();
    let b = arena.allocate(300, 2).unwrap();
    assert_eq!(a.page(), b.page());
}

#[test]
fn test_generic_consumer_over_bump_alloc() {
    // A consumer builds a list of records through the trait seam only.
    fn build_records<A: BumpAlloc>(alloc: &mut A, arena: usize) -> Vec<pageforge::BlockRef> {
        (0..32).map(|i| alloc.allocate(8 + i, arena).unwrap()).collect()
    }

    let mut arena = PagedArena::new(2).unwrap();
    let records = build_records(&mut arena, 1);
    assert_eq!(records.len(), 32);
    arena.free_arena(1).unwrap();
}
