//! # PAGEFORGE
//!
//! Multi-arena bump allocator with cross-arena page recycling, designed
//! for:
//! - Allocation-heavy consumers (parsers, tree builders) that would
//!   otherwise hit the general-purpose allocator per object
//! - O(1) cursor-bump allocations on the hot path
//! - Page reuse across arenas: retired pages feed a shared free pool
//!   instead of going back to the OS
//!
//! ## Architecture Rules
//!
//! 1. **No heap traffic in the hot path** - a fitting request is one
//!    bounds check and one cursor bump
//! 2. **Ownership lives in state tags** - every page carries an
//!    explicit `Sentinel` / `InChain` / `Free` tag; no raw pointer
//!    traversal decides who owns what
//! 3. **Single-threaded by design** - one instance per thread, `&mut
//!    self` everywhere
//!
//! ## Example
//!
//! ```rust,ignore
//! use pageforge::PagedArena;
//!
//! let mut arena = PagedArena::new(2)?;
//! let block = arena.allocate(64, 0)?;
//! arena.bytes_mut(0, block).unwrap()[0] = 42;
//! arena.free_arena(0)?; // pages go to the pool, not the OS
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod arena;
pub mod config;
pub mod error;
pub mod page;

pub use arena::{ArenaStats, BumpAlloc, PagedArena};
pub use config::{ArenaConfig, TeardownPolicy};
pub use error::ArenaError;
pub use page::{BlockRef, PageId, PageState};
