//! # Allocator Error Types
//!
//! All errors that can occur in the paged arena allocator.

use thiserror::Error;

/// Errors that can occur in the paged arena allocator.
///
/// An error never poisons the allocator instance: a failed request
/// leaves every arena, page chain, and the free pool untouched, and the
/// instance remains usable for other arenas and requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// Arena index out of range for this instance.
    #[error("invalid arena index {index}: instance has {arena_count} arenas")]
    InvalidArena {
        /// The out-of-range index that was passed.
        index: usize,
        /// Number of arenas fixed at construction.
        arena_count: usize,
    },

    /// The underlying allocator could not back a fresh page.
    #[error("out of memory: failed to reserve a {requested} byte page")]
    OutOfMemory {
        /// Page capacity in bytes that could not be reserved.
        requested: usize,
    },

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ArenaError::InvalidArena {
            index: 7,
            arena_count: 4,
        };
        assert_eq!(
            err.to_string(),
            "invalid arena index 7: instance has 4 arenas"
        );

        let err = ArenaError::OutOfMemory { requested: 4096 };
        assert_eq!(
            err.to_string(),
            "out of memory: failed to reserve a 4096 byte page"
        );
    }
}
