//! # Allocator Configuration
//!
//! Configuration is loaded once at startup (typically from a TOML file)
//! and validated before an allocator instance is built. Nothing here is
//! consulted on the allocation hot path except the resize factor.

use crate::error::ArenaError;
use serde::{Deserialize, Serialize};

/// What happens to page memory when the allocator instance is dropped.
///
/// The original design never returned pages to the system while the
/// instance was alive; this policy makes the teardown half of that
/// story an explicit choice instead of an accident.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    /// Drop every page buffer normally. The safe default.
    #[default]
    Release,
    /// Leak the page table and let the OS reclaim it at process exit.
    ///
    /// Skips walking and freeing what can be a large number of page
    /// buffers. Only sensible immediately before process termination.
    Abandon,
}

/// Configuration for a [`PagedArena`](crate::PagedArena) instance.
///
/// # Example (TOML)
///
/// ```toml
/// arena_count = 4
/// resize_factor = 1.1
/// teardown = "release"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaConfig {
    /// Number of independent bump arenas, fixed for the instance's
    /// lifetime. Must be at least 1.
    pub arena_count: usize,
    /// Headroom multiplier for fresh pages: a request for `n` bytes
    /// that needs a new page gets one of at least `ceil(n *
    /// resize_factor)` bytes. Must be strictly greater than 1.0.
    pub resize_factor: f64,
    /// Floor on fresh page capacity in bytes, so small allocations
    /// share pages instead of getting one page each. Must be at
    /// least 1.
    pub min_page_size: usize,
    /// Teardown policy applied when the instance is dropped.
    pub teardown: TeardownPolicy,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            arena_count: 1,
            resize_factor: 1.1,
            min_page_size: 4096,
            teardown: TeardownPolicy::Release,
        }
    }
}

impl ArenaConfig {
    /// Creates a validated config with `arena_count` arenas and default
    /// sizing.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] if `arena_count` is zero.
    pub fn with_arenas(arena_count: usize) -> Result<Self, ArenaError> {
        let config = Self {
            arena_count,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] if the TOML fails to parse
    /// or a field fails validation.
    pub fn from_toml_str(input: &str) -> Result<Self, ArenaError> {
        let config: Self =
            toml::from_str(input).map_err(|e| ArenaError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidConfig`] if `arena_count` is zero or
    /// `resize_factor` is not strictly greater than 1.0.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.arena_count == 0 {
            return Err(ArenaError::InvalidConfig(
                "arena_count must be at least 1".to_string(),
            ));
        }
        if !self.resize_factor.is_finite() || self.resize_factor <= 1.0 {
            return Err(ArenaError::InvalidConfig(format!(
                "resize_factor must be a finite value greater than 1.0, got {}",
                self.resize_factor
            )));
        }
        if self.min_page_size == 0 {
            return Err(ArenaError::InvalidConfig(
                "min_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ArenaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.arena_count, 1);
        assert_eq!(config.teardown, TeardownPolicy::Release);
    }

    #[test]
    fn test_zero_arenas_rejected() {
        assert!(ArenaConfig::with_arenas(0).is_err());
        assert!(ArenaConfig::with_arenas(1).is_ok());
    }

    #[test]
    fn test_resize_factor_bounds() {
        let mut config = ArenaConfig::default();
        config.resize_factor = 1.0;
        assert!(config.validate().is_err());
        config.resize_factor = 0.5;
        assert!(config.validate().is_err());
        config.resize_factor = f64::NAN;
        assert!(config.validate().is_err());
        config.resize_factor = 2.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_min_page_size_floor() {
        let mut config = ArenaConfig::default();
        config.min_page_size = 0;
        assert!(config.validate().is_err());
        config.min_page_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = ArenaConfig::from_toml_str(
            r#"
            arena_count = 4
            resize_factor = 1.5
            teardown = "abandon"
            "#,
        )
        .unwrap();
        assert_eq!(config.arena_count, 4);
        assert_eq!(config.teardown, TeardownPolicy::Abandon);

        // Defaults fill missing fields.
        let config = ArenaConfig::from_toml_str("arena_count = 2").unwrap();
        assert_eq!(config.resize_factor, 1.1);

        // Unknown fields are a config error, not a silent ignore.
        assert!(ArenaConfig::from_toml_str("arena_cuont = 2").is_err());

        // Parsed configs are still validated.
        assert!(ArenaConfig::from_toml_str("arena_count = 0").is_err());
    }
}
