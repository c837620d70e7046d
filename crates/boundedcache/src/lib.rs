//! # boundedcache
//!
//! LRU cache bounded by entry count and an optional weight budget.
//!
//! ## Architecture
//! - **HashMap**: AHash forward index from key to node slot (O(1))
//! - **Recency list**: index-linked doubly-linked list, LRU at the tail (O(1))
//! - **Weight budget**: caller-supplied weigher, tail eviction until the total fits
//! - **Release hook**: every value leaving the cache is handed back exactly once
//!
//! The cache is not internally synchronized; wrap it in a lock to share it.

#![warn(missing_docs)]

mod bounded;
mod error;
mod stats;

pub use bounded::{BoundedCache, CacheBuilder, Iter};
pub use error::{Error, Result};
pub use stats::{CacheStats, StatsSnapshot};
