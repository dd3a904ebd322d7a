//! Cached data access over the API client
//!
//! The browser dashboard this service descends from leaned on a query cache
//! for deduplication and staleness control; this module is the same idea as
//! a library: keyed cache entries with per-class TTLs, coalescing of
//! identical in-flight requests, and explicit invalidation on mutations.

mod cache;
mod client;
mod key;

pub use cache::{QueryCache, QueryResult};
pub use client::{MutationKind, QueryClient, StockOverview};
pub use key::{keys, QueryKey};
