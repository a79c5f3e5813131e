//! TTL key/value cache with a networked primary and an in-process fallback.
//!
//! [`CacheLayer`] is the only type callers touch. It fronts two backends
//! sharing one contract (set-with-expiry, exists, get, prefix scan, bulk
//! delete): a Redis connection established at startup with bounded retry,
//! and a plain in-memory map. Any primary failure flips a health flag and
//! reroutes to the map — cache trouble is never a business failure, so no
//! public operation here returns a backend error.
//!
//! [`AlertCache`] and [`StatsRecorder`] are the two domain wrappers the
//! alert engine uses on top of the layer.

pub mod alerts;
pub mod error;
pub mod layer;
pub mod memory;
pub mod redis_backend;
pub mod stats;

pub use alerts::AlertCache;
pub use error::CacheError;
pub use layer::CacheLayer;
pub use memory::MemoryCache;
pub use stats::StatsRecorder;
