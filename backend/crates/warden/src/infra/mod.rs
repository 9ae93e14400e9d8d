//! Infrastructure Layer
//!
//! Storage backends and the two session store variants.

pub mod distributed_session;
pub mod local_session;
pub mod memory;
pub mod metadata;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store_cache;

// Re-exports
pub use distributed_session::{DistributedSessionStore, ReconcileReport};
pub use local_session::InProcessSessionStore;
pub use memory::{Expiry, MemoryCache, MemoryStore};
pub use metadata::StaticMetadataProvider;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use store_cache::StoreCache;
