//! Update-check response cache for Courier.
//!
//! The cache is optional: when disabled, `from_config` returns `None` and
//! the resolver always recomputes. Cache failures are never surfaced to
//! callers of the HTTP API; the server logs and falls through to the
//! metadata store.

pub mod error;
pub mod memory;
pub mod redis;
pub mod traits;

pub use crate::redis::RedisCache;
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use traits::ResponseCache;

use courier_core::config::CacheConfig;
use std::sync::Arc;

/// Create a response cache from configuration. `Disabled` yields `None`.
pub async fn from_config(config: &CacheConfig) -> CacheResult<Option<Arc<dyn ResponseCache>>> {
    match config {
        CacheConfig::Disabled => Ok(None),
        CacheConfig::Memory => Ok(Some(Arc::new(MemoryCache::new()))),
        CacheConfig::Redis { url } => {
            let cache = RedisCache::connect(url).await?;
            Ok(Some(Arc::new(cache)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_config_disabled_yields_none() {
        assert!(
            from_config(&CacheConfig::Disabled)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn from_config_memory_round_trips() {
        let cache = from_config(&CacheConfig::Memory).await.unwrap().unwrap();
        cache.set("key", "value").await.unwrap();
        assert_eq!(cache.get("key").await.unwrap().as_deref(), Some("value"));
        assert_eq!(cache.get("other").await.unwrap(), None);
    }
}
