//! Response cache trait definition.

use crate::error::CacheResult;
use async_trait::async_trait;

/// Cache for serialized update-check responses.
///
/// Keys are the stringified query tuple
/// `app_name=<a>&version=<v>&channel=<c>&platform=<p>&arch=<r>`; a publish
/// for `(a, c)` invalidates every key matching
/// `app_name=<a>&version=*&channel=<c>&platform=*&arch=*`.
#[async_trait]
pub trait ResponseCache: Send + Sync + 'static {
    /// Look up a cached response.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a response.
    async fn set(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Delete every key matching a glob pattern (`*` wildcards). Missing
    /// keys are a no-op. Returns the number of keys deleted.
    async fn delete_matching(&self, pattern: &str) -> CacheResult<u64>;

    /// Get the name of this cache backend. Used for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify cache connectivity.
    async fn health_check(&self) -> CacheResult<()> {
        Ok(())
    }
}
