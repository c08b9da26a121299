//! Metadata cache seam
//!
//! The change poller pushes every discovered or updated object through
//! `Cache::store`. Implementations must treat `store` as an idempotent upsert
//! keyed by object id: consecutive poller checkpoint windows overlap, so
//! the same object may be reported on consecutive ticks.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::RwLock;
use tracing::debug;

use crate::{ApiObject, Result};

/// Receiver of object updates.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Cache>`).
pub trait Cache: Send + Sync {
    /// Insert or replace the object stored under `object.id`.
    fn store(&self, object: ApiObject) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// In-process cache keyed by object id.
///
/// Used by the gateway service to back its health report and by tests.
#[derive(Default)]
pub struct MemoryCache {
    objects: RwLock<HashMap<String, ApiObject>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of a cached object.
    pub async fn get(&self, id: &str) -> Option<ApiObject> {
        self.objects.read().await.get(id).cloned()
    }

    /// Number of cached objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Cache for MemoryCache {
    fn store(&self, object: ApiObject) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut objects = self.objects.write().await;
            let replaced = objects.insert(object.id.clone(), object).is_some();
            debug!(replaced, "cache upsert");
            Ok(())
        })
    }
}
