use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process registry with no TTL; entries live until explicitly
/// deleted. Used by tests and by single-process deployments where the
/// registry doesn't need to survive the backend.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: &str) {
        self.inner
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn del(&self, key: &str) {
        self.inner.write().await.remove(key);
    }
}
