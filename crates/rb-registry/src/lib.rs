// rb-registry: the roomID -> backendHost TTL map shared by the
// scheduler, orchestrator, and reverse proxy, plus the `schedule`
// pub/sub channel that ties the orchestrator to the scheduler.

mod memory;
mod redis_backend;
mod schedule;

pub use memory::MemoryRegistry;
pub use redis_backend::RedisRegistry;
pub use schedule::{MemoryScheduleChannel, RedisScheduleChannel, ScheduleChannel};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// Fixed TTL applied by the remote registry backend; entries not
/// refreshed within this window are forgotten.
pub const REGISTRY_TTL_SECS: u64 = 5 * 60;

/// `roomID -> backendHost` with a uniform contract across an in-memory
/// (no TTL, used in tests) and a remote (fixed 5 min TTL) backend.
///
/// An enum rather than a trait object: this workspace's dependency
/// stack has no `async-trait`-style crate, and the set of backends is
/// closed and small, so a plain `match` on an inherent async method is
/// the simplest idiomatic shape.
#[derive(Clone)]
pub enum Registry {
    Memory(MemoryRegistry),
    Redis(RedisRegistry),
}

impl Registry {
    pub fn in_memory() -> Self {
        Registry::Memory(MemoryRegistry::new())
    }

    pub async fn connect_redis(client: redis::Client) -> Result<Self, RegistryError> {
        Ok(Registry::Redis(RedisRegistry::connect(client).await?))
    }

    /// Look up `key`; `None` means missing or expired.
    pub async fn get(&self, key: &str) -> Result<Option<String>, RegistryError> {
        match self {
            Registry::Memory(m) => Ok(m.get(key).await),
            Registry::Redis(r) => r.get(key).await,
        }
    }

    /// Set `key` to `value`, re-arming the TTL on remote backends.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), RegistryError> {
        match self {
            Registry::Memory(m) => {
                m.set(key, value).await;
                Ok(())
            }
            Registry::Redis(r) => r.set(key, value).await,
        }
    }

    pub async fn del(&self, key: &str) -> Result<(), RegistryError> {
        match self {
            Registry::Memory(m) => {
                m.del(key).await;
                Ok(())
            }
            Registry::Redis(r) => r.del(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips() {
        let reg = Registry::in_memory();
        assert_eq!(reg.get("r1").await.unwrap(), None);
        reg.set("r1", "10.0.0.1:8081").await.unwrap();
        assert_eq!(reg.get("r1").await.unwrap(), Some("10.0.0.1:8081".into()));
        reg.del("r1").await.unwrap();
        assert_eq!(reg.get("r1").await.unwrap(), None);
    }
}
