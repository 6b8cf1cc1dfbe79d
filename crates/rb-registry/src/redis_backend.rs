use crate::{RegistryError, REGISTRY_TTL_SECS};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

/// Remote registry backend. Every `set` re-arms a fixed 5 minute TTL;
/// an unrefreshed entry simply falls out of Redis and `get` reports it
/// as missing, matching "rooms whose entries expire become unreachable".
///
/// `MultiplexedConnection` is cheap to clone and pipelines concurrent
/// callers over one socket, so `Registry::Redis` can be cloned freely
/// into every handler without a connection pool.
#[derive(Clone)]
pub struct RedisRegistry {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisRegistry {
    /// Dials `client` once; the returned connection is reused (and
    /// internally reconnects) for the lifetime of the registry.
    pub async fn connect(client: redis::Client) -> Result<Self, RegistryError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { client, conn })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, RegistryError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, REGISTRY_TTL_SECS).await?;
        Ok(())
    }

    pub async fn del(&self, key: &str) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    pub fn client(&self) -> &redis::Client {
        &self.client
    }
}
