//! The discovery loop's view of "which backend pods currently exist".
//! Kubernetes pod listing (the production source) is explicitly out of
//! scope for this system; `MembershipSource` is the seam a real
//! cluster-API implementation plugs into later, the same way the
//! teacher's `forwarder::discovery` narrows target expansion behind a
//! small function boundary rather than hard-coding it into the poll
//! loop.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("membership source unavailable: {0}")]
    Unavailable(String),
}

pub trait MembershipSource: Send + Sync {
    fn list_backends(&self) -> impl Future<Output = Result<Vec<String>, MembershipError>> + Send;
}

/// A fixed backend list behind a lock, mutable so tests (and local
/// development) can simulate scale-up/down between polls without a
/// real cluster.
#[derive(Clone, Default)]
pub struct StaticList {
    hosts: Arc<RwLock<Vec<String>>>,
}

impl StaticList {
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts: Arc::new(RwLock::new(hosts)),
        }
    }

    pub async fn set(&self, hosts: Vec<String>) {
        *self.hosts.write().await = hosts;
    }
}

impl MembershipSource for StaticList {
    async fn list_backends(&self) -> Result<Vec<String>, MembershipError> {
        Ok(self.hosts.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_the_current_host_list() {
        let source = StaticList::new(vec!["a:8080".into()]);
        assert_eq!(source.list_backends().await.unwrap(), vec!["a:8080"]);
        source.set(vec!["a:8080".into(), "b:8080".into()]).await;
        assert_eq!(
            source.list_backends().await.unwrap(),
            vec!["a:8080", "b:8080"]
        );
    }
}
