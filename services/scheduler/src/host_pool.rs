//! The scheduler's view of the live backend set: a plain round-robin
//! pool, rebuilt wholesale every time a fresh `ScheduleInfo` arrives on
//! the `schedule` channel. `Compact` is a reserved strategy variant
//! with no behaviour; `Balance` is the only one ever wired up, so the
//! pool itself doesn't need to know the strategy at all.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct HostPool {
    hosts: RwLock<Vec<String>>,
    next: AtomicUsize,
}

impl HostPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rebuild(&self, mut hosts: Vec<String>) {
        hosts.sort();
        *self.hosts.write().await = hosts;
    }

    /// Round-robins over the current host set. `None` means no
    /// backend has ever been reported by the orchestrator.
    pub async fn next_backend(&self) -> Option<String> {
        let hosts = self.hosts.read().await;
        if hosts.is_empty() {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % hosts.len();
        Some(hosts[i].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_robins_over_rebuilt_hosts() {
        let pool = HostPool::new();
        pool.rebuild(vec!["a".into(), "b".into()]).await;
        let picks: Vec<_> = collect_picks(&pool, 4).await;
        assert_eq!(picks, vec!["a", "b", "a", "b"]);
    }

    async fn collect_picks(pool: &HostPool, n: usize) -> Vec<String> {
        let mut out = Vec::new();
        for _ in 0..n {
            out.push(pool.next_backend().await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn empty_pool_yields_none() {
        let pool = HostPool::new();
        assert_eq!(pool.next_backend().await, None);
    }
}
