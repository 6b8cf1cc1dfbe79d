use std::sync::Arc;

use rb_registry::{Registry, ScheduleChannel};
use tracing::{info, warn};

use crate::host_pool::HostPool;

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub http: reqwest::Client,
    pub pool: Arc<HostPool>,
}

impl AppState {
    /// Builds the scheduler state and spawns the `schedule` channel
    /// subscription that rebuilds the host pool on every
    /// orchestrator-published `ScheduleInfo`.
    pub async fn new(registry: Registry, schedule: ScheduleChannel) -> Self {
        let pool = Arc::new(HostPool::new());
        let mut rx = match schedule.subscribe().await {
            Ok(rx) => rx,
            Err(err) => {
                warn!(%err, "failed to subscribe to schedule channel at startup");
                let state = Self {
                    registry,
                    http: reqwest::Client::new(),
                    pool,
                };
                return state;
            }
        };

        let subscribed_pool = pool.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(info) => {
                        let hosts: Vec<String> = info.backends.keys().cloned().collect();
                        info!(n_backends = hosts.len(), strategy = ?info.strategy, "rebuilding host pool");
                        subscribed_pool.rebuild(hosts).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "schedule channel subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            registry,
            http: reqwest::Client::new(),
            pool,
        }
    }
}
