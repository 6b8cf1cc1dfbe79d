//! The 30s discovery loop: enumerate live backends, scrape each for
//! its current room list to refresh the Registry, then publish the
//! backend set on the `schedule` channel so the scheduler can rebuild
//! its host pool.

use std::collections::HashMap;
use std::time::Duration;

use rb_protocol::rest::{ScheduleInfo, SchedulingStrategy, ServerInfoMsg};
use rb_registry::{Registry, ScheduleChannel};
use tracing::{info, warn};

use crate::membership::{MembershipError, MembershipSource};

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// One discovery pass. Only the membership source itself is treated
/// as fatal (propagated to the caller, who lets the process die and
/// restart under supervision, per the original's
/// cluster-client-build-failure panic policy); a single backend being
/// unreachable for its `/server` scrape just means that backend's
/// rooms aren't refreshed this round, matching the original's
/// `continue`-on-error loop body.
pub async fn discover_once(
    membership: &impl MembershipSource,
    registry: &Registry,
    schedule: &ScheduleChannel,
    http: &reqwest::Client,
) -> Result<(), MembershipError> {
    let hosts = membership.list_backends().await?;
    let mut backends = HashMap::with_capacity(hosts.len());

    for host in &hosts {
        match http.get(format!("http://{host}/server")).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<ServerInfoMsg>().await {
                Ok(info) => {
                    for room_id in info.rooms {
                        if let Err(err) = registry.set(&room_id, host).await {
                            warn!(%err, room_id, backend = %host, "failed to refresh registry entry");
                        }
                    }
                }
                Err(err) => warn!(%err, backend = %host, "malformed /server response"),
            },
            Ok(resp) => warn!(status = %resp.status(), backend = %host, "non-2xx from /server scrape"),
            Err(err) => warn!(%err, backend = %host, "backend unreachable during scrape"),
        }
        backends.insert(host.clone(), 1.0);
    }

    info!(n_backends = backends.len(), "publishing schedule info");
    schedule.publish(ScheduleInfo {
        backends,
        strategy: SchedulingStrategy::Balance,
    });
    Ok(())
}

/// Runs [`discover_once`] on a fixed cadence, forever. Returns only on
/// a membership-source error, which `main` propagates with `?` to exit
/// the process non-zero for its supervisor to restart.
pub async fn run(
    membership: impl MembershipSource,
    registry: Registry,
    schedule: ScheduleChannel,
) -> Result<(), MembershipError> {
    let http = reqwest::Client::new();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        discover_once(&membership, &registry, &schedule, &http).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::StaticList;
    use rb_registry::MemoryScheduleChannel;

    #[tokio::test]
    async fn publishes_empty_schedule_with_no_backends() {
        let membership = StaticList::new(vec![]);
        let registry = Registry::in_memory();
        let schedule = ScheduleChannel::Memory(MemoryScheduleChannel::new());
        let mut rx = schedule.subscribe().await.unwrap();
        let http = reqwest::Client::new();

        discover_once(&membership, &registry, &schedule, &http)
            .await
            .unwrap();

        let info = rx.recv().await.unwrap();
        assert!(info.backends.is_empty());
    }
}
