use clap::Parser;
use orchestrator::config::{Config, CoordinationBackend};
use orchestrator::membership::StaticList;
use rb_registry::{Registry, ScheduleChannel};
use tracing_subscriber::EnvFilter;

/// The original orchestrator panics if it can't build its cluster
/// client, and is expected to be supervised and restarted (spec §7).
/// This binary keeps that policy literally: no error here is caught,
/// `main` just propagates with `?` and lets the process exit non-zero.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let (registry, schedule) = match config.coordination {
        CoordinationBackend::Mem => (
            Registry::in_memory(),
            ScheduleChannel::Memory(rb_registry::MemoryScheduleChannel::new()),
        ),
        CoordinationBackend::Redis => {
            let client = redis::Client::open(config.redis_url.clone())?;
            let registry = Registry::connect_redis(client.clone()).await?;
            (registry, ScheduleChannel::Redis(rb_registry::RedisScheduleChannel::new(client)))
        }
    };

    let membership = StaticList::new(config.backends);
    orchestrator::discovery::run(membership, registry, schedule).await?;
    Ok(())
}
