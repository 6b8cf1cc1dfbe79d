use clap::Parser;
use rb_registry::{Registry, ScheduleChannel};
use scheduler::config::{Config, CoordinationBackend};
use scheduler::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
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
            let client = redis::Client::open(config.redis_url.clone()).expect("invalid redis url");
            let registry = Registry::connect_redis(client.clone())
                .await
                .expect("failed to connect to redis");
            (registry, ScheduleChannel::Redis(rb_registry::RedisScheduleChannel::new(client)))
        }
    };

    let state = AppState::new(registry, schedule).await;
    let router = scheduler::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %config.bind_addr, "scheduler listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("scheduler shut down gracefully");
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
