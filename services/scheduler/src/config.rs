use clap::Parser;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CoordinationBackend {
    Mem,
    Redis,
}

#[derive(Debug, Parser)]
#[command(name = "scheduler", about = "Room-creation load balancer")]
pub struct Config {
    #[arg(long, env = "SCHEDULER_BIND_ADDR", default_value = "0.0.0.0:8083")]
    pub bind_addr: String,

    /// Selects both the Registry and the `schedule` pub/sub channel
    /// backend; in a real deployment the scheduler and orchestrator
    /// always agree on this.
    #[arg(long, env = "SCHEDULER_COORDINATION", value_enum, default_value_t = CoordinationBackend::Mem)]
    pub coordination: CoordinationBackend,

    #[arg(long, env = "SCHEDULER_REDIS_URL", default_value = "redis://127.0.0.1/")]
    pub redis_url: String,
}
