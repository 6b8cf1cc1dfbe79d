use clap::Parser;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CoordinationBackend {
    Mem,
    Redis,
}

#[derive(Debug, Parser)]
#[command(name = "orchestrator", about = "Backend discovery and Registry refresh loop")]
pub struct Config {
    #[arg(long, env = "ORCHESTRATOR_COORDINATION", value_enum, default_value_t = CoordinationBackend::Mem)]
    pub coordination: CoordinationBackend,

    #[arg(long, env = "ORCHESTRATOR_REDIS_URL", default_value = "redis://127.0.0.1/")]
    pub redis_url: String,

    /// Static backend list (comma-separated `host:port`). Stands in
    /// for the Kubernetes label-selector pod listing, which is out of
    /// scope for this system (see spec §1's "abstract membership
    /// source").
    #[arg(long, env = "ORCHESTRATOR_BACKENDS", value_delimiter = ',')]
    pub backends: Vec<String>,
}
