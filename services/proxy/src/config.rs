use clap::Parser;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum RegistryBackend {
    Mem,
    Redis,
}

#[derive(Debug, Parser)]
#[command(name = "proxy", about = "Reverse proxy fronting the room broker backends")]
pub struct Config {
    #[arg(long, env = "PROXY_BIND_ADDR", default_value = "0.0.0.0:8082")]
    pub bind_addr: String,

    #[arg(long, env = "PROXY_REGISTRY", value_enum, default_value_t = RegistryBackend::Mem)]
    pub registry: RegistryBackend,

    #[arg(long, env = "PROXY_REDIS_URL", default_value = "redis://127.0.0.1/")]
    pub redis_url: String,
}
