use std::time::Duration;

use clap::Parser;

const DEFAULT_MASTERLESS_TIMEOUT_SECS: u64 = 5 * 60;

#[derive(Debug, Parser)]
#[command(name = "backend", about = "Synchronised playback session backend")]
pub struct Config {
    #[arg(long, env = "BACKEND_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// Overridable so integration tests can exercise the masterless
    /// shutdown path without waiting five minutes.
    #[arg(long, env = "BACKEND_MASTERLESS_TIMEOUT_SECS", default_value_t = DEFAULT_MASTERLESS_TIMEOUT_SECS)]
    pub masterless_timeout_secs: u64,
}

impl Config {
    pub fn masterless_timeout(&self) -> Duration {
        Duration::from_secs(self.masterless_timeout_secs)
    }
}
