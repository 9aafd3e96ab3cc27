use clap::Parser;
use std::time::Duration;

/// Fact-or-fiction game server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value = "256")]
    pub max_clients: usize,

    /// Seconds of silence before a client is treated as disconnected
    #[arg(long, default_value = "15")]
    pub client_timeout_secs: u64,

    /// How often room countdowns are checked, in milliseconds
    #[arg(long, default_value = "100")]
    pub poll_interval_ms: u64,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero interval would make tokio's interval panic
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_clients: 256,
            client_timeout_secs: 15,
            poll_interval_ms: 100,
        }
    }
}
