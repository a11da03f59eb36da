use serde::Deserialize;

/// Settings every service shares: where to listen.
///
/// Port 0 asks the OS for a free port, which the integration test harness
/// relies on.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Read host/port from `<PREFIX>_HOST` / `<PREFIX>_PORT` env vars,
    /// falling back to the defaults.
    pub fn from_env(prefix: &str) -> Self {
        let host = std::env::var(format!("{prefix}_HOST")).unwrap_or_else(|_| default_host());
        let port = std::env::var(format!("{prefix}_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(default_port);
        Self { host, port }
    }
}
