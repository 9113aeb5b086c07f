use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Timers driving the liveness supervisor
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessConfig {
    /// How often every registered connection is pinged
    pub ping_interval: Duration,
    /// How often stale connections are swept
    pub sweep_interval: Duration,
    /// How long a connection may stay silent before it is evicted
    pub stale_timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            stale_timeout: Duration::from_secs(60),
        }
    }
}

/// Process-level configuration for the relay hub
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    pub host: String,
    pub port: u16,
    /// Path the WebSocket endpoint is mounted on
    pub ws_path: String,
    pub liveness: LivenessConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ws_path: "/racing".to_string(),
            liveness: LivenessConfig::default(),
        }
    }
}

impl HubConfig {
    /// Reads configuration from `RELAY_*` environment variables, falling back
    /// to defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let ws_path = lookup("RELAY_WS_PATH")
            .map(|path| {
                if path.starts_with('/') {
                    path
                } else {
                    format!("/{}", path)
                }
            })
            .unwrap_or(defaults.ws_path);

        Self {
            host: lookup("RELAY_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "RELAY_PORT", defaults.port),
            ws_path,
            liveness: LivenessConfig {
                ping_interval: Duration::from_secs(parse_or(
                    &lookup,
                    "RELAY_PING_INTERVAL_SECS",
                    defaults.liveness.ping_interval.as_secs(),
                )),
                sweep_interval: Duration::from_secs(parse_or(
                    &lookup,
                    "RELAY_SWEEP_INTERVAL_SECS",
                    defaults.liveness.sweep_interval.as_secs(),
                )),
                stale_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "RELAY_STALE_TIMEOUT_SECS",
                    defaults.liveness.stale_timeout.as_secs(),
                )),
            },
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = %key, value = %raw, "Ignoring unparsable config value");
                default
            }
        },
        None => default,
    }
}
