use std::time::Duration;

use wisp_config::CommsConfig;

/// Process-wide knobs shared by every transport instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Host the direct listener binds to instead of the link hostname.
    pub bind_address: Option<String>,
    /// Bound on dial + write + shutdown for one direct package.
    pub write_timeout: Duration,
    /// Bound on reading one inbound direct package.
    pub read_timeout: Duration,
    pub max_payload_bytes: u64,
    /// Timeout for every whiteboard HTTP request.
    pub http_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from_config(&CommsConfig::default())
    }
}

impl TransportSettings {
    pub fn from_config(config: &CommsConfig) -> Self {
        Self {
            bind_address: config.direct.bind_address.clone(),
            write_timeout: Duration::from_millis(config.direct.write_timeout_ms),
            read_timeout: Duration::from_millis(config.direct.read_timeout_ms),
            max_payload_bytes: config.direct.max_payload_bytes,
            http_timeout: Duration::from_millis(config.indirect.http_timeout_ms),
        }
    }
}
