//! Configuration schema with defaults.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommsConfig {
    pub direct: DirectConfig,
    pub indirect: IndirectConfig,
}

/// Direct (socket) channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectConfig {
    /// Channel group ID announced to the host.
    pub channel_gid: String,
    /// Hostname used for new links until the user answers the hostname request.
    pub default_hostname: String,
    /// First port handed out to created links, unless the user supplies one.
    pub start_port: u16,
    /// Address the receive listener binds to instead of the link hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
    /// Upper bound on dial + write + shutdown for one outbound package (ms).
    pub write_timeout_ms: u64,
    /// Upper bound on reading one inbound package from a peer (ms).
    pub read_timeout_ms: u64,
    /// Largest inbound package accepted; bigger ones are dropped.
    pub max_payload_bytes: u64,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            channel_gid: "wispDirect".into(),
            default_hostname: "no-hostname-provided-by-user".into(),
            start_port: 10_000,
            bind_address: None,
            write_timeout_ms: 10_000,
            read_timeout_ms: 10_000,
            max_payload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Indirect (whiteboard mailbox) channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndirectConfig {
    /// Channel group ID announced to the host.
    pub channel_gid: String,
    pub whiteboard_hostname: String,
    pub whiteboard_port: u16,
    /// Poll interval written into created link profiles (ms).
    pub check_frequency_ms: u64,
    /// Prefix of generated hashtags: `<prefix>_<persona>_<n>`.
    pub hashtag_prefix: String,
    /// Timeout applied to every whiteboard HTTP request (ms).
    pub http_timeout_ms: u64,
}

impl Default for IndirectConfig {
    fn default() -> Self {
        Self {
            channel_gid: "wispIndirect".into(),
            whiteboard_hostname: "whiteboard".into(),
            whiteboard_port: 5000,
            check_frequency_ms: 1000,
            hashtag_prefix: "wisp".into(),
            http_timeout_ms: 10_000,
        }
    }
}

impl CommsConfig {
    /// Reject values the transports cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.direct.channel_gid.is_empty() {
            return Err(Error::invalid("direct.channel_gid", "must not be empty"));
        }
        if self.indirect.channel_gid.is_empty() {
            return Err(Error::invalid("indirect.channel_gid", "must not be empty"));
        }
        if self.direct.channel_gid == self.indirect.channel_gid {
            return Err(Error::invalid(
                "indirect.channel_gid",
                format!("duplicates direct channel GID {}", self.direct.channel_gid),
            ));
        }
        if self.direct.write_timeout_ms == 0 {
            return Err(Error::invalid("direct.write_timeout_ms", "must be positive"));
        }
        if self.direct.read_timeout_ms == 0 {
            return Err(Error::invalid("direct.read_timeout_ms", "must be positive"));
        }
        if self.direct.max_payload_bytes == 0 {
            return Err(Error::invalid("direct.max_payload_bytes", "must be positive"));
        }
        if self.indirect.check_frequency_ms == 0 {
            return Err(Error::invalid("indirect.check_frequency_ms", "must be positive"));
        }
        if self.indirect.http_timeout_ms == 0 {
            return Err(Error::invalid("indirect.http_timeout_ms", "must be positive"));
        }
        if self.indirect.hashtag_prefix.is_empty() {
            return Err(Error::invalid("indirect.hashtag_prefix", "must not be empty"));
        }
        Ok(())
    }
}
