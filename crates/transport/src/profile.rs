//! Link address profiles.
//!
//! A link's address is a JSON document that both ends exchange out of band.
//! Direct links carry `{"hostname", "port"}`; whiteboard links carry
//! `{"hostname", "port", "hashtag", "checkFrequency"}`.

use std::{fmt, time::Duration};

use {
    serde::{Deserialize, Serialize},
    wisp_common::TransmissionType,
};

use crate::{Error, Result};

/// Which physical transport a link uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Direct,
    Whiteboard,
}

impl TransportKind {
    pub fn transmission_type(self) -> TransmissionType {
        match self {
            Self::Direct => TransmissionType::Unicast,
            Self::Whiteboard => TransmissionType::Multicast,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Whiteboard => "whiteboard",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint of a direct socket link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectProfile {
    pub hostname: String,
    pub port: u16,
}

impl DirectProfile {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    /// `host:port`, suitable for dialing or binding.
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Mailbox on a whiteboard server plus the interval it is polled at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhiteboardProfile {
    pub hostname: String,
    pub port: u16,
    pub hashtag: String,
    #[serde(rename = "checkFrequency")]
    pub check_frequency_ms: u64,
}

impl WhiteboardProfile {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.hostname, self.port)
    }

    /// Poll interval, never shorter than one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.check_frequency_ms.max(1))
    }
}

/// Parsed link address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkProfile {
    Direct(DirectProfile),
    Whiteboard(WhiteboardProfile),
}

impl LinkProfile {
    /// Parse an address document for the given transport kind.
    pub fn parse(kind: TransportKind, address: &str) -> Result<Self> {
        let invalid = |source: serde_json::Error| Error::InvalidProfile {
            kind: kind.as_str(),
            source,
        };
        Ok(match kind {
            TransportKind::Direct => Self::Direct(serde_json::from_str(address).map_err(invalid)?),
            TransportKind::Whiteboard => {
                Self::Whiteboard(serde_json::from_str(address).map_err(invalid)?)
            },
        })
    }

    /// Serialize back into the address document handed to peers.
    pub fn to_address(&self) -> Result<String> {
        Ok(match self {
            Self::Direct(p) => serde_json::to_string(p)?,
            Self::Whiteboard(p) => serde_json::to_string(p)?,
        })
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Direct(_) => TransportKind::Direct,
            Self::Whiteboard(_) => TransportKind::Whiteboard,
        }
    }
}

impl From<DirectProfile> for LinkProfile {
    fn from(p: DirectProfile) -> Self {
        Self::Direct(p)
    }
}

impl From<WhiteboardProfile> for LinkProfile {
    fn from(p: WhiteboardProfile) -> Self {
        Self::Whiteboard(p)
    }
}
