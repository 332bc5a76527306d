//! Status enums and property records exchanged with the host runtime.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Opaque correlation token issued by the host for asynchronous requests.
pub type RaceHandle = u64;

/// Handle used for events that do not answer a host request.
pub const NULL_HANDLE: RaceHandle = 0;

/// Direction of traffic a link or connection supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    #[default]
    Undef,
    Send,
    #[serde(rename = "receive")]
    Recv,
    #[serde(rename = "bidirectional")]
    Bidi,
}

impl LinkType {
    /// Whether a connection of this type runs a receive loop.
    pub fn receives(self) -> bool {
        matches!(self, Self::Recv | Self::Bidi)
    }

    /// Whether packages may be sent on a connection of this type.
    pub fn sends(self) -> bool {
        matches!(self, Self::Send | Self::Bidi)
    }

    /// Whether a link of this type can carry a connection of type `requested`.
    ///
    /// Bidirectional links accept any defined request; otherwise the types
    /// must match.
    pub fn accepts(self, requested: LinkType) -> bool {
        if requested == Self::Undef {
            return false;
        }
        match self {
            Self::Bidi => true,
            Self::Send | Self::Recv => self == requested,
            Self::Undef => false,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undef => "undef",
            Self::Send => "send",
            Self::Recv => "receive",
            Self::Bidi => "bidirectional",
        })
    }
}

impl FromStr for LinkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send" => Ok(Self::Send),
            "receive" | "recv" => Ok(Self::Recv),
            "bidirectional" | "bidi" => Ok(Self::Bidi),
            other => Err(Error::unknown_variant("link type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransmissionType {
    #[default]
    Undef,
    Unicast,
    Multicast,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Undef,
    Direct,
    Indirect,
    Mixed,
    Local,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendType {
    #[default]
    Undef,
    StoredAsync,
    EphemSync,
}

/// Which side of a channel creates links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    #[default]
    Undef,
    CreatorToLoader,
    LoaderToCreator,
    Bidi,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Undef,
    Available,
    Unavailable,
    Enabled,
    Disabled,
    Starting,
    Failed,
    Unsupported,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undef => "undef",
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Starting => "starting",
            Self::Failed => "failed",
            Self::Unsupported => "unsupported",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Created,
    Loaded,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Open,
    Closed,
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Sent,
    Received,
    FailedGeneric,
    FailedNetworkError,
    FailedTimeout,
}

/// Performance estimate for one direction of a link.
///
/// `-1` means "unknown" for every field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkPropertySet {
    pub bandwidth_bps: i32,
    pub latency_ms: i32,
    pub loss: f32,
}

impl Default for LinkPropertySet {
    fn default() -> Self {
        Self {
            bandwidth_bps: -1,
            latency_ms: -1,
            loss: -1.0,
        }
    }
}

impl LinkPropertySet {
    pub fn new(bandwidth_bps: i32, latency_ms: i32, loss: f32) -> Self {
        Self {
            bandwidth_bps,
            latency_ms,
            loss,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkPropertyPair {
    pub send: LinkPropertySet,
    pub receive: LinkPropertySet,
}

impl LinkPropertyPair {
    /// Same estimate in both directions.
    pub fn symmetric(set: LinkPropertySet) -> Self {
        Self {
            send: set,
            receive: set,
        }
    }
}

/// Mutable description of a link reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkProperties {
    pub link_type: LinkType,
    pub transmission_type: TransmissionType,
    pub connection_type: ConnectionType,
    pub send_type: SendType,
    pub reliable: bool,
    pub is_flushable: bool,
    pub duration_s: i32,
    pub period_s: i32,
    pub mtu: i32,
    pub worst: LinkPropertyPair,
    pub best: LinkPropertyPair,
    pub expected: LinkPropertyPair,
    pub supported_hints: Vec<String>,
    pub channel_gid: String,
    pub link_address: String,
}

impl Default for LinkProperties {
    fn default() -> Self {
        Self {
            link_type: LinkType::Undef,
            transmission_type: TransmissionType::Undef,
            connection_type: ConnectionType::Undef,
            send_type: SendType::Undef,
            reliable: false,
            is_flushable: false,
            duration_s: -1,
            period_s: -1,
            mtu: -1,
            worst: LinkPropertyPair::default(),
            best: LinkPropertyPair::default(),
            expected: LinkPropertyPair::default(),
            supported_hints: Vec::new(),
            channel_gid: String::new(),
            link_address: String::new(),
        }
    }
}

/// Static description of a channel, owned by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelProperties {
    pub channel_gid: String,
    pub link_direction: LinkDirection,
    pub transmission_type: TransmissionType,
    pub connection_type: ConnectionType,
    pub send_type: SendType,
    pub reliable: bool,
    pub is_flushable: bool,
    pub duration_s: i32,
    pub period_s: i32,
    pub mtu: i32,
    pub creator_expected: LinkPropertyPair,
    pub loader_expected: LinkPropertyPair,
    pub supported_hints: Vec<String>,
    pub max_links: i32,
    pub current_role: String,
}

impl Default for ChannelProperties {
    fn default() -> Self {
        Self {
            channel_gid: String::new(),
            link_direction: LinkDirection::Undef,
            transmission_type: TransmissionType::Undef,
            connection_type: ConnectionType::Undef,
            send_type: SendType::Undef,
            reliable: false,
            is_flushable: false,
            duration_s: -1,
            period_s: -1,
            mtu: -1,
            creator_expected: LinkPropertyPair::default(),
            loader_expected: LinkPropertyPair::default(),
            supported_hints: Vec::new(),
            max_links: -1,
            current_role: String::new(),
        }
    }
}
