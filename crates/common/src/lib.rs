//! Shared types, the host SDK interface, and error definitions used across all wisp crates.

pub mod error;
pub mod sdk;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    sdk::{CommsSdk, PluginConfig, SdkResponse, SdkStatus, UserDisplayType},
    types::{
        ChannelProperties, ChannelStatus, ConnectionStatus, ConnectionType, LinkDirection,
        LinkProperties, LinkPropertyPair, LinkPropertySet, LinkStatus, LinkType, NULL_HANDLE,
        PackageStatus, RaceHandle, SendType, TransmissionType,
    },
};
