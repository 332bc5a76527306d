//! Connection, link, and channel management for the wisp comms plugin.
//!
//! [`CommsPlugin`] is the entry point: the host calls its operations, and
//! it reports every lifecycle change back through [`wisp_common::CommsSdk`].

pub mod channels;
pub mod dispatch;
pub mod error;
pub mod links;
pub mod plugin;
pub mod properties;
pub mod registry;

pub use {
    channels::{Activation, ChannelManager, InputOutcome, InputPurpose},
    dispatch::ReceiveDispatcher,
    error::{Error, Result},
    links::{Link, LinkStore},
    plugin::CommsPlugin,
    properties::default_link_properties,
    registry::{ClosedConnection, ConnectionRegistry, OpenedConnection},
};
