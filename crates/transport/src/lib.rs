//! Physical transports for wisp links.
//!
//! A transport performs the actual I/O for one link and may be shared by
//! several logical connections. Two variants implement [`Transport`]:
//! [`DirectTransport`] (one TCP dial per package, a listener for inbound
//! packages) and [`WhiteboardTransport`] (an HTTP mailbox polled on an
//! interval).

pub mod direct;
pub mod error;
pub mod ids;
pub mod indirect;
pub mod profile;
pub mod settings;
pub mod transport;
pub mod whiteboard;

#[cfg(test)]
pub(crate) mod test_support;

pub use {
    direct::DirectTransport,
    error::{Error, Result},
    ids::ConnectionIds,
    indirect::WhiteboardTransport,
    profile::{DirectProfile, LinkProfile, TransportKind, WhiteboardProfile},
    settings::TransportSettings,
    transport::{PackageSink, Transport, open_transport},
};
