use std::sync::Arc;

use {async_trait::async_trait, wisp_common::LinkType};

use crate::{
    DirectTransport, Error, Result, WhiteboardTransport, ids::ConnectionIds,
    profile::{LinkProfile, TransportKind},
    settings::TransportSettings,
};

/// Receiver of inbound payloads, implemented by the dispatcher that owns
/// the receive loops.
#[async_trait]
pub trait PackageSink: Send + Sync {
    /// Forward one payload tagged with the connection IDs sharing the
    /// transport at the moment it arrived.
    async fn deliver(&self, payload: Vec<u8>, connection_ids: Vec<String>);
}

/// A physical channel endpoint shared by one or more logical connections.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn link_id(&self) -> &str;

    fn link_type(&self) -> LinkType;

    fn connection_ids(&self) -> &ConnectionIds;

    fn add_id(&self, connection_id: &str) -> usize {
        self.connection_ids().add(connection_id)
    }

    /// Remove a connection ID and return how many remain.
    fn remove_id(&self, connection_id: &str) -> usize {
        self.connection_ids().remove(connection_id)
    }

    fn list_ids(&self) -> Vec<String> {
        self.connection_ids().list()
    }

    /// Send one package.
    async fn write(&self, payload: &[u8]) -> Result<()>;

    /// Run the receive loop until [`Transport::close`] is called.
    ///
    /// Returns `Err` when the loop cannot continue (bind or accept failure).
    async fn receive(&self, sink: Arc<dyn PackageSink>) -> Result<()>;

    /// Stop the receive loop. Idempotent and non-blocking.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Build the transport variant matching `profile`.
pub fn open_transport(
    link_id: &str,
    link_type: LinkType,
    profile: &LinkProfile,
    first_id: &str,
    settings: &TransportSettings,
) -> Result<Arc<dyn Transport>> {
    if first_id.is_empty() {
        return Err(Error::EmptyConnectionId);
    }
    Ok(match profile {
        LinkProfile::Direct(p) => Arc::new(DirectTransport::new(
            link_id,
            link_type,
            p.clone(),
            first_id,
            settings,
        )),
        LinkProfile::Whiteboard(p) => Arc::new(WhiteboardTransport::new(
            link_id,
            link_type,
            p.clone(),
            first_id,
            settings,
        )?),
    })
}
