//! Receive loops and upward delivery of inbound packages.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::{task::JoinHandle, time::Instant},
    tracing::{debug, error, warn},
    wisp_common::{CommsSdk, ConnectionStatus, NULL_HANDLE},
    wisp_transport::{PackageSink, Transport},
};

#[cfg(feature = "metrics")]
use wisp_metrics::{counter, histogram, labels, transport as transport_metrics};

use crate::{links::LinkStore, registry::ConnectionRegistry};

/// Forwards inbound payloads to the host.
struct SdkSink {
    sdk: Arc<dyn CommsSdk>,
    kind: &'static str,
}

#[async_trait]
impl PackageSink for SdkSink {
    async fn deliver(&self, payload: Vec<u8>, connection_ids: Vec<String>) {
        debug!(kind = self.kind, bytes = payload.len(), connections = ?connection_ids, "forwarding package");
        #[cfg(feature = "metrics")]
        {
            counter!(transport_metrics::PACKAGES_RECEIVED_TOTAL, labels::KIND => self.kind)
                .increment(1);
            histogram!(transport_metrics::PAYLOAD_BYTES, labels::KIND => self.kind)
                .record(payload.len() as f64);
        }
        let response = self.sdk.receive_enc_pkg(&payload, &connection_ids).await;
        if !response.is_ok() {
            warn!(status = ?response.status, "host rejected inbound package");
        }
    }
}

/// Runs one receive loop per receiving transport and keeps their handles.
pub struct ReceiveDispatcher {
    sdk: Arc<dyn CommsSdk>,
    registry: Arc<ConnectionRegistry>,
    links: Arc<LinkStore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ReceiveDispatcher {
    pub fn new(
        sdk: Arc<dyn CommsSdk>,
        registry: Arc<ConnectionRegistry>,
        links: Arc<LinkStore>,
    ) -> Self {
        Self {
            sdk,
            registry,
            links,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the receive loop for `transport`. Must be called inside a Tokio
    /// runtime.
    pub fn start(&self, transport: Arc<dyn Transport>) {
        let kind = transport.kind().as_str();
        let sink: Arc<dyn PackageSink> = Arc::new(SdkSink {
            sdk: Arc::clone(&self.sdk),
            kind,
        });
        let sdk = Arc::clone(&self.sdk);
        let registry = Arc::clone(&self.registry);
        let links = Arc::clone(&self.links);

        let handle = tokio::spawn(async move {
            debug!(link_id = transport.link_id(), kind, "receive loop started");
            match transport.receive(sink).await {
                Ok(()) => debug!(link_id = transport.link_id(), "receive loop finished"),
                Err(e) => {
                    error!(link_id = transport.link_id(), error = %e, "receive loop failed");
                    #[cfg(feature = "metrics")]
                    counter!(transport_metrics::RECEIVE_LOOP_FAILURES_TOTAL, labels::KIND => kind)
                        .increment(1);
                    fail_connections(sdk.as_ref(), &registry, &links, &transport).await;
                },
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Receive loops that have not finished yet.
    pub fn running(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait up to `grace` for every loop to end; abort the rest.
    ///
    /// Transports must already be closed, or the loops will not end on their
    /// own.
    pub async fn shutdown(&self, grace: Duration) {
        let handles: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        let deadline = Instant::now() + grace;
        for mut handle in handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!("receive loop did not stop in time, aborting");
                handle.abort();
            }
        }
    }
}

/// Tear down every connection on a transport whose receive loop died.
///
/// The registry detaches all IDs before any host callback runs, so a slow
/// host cannot leave a late connection on the dead transport.
async fn fail_connections(
    sdk: &dyn CommsSdk,
    registry: &ConnectionRegistry,
    links: &LinkStore,
    transport: &Arc<dyn Transport>,
) {
    let properties = links.properties(transport.link_id()).unwrap_or_default();
    for connection_id in registry.close_transport(transport) {
        warn!(connection_id = %connection_id, link_id = transport.link_id(), "closing connection after receive failure");
        let response = sdk
            .on_connection_status_changed(
                NULL_HANDLE,
                &connection_id,
                ConnectionStatus::Closed,
                &properties,
            )
            .await;
        if !response.is_ok() {
            warn!(status = ?response.status, "host rejected connection status");
        }
    }
}
