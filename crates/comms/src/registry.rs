//! Connection ID → transport map.
//!
//! Several connection IDs may point at one transport. A transport is closed
//! exactly when the last ID that references it is closed.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use {
    tracing::{debug, info},
    wisp_common::LinkType,
    wisp_transport::Transport,
};

#[cfg(feature = "metrics")]
use wisp_metrics::{comms as comms_metrics, gauge};

use crate::{Error, Result};

/// Outcome of closing one connection ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedConnection {
    pub link_id: String,
    /// Whether this was the last ID and the transport was shut down.
    pub transport_closed: bool,
}

/// Result of [`ConnectionRegistry::reuse_or_open`].
pub struct OpenedConnection {
    pub transport: Arc<dyn Transport>,
    /// `true` when a new transport was created and needs a receive loop.
    pub created: bool,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<dyn Transport>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection_id` on an existing transport for the same link and
    /// link type, or on one built by `open`.
    ///
    /// The scan and the insert happen under one write lock, so two concurrent
    /// opens on the same link never build two transports.
    pub fn reuse_or_open<F>(
        &self,
        link_id: &str,
        link_type: LinkType,
        connection_id: &str,
        open: F,
    ) -> Result<OpenedConnection>
    where
        F: FnOnce() -> wisp_transport::Result<Arc<dyn Transport>>,
    {
        let mut connections = self.connections.write().unwrap_or_else(|e| e.into_inner());

        let existing = connections
            .values()
            .find(|t| t.link_id() == link_id && t.link_type() == link_type && !t.is_closed())
            .cloned();

        let opened = match existing {
            Some(transport) => {
                let count = transport.add_id(connection_id);
                debug!(link_id, connection_id, ids = count, "reusing transport");
                OpenedConnection {
                    transport,
                    created: false,
                }
            },
            None => {
                let transport = open()?;
                info!(link_id, connection_id, %link_type, kind = %transport.kind(), "opened transport");
                OpenedConnection {
                    transport,
                    created: true,
                }
            },
        };
        connections.insert(connection_id.to_string(), Arc::clone(&opened.transport));

        #[cfg(feature = "metrics")]
        gauge!(comms_metrics::CONNECTIONS_ACTIVE).set(connections.len() as f64);

        Ok(opened)
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<dyn Transport>> {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(connection_id)
            .cloned()
    }

    /// Write a package on the transport behind `connection_id`.
    ///
    /// The lookup lock is released before the write starts.
    pub async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<()> {
        let transport = self
            .get(connection_id)
            .ok_or_else(|| Error::unknown_connection(connection_id))?;
        transport.write(payload).await?;
        Ok(())
    }

    /// Remove one connection ID, closing its transport if no IDs remain.
    ///
    /// A second close of the same ID fails with `UnknownConnection`.
    pub fn close(&self, connection_id: &str) -> Result<ClosedConnection> {
        let mut connections = self.connections.write().unwrap_or_else(|e| e.into_inner());
        let transport = connections
            .remove(connection_id)
            .ok_or_else(|| Error::unknown_connection(connection_id))?;

        let remaining = transport.remove_id(connection_id);
        let transport_closed = remaining == 0;
        if transport_closed {
            transport.close();
        }
        debug!(connection_id, link_id = transport.link_id(), remaining, "connection closed");

        #[cfg(feature = "metrics")]
        gauge!(comms_metrics::CONNECTIONS_ACTIVE).set(connections.len() as f64);

        Ok(ClosedConnection {
            link_id: transport.link_id().to_string(),
            transport_closed,
        })
    }

    /// Close `transport` and drop every ID registered on it, returning them
    /// sorted.
    ///
    /// Runs under the write lock with the transport already marked closed,
    /// so no concurrent open can attach a new ID that would be missed.
    pub fn close_transport(&self, transport: &Arc<dyn Transport>) -> Vec<String> {
        let mut connections = self.connections.write().unwrap_or_else(|e| e.into_inner());
        transport.close();

        let mut ids: Vec<String> = connections
            .iter()
            .filter(|(_, t)| Arc::ptr_eq(t, transport))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        for id in &ids {
            connections.remove(id);
            transport.remove_id(id);
        }
        info!(link_id = transport.link_id(), connections = ids.len(), "transport closed with its connections");

        #[cfg(feature = "metrics")]
        gauge!(comms_metrics::CONNECTIONS_ACTIVE).set(connections.len() as f64);

        ids
    }

    pub fn connection_ids_for_link(&self, link_id: &str) -> Vec<String> {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, t)| t.link_id() == link_id)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Number of distinct transports behind the registered IDs.
    pub fn transport_count(&self) -> usize {
        let connections = self.connections.read().unwrap_or_else(|e| e.into_inner());
        let mut seen: Vec<&Arc<dyn Transport>> = Vec::new();
        for transport in connections.values() {
            if !seen.iter().any(|t| Arc::ptr_eq(t, transport)) {
                seen.push(transport);
            }
        }
        seen.len()
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use {
        async_trait::async_trait,
        wisp_transport::{ConnectionIds, PackageSink, TransportKind},
    };

    /// Transport that only counts calls.
    struct CountingTransport {
        link_id: String,
        link_type: LinkType,
        ids: ConnectionIds,
        closes: AtomicUsize,
        writes: AtomicUsize,
    }

    impl CountingTransport {
        fn new(link_id: &str, link_type: LinkType, first_id: &str) -> Arc<Self> {
            Arc::new(Self {
                link_id: link_id.into(),
                link_type,
                ids: ConnectionIds::with_first(first_id),
                closes: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for CountingTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Direct
        }

        fn link_id(&self) -> &str {
            &self.link_id
        }

        fn link_type(&self) -> LinkType {
            self.link_type
        }

        fn connection_ids(&self) -> &ConnectionIds {
            &self.ids
        }

        async fn write(&self, _payload: &[u8]) -> wisp_transport::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn receive(&self, _sink: Arc<dyn PackageSink>) -> wisp_transport::Result<()> {
            Ok(())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closes.load(Ordering::SeqCst) > 0
        }
    }

    fn open(
        registry: &ConnectionRegistry,
        link_id: &str,
        link_type: LinkType,
        connection_id: &str,
    ) -> (OpenedConnection, Arc<CountingTransport>) {
        let fresh = CountingTransport::new(link_id, link_type, connection_id);
        let candidate: Arc<dyn Transport> = fresh.clone();
        let opened = registry
            .reuse_or_open(link_id, link_type, connection_id, || Ok(candidate))
            .unwrap();
        (opened, fresh)
    }

    #[test]
    fn same_link_and_type_share_one_transport() {
        let registry = ConnectionRegistry::new();
        let (first, transport) = open(&registry, "link-1", LinkType::Send, "conn-a");
        let (second, _unused) = open(&registry, "link-1", LinkType::Send, "conn-b");

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.transport_count(), 1);
        assert_eq!(transport.list_ids(), vec![
            "conn-a".to_string(),
            "conn-b".to_string()
        ]);

        let closed = registry.close("conn-a").unwrap();
        assert!(!closed.transport_closed);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 0);

        let closed = registry.close("conn-b").unwrap();
        assert!(closed.transport_closed);
        assert_eq!(closed.link_id, "link-1");
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn different_link_type_gets_its_own_transport() {
        let registry = ConnectionRegistry::new();
        open(&registry, "link-1", LinkType::Send, "conn-a");
        let (second, _) = open(&registry, "link-1", LinkType::Recv, "conn-b");
        assert!(second.created);
        assert_eq!(registry.transport_count(), 2);
        assert_eq!(registry.connection_ids_for_link("link-1").len(), 2);
        assert!(registry.connection_ids_for_link("link-2").is_empty());
    }

    #[test]
    fn failed_open_registers_nothing() {
        let registry = ConnectionRegistry::new();
        let result = registry.reuse_or_open("link-1", LinkType::Send, "conn-a", || {
            Err(wisp_transport::Error::EmptyConnectionId)
        });
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_close_is_rejected() {
        let registry = ConnectionRegistry::new();
        let (_, transport) = open(&registry, "link-1", LinkType::Send, "conn-a");
        registry.close("conn-a").unwrap();
        assert!(matches!(
            registry.close("conn-a"),
            Err(Error::UnknownConnection { .. })
        ));
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_duplicate_close_shuts_transport_once() {
        for _ in 0..50 {
            let registry = Arc::new(ConnectionRegistry::new());
            let (_, transport) = open(&registry, "link-1", LinkType::Recv, "conn-a");
            open(&registry, "link-1", LinkType::Recv, "conn-b");

            let handles: Vec<_> = ["conn-a", "conn-b", "conn-a", "conn-b"]
                .into_iter()
                .map(|id| {
                    let registry = Arc::clone(&registry);
                    std::thread::spawn(move || registry.close(id).is_ok())
                })
                .collect();
            let successes = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();

            assert_eq!(successes, 2);
            assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
            assert!(registry.is_empty());
        }
    }

    #[test]
    fn closed_transport_takes_all_ids_and_is_never_reused() {
        let registry = ConnectionRegistry::new();
        let (_, transport) = open(&registry, "link-1", LinkType::Recv, "conn-b");
        open(&registry, "link-1", LinkType::Recv, "conn-a");
        let (other, _) = open(&registry, "link-1", LinkType::Send, "conn-c");

        let failed: Arc<dyn Transport> = transport.clone();
        assert_eq!(registry.close_transport(&failed), vec![
            "conn-a".to_string(),
            "conn-b".to_string()
        ]);
        assert!(transport.is_closed());
        assert!(transport.list_ids().is_empty());
        assert_eq!(registry.connection_ids(), vec!["conn-c".to_string()]);
        assert!(!other.transport.is_closed());

        let (late, _) = open(&registry, "link-1", LinkType::Recv, "conn-d");
        assert!(late.created);
        assert!(!Arc::ptr_eq(&late.transport, &failed));
        assert!(registry.close_transport(&failed).is_empty());
    }

    #[tokio::test]
    async fn send_reaches_shared_transport() {
        let registry = ConnectionRegistry::new();
        let (_, transport) = open(&registry, "link-1", LinkType::Send, "conn-a");
        open(&registry, "link-1", LinkType::Send, "conn-b");

        registry.send("conn-a", b"one").await.unwrap();
        registry.send("conn-b", b"two").await.unwrap();
        assert_eq!(transport.writes.load(Ordering::SeqCst), 2);

        assert!(matches!(
            registry.send("conn-z", b"three").await,
            Err(Error::UnknownConnection { .. })
        ));
    }
}
