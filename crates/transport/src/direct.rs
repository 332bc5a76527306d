//! Direct socket transport.
//!
//! Every package is one TCP connection: dial, write everything, shut down.
//! The receiving side accepts peers one at a time and treats the whole
//! stream up to EOF as a single payload.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio::{
        io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
    wisp_common::LinkType,
};

use crate::{
    Error, PackageSink, Result, Transport, ids::ConnectionIds,
    profile::{DirectProfile, TransportKind},
    settings::TransportSettings,
};

pub struct DirectTransport {
    link_id: String,
    link_type: LinkType,
    profile: DirectProfile,
    bind_address: Option<String>,
    write_timeout: Duration,
    read_timeout: Duration,
    max_payload_bytes: u64,
    ids: ConnectionIds,
    cancel: CancellationToken,
}

impl DirectTransport {
    pub fn new(
        link_id: &str,
        link_type: LinkType,
        profile: DirectProfile,
        first_id: &str,
        settings: &TransportSettings,
    ) -> Self {
        Self {
            link_id: link_id.to_string(),
            link_type,
            profile,
            bind_address: settings.bind_address.clone(),
            write_timeout: settings.write_timeout,
            read_timeout: settings.read_timeout,
            max_payload_bytes: settings.max_payload_bytes,
            ids: ConnectionIds::with_first(first_id),
            cancel: CancellationToken::new(),
        }
    }

    fn listen_address(&self) -> String {
        match &self.bind_address {
            Some(host) => format!("{host}:{}", self.profile.port),
            None => self.profile.socket_address(),
        }
    }

    async fn dial_and_send(&self, payload: &[u8]) -> Result<()> {
        let mut stream =
            TcpStream::connect((self.profile.hostname.as_str(), self.profile.port)).await?;
        stream.write_all(payload).await?;
        stream.shutdown().await?;
        Ok(())
    }

    /// Read one peer's stream to EOF within the read timeout and size limit.
    /// `None` when the transport was closed mid-read.
    async fn read_payload(&self, stream: &mut TcpStream) -> Option<Result<Vec<u8>>> {
        let mut data = Vec::new();
        let limited = stream.take(self.max_payload_bytes.saturating_add(1));
        let read = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            res = tokio::time::timeout(self.read_timeout, read_all(limited, &mut data)) => res,
        };
        Some(match read {
            Err(_) => Err(Error::Timeout {
                operation: "direct read",
                timeout: self.read_timeout,
            }),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(n)) if n > self.max_payload_bytes => Err(Error::PayloadTooLarge {
                limit: self.max_payload_bytes,
            }),
            Ok(Ok(_)) => Ok(data),
        })
    }
}

async fn read_all(mut reader: impl AsyncRead + Unpin, buf: &mut Vec<u8>) -> std::io::Result<u64> {
    let n = reader.read_to_end(buf).await?;
    Ok(u64::try_from(n).unwrap_or(u64::MAX))
}

#[async_trait]
impl Transport for DirectTransport {
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

    async fn write(&self, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::closed(&self.link_id));
        }
        match tokio::time::timeout(self.write_timeout, self.dial_and_send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: "direct write",
                timeout: self.write_timeout,
            }),
        }
    }

    async fn receive(&self, sink: Arc<dyn PackageSink>) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let address = self.listen_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| Error::Bind {
                address: address.clone(),
                source,
            })?;
        info!(link_id = %self.link_id, %address, "direct transport listening");

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                res = listener.accept() => res,
            };
            let (mut stream, peer) = accepted.map_err(|source| Error::Accept {
                address: address.clone(),
                source,
            })?;
            debug!(link_id = %self.link_id, %peer, "accepted direct peer");

            match self.read_payload(&mut stream).await {
                None => break,
                Some(Ok(payload)) if payload.is_empty() => {
                    debug!(link_id = %self.link_id, %peer, "peer closed without sending data");
                },
                Some(Ok(payload)) => sink.deliver(payload, self.list_ids()).await,
                Some(Err(e)) => {
                    warn!(link_id = %self.link_id, %peer, error = %e, "dropping inbound payload");
                },
            }
        }

        info!(link_id = %self.link_id, %address, "direct listener closed");
        Ok(())
    }

    fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!(link_id = %self.link_id, "closing direct transport");
        }
        self.cancel.cancel();
    }

    fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
