//! Whiteboard transport: packages are base64 posts on a shared mailbox,
//! received by polling it on the link's check frequency.

use std::sync::Arc;

use {
    async_trait::async_trait,
    base64::{Engine as _, engine::general_purpose::STANDARD as BASE64},
    tokio::time::{Instant, sleep_until},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
    wisp_common::LinkType,
};

use crate::{
    Error, PackageSink, Result, Transport,
    ids::ConnectionIds,
    profile::{TransportKind, WhiteboardProfile},
    settings::TransportSettings,
    whiteboard::{WhiteboardClient, WhiteboardPoller},
};

#[cfg(feature = "metrics")]
use wisp_metrics::{counter, whiteboard as wb_metrics};

pub struct WhiteboardTransport {
    link_id: String,
    link_type: LinkType,
    profile: WhiteboardProfile,
    client: WhiteboardClient,
    ids: ConnectionIds,
    cancel: CancellationToken,
}

impl WhiteboardTransport {
    pub fn new(
        link_id: &str,
        link_type: LinkType,
        profile: WhiteboardProfile,
        first_id: &str,
        settings: &TransportSettings,
    ) -> Result<Self> {
        let client = WhiteboardClient::new(&profile, settings.http_timeout)?;
        Ok(Self {
            link_id: link_id.to_string(),
            link_type,
            profile,
            client,
            ids: ConnectionIds::with_first(first_id),
            cancel: CancellationToken::new(),
        })
    }

    async fn seed_cursor(&self) -> i64 {
        match self.client.latest().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(link_id = %self.link_id, hashtag = %self.client.hashtag(), error = %e, "failed to fetch latest index, starting from 0");
                0
            },
        }
    }

    async fn poll_once(&self, poller: &mut WhiteboardPoller, sink: &dyn PackageSink) {
        let posts = match self.client.posts_since(poller.cursor()).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(link_id = %self.link_id, cursor = poller.cursor(), error = %e, "whiteboard poll failed");
                #[cfg(feature = "metrics")]
                counter!(wb_metrics::POLL_ERRORS_TOTAL).increment(1);
                return;
            },
        };
        #[cfg(feature = "metrics")]
        counter!(wb_metrics::POLLS_TOTAL).increment(1);

        let batch = poller.apply(posts);
        if batch.lost > 0 {
            warn!(link_id = %self.link_id, lost = batch.lost, cursor = poller.cursor(), "whiteboard messages lost");
            #[cfg(feature = "metrics")]
            counter!(wb_metrics::LOST_MESSAGES_TOTAL).increment(batch.lost);
        }
        if batch.messages.is_empty() {
            return;
        }

        let ids = self.list_ids();
        for message in batch.messages {
            match BASE64.decode(message.as_bytes()) {
                Ok(payload) => sink.deliver(payload, ids.clone()).await,
                Err(e) => {
                    warn!(link_id = %self.link_id, error = %e, "skipping undecodable whiteboard post");
                },
            }
        }
    }
}

#[async_trait]
impl Transport for WhiteboardTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Whiteboard
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
        self.client.post(&BASE64.encode(payload)).await
    }

    async fn receive(&self, sink: Arc<dyn PackageSink>) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let interval = self.profile.poll_interval();
        let mut poller = WhiteboardPoller::new(self.seed_cursor().await);
        info!(
            link_id = %self.link_id,
            hashtag = %self.profile.hashtag,
            cursor = poller.cursor(),
            ?interval,
            "whiteboard polling started"
        );

        loop {
            let deadline = Instant::now() + interval;
            self.poll_once(&mut poller, sink.as_ref()).await;
            tokio::select! {
                _ = sleep_until(deadline) => {},
                _ = self.cancel.cancelled() => break,
            }
        }

        info!(link_id = %self.link_id, "whiteboard polling stopped");
        Ok(())
    }

    fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!(link_id = %self.link_id, "closing whiteboard transport");
        }
        self.cancel.cancel();
    }

    fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
