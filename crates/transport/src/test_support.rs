use {async_trait::async_trait, tokio::sync::mpsc};

use crate::PackageSink;

/// Sink that forwards every delivery into a channel.
pub(crate) struct ChannelSink {
    tx: mpsc::UnboundedSender<(Vec<u8>, Vec<String>)>,
}

impl ChannelSink {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<(Vec<u8>, Vec<String>)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PackageSink for ChannelSink {
    async fn deliver(&self, payload: Vec<u8>, connection_ids: Vec<String>) {
        let _ = self.tx.send((payload, connection_ids));
    }
}
