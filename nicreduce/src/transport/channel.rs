use tokio::sync::mpsc;

use super::Forwarder;

/// Forwards packets into a tokio channel, e.g. toward a parent node's
/// ingest task.
///
/// Sending never blocks, so it is safe to call while a spin lock is held.
#[derive(Debug, Clone)]
pub struct ChannelForwarder {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelForwarder {
    pub fn new(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx }
    }

    /// Create a forwarder together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Forwarder for ChannelForwarder {
    fn send(&self, packet: &[u8]) {
        if self.tx.send(packet.to_vec()).is_err() {
            tracing::warn!(len = packet.len(), "uplink closed, dropping packet");
        }
    }
}
