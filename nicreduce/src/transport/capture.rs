use std::sync::Mutex;

use super::Forwarder;

/// Records every forwarded packet in send order. Used at the tree root and
/// in tests.
#[derive(Debug, Default)]
pub struct CaptureForwarder {
    packets: Mutex<Vec<Vec<u8>>>,
}

impl CaptureForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packets captured so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of everything captured so far.
    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.lock().clone()
    }

    /// Drain everything captured so far.
    pub fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        // A panic while holding the lock leaves the Vec intact.
        self.packets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Forwarder for CaptureForwarder {
    fn send(&self, packet: &[u8]) {
        tracing::trace!(len = packet.len(), "captured packet");
        self.lock().push(packet.to_vec());
    }
}
