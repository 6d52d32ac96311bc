//! Outbound side of a tree node and the pool of cores that run handlers.
//!
//! The handler never owns a socket. It assembles a packet in its core's
//! staging buffer and hands the finished bytes to a [`Forwarder`], which
//! carries them to the next tree level.

mod capture;
mod channel;
pub mod core_pool;

pub use capture::CaptureForwarder;
pub use channel::ChannelForwarder;
pub use core_pool::{CoreLease, CorePool};

/// Emits one outbound packet toward the next tree level.
///
/// `packet` starts with the reserved IP/UDP bytes and is exactly as long as
/// the fragment it carries. Calls made during one flush arrive in order; the
/// last one carries the total fragment count.
pub trait Forwarder: Send + Sync {
    fn send(&self, packet: &[u8]);
}

impl<F: Forwarder + ?Sized> Forwarder for std::sync::Arc<F> {
    fn send(&self, packet: &[u8]) {
        (**self).send(packet)
    }
}
