//! Bounded receive queue between the delivery path and the client

use core::sync::atomic::{AtomicUsize, Ordering};
use heapless::mpmc::Q8;

use super::packet::InboundPacket;

/// Number of frames the queue holds before dropping new arrivals
pub const RECEIVE_QUEUE_CAPACITY: usize = 8;

/// What happened to a delivered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the active session
    Queued,
    /// Queue full; the new frame was discarded
    Dropped,
    /// No session is listening
    NoSession,
}

/// Lock-free FIFO of inbound packets
///
/// Safe for the stack's receive path and the client to use concurrently.
/// When full the newest frame is dropped, so replies already waiting are
/// never evicted.
pub struct ReceiveQueue {
    packets: Q8<InboundPacket>,
    dropped: AtomicUsize,
}

impl ReceiveQueue {
    pub const fn new() -> Self {
        Self {
            packets: Q8::new(),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Enqueue without blocking
    pub fn push(&self, packet: InboundPacket) -> Delivery {
        match self.packets.enqueue(packet) {
            Ok(()) => Delivery::Queued,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("DHCP receive queue full, dropping frame");
                Delivery::Dropped
            }
        }
    }

    pub fn pop(&self) -> Option<InboundPacket> {
        self.packets.dequeue()
    }

    /// Frames discarded because the queue was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for ReceiveQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ReceiveQueue {
    fn drop(&mut self) {
        while self.packets.dequeue().is_some() {}
    }
}
