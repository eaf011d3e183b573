//! Session bookkeeping and the single-slot session registry

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use spin::Mutex;

use super::packet::InboundPacket;
use super::queue::{Delivery, ReceiveQueue};

/// Identifies one DHCP session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State owned by one DHCP exchange
pub struct Session {
    id: SessionId,
    queue: Arc<ReceiveQueue>,
    xid: u32,
    /// A Discover went out and no Ack has been applied yet
    pub awaiting_first_ack: bool,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn queue(&self) -> &Arc<ReceiveQueue> {
        &self.queue
    }

    /// Transaction id stamped on this session's frames
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

struct Registration {
    id: SessionId,
    queue: Arc<ReceiveQueue>,
}

/// Registry holding the one session allowed to receive frames
///
/// Opening a session replaces whatever was registered. Closing only clears
/// the slot if the closing session is still the registered one.
pub struct SessionSlot {
    current: Mutex<Option<Registration>>,
    next_id: AtomicU32,
}

impl SessionSlot {
    pub const fn new() -> Self {
        Self {
            current: Mutex::new(None),
            next_id: AtomicU32::new(1),
        }
    }

    /// Create a session and make it the delivery target
    pub fn open(&self, seed: u64) -> Session {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let queue = Arc::new(ReceiveQueue::new());

        let previous = self.current.lock().replace(Registration {
            id,
            queue: Arc::clone(&queue),
        });
        if let Some(previous) = previous {
            log::debug!("DHCP session {} replaces {}", id, previous.id);
        }

        Session {
            id,
            queue,
            xid: transaction_id(id, seed),
            awaiting_first_ack: false,
        }
    }

    /// Unregister `id`; returns whether it was the registered session
    pub fn close(&self, id: SessionId) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().map(|r| r.id) == Some(id) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Unregister whatever session is registered
    pub fn clear(&self) {
        *self.current.lock() = None;
    }

    pub fn current(&self) -> Option<SessionId> {
        self.current.lock().as_ref().map(|r| r.id)
    }

    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }

    /// Decode a frame and queue it for the registered session
    ///
    /// Never blocks beyond the registry lock.
    pub fn deliver(&self, frame: Vec<u8>) -> Delivery {
        let queue = match self.current.lock().as_ref() {
            Some(registration) => Arc::clone(&registration.queue),
            None => return Delivery::NoSession,
        };
        queue.push(InboundPacket::parse(frame))
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}

fn transaction_id(id: SessionId, seed: u64) -> u32 {
    id.0.wrapping_mul(0x9E37_79B9) ^ (seed as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_replaces_previous() {
        let slot = SessionSlot::new();
        let first = slot.open(0);
        let second = slot.open(0);

        assert_ne!(first.id(), second.id());
        assert_eq!(slot.current(), Some(second.id()));
    }

    #[test]
    fn test_close_stale_session_keeps_current() {
        let slot = SessionSlot::new();
        let first = slot.open(0);
        let second = slot.open(0);

        assert!(!slot.close(first.id()));
        assert_eq!(slot.current(), Some(second.id()));
        assert!(slot.close(second.id()));
        assert!(!slot.is_active());
    }

    #[test]
    fn test_deliver_targets_current_session() {
        let slot = SessionSlot::new();
        assert_eq!(slot.deliver(vec![1]), Delivery::NoSession);

        let first = slot.open(0);
        let second = slot.open(0);
        assert_eq!(slot.deliver(vec![2]), Delivery::Queued);

        assert!(first.queue().pop().is_none());
        assert_eq!(second.queue().pop().map(|p| p.raw().to_vec()), Some(vec![2]));
    }

    #[test]
    fn test_clear() {
        let slot = SessionSlot::new();
        slot.open(0);
        slot.clear();
        assert_eq!(slot.current(), None);
        assert_eq!(slot.deliver(vec![1]), Delivery::NoSession);
    }

    #[test]
    fn test_transaction_ids_differ_between_sessions() {
        let slot = SessionSlot::new();
        let a = slot.open(5);
        let b = slot.open(5);
        assert_ne!(a.xid(), b.xid());
    }
}
