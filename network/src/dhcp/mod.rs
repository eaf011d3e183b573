//! DHCP client
//!
//! Negotiates address, subnet mask, gateway and DNS server for every
//! network device and installs them into the system configuration:
//!
//! 1. DISCOVER - Broadcast on every device
//! 2. OFFER - Server proposes an address
//! 3. REQUEST - Ask the offering server for it
//! 4. ACK - Install the configuration (NAK clears it)
//!
//! Lease renewal and rebinding are not implemented; a new discovery must be
//! started explicitly.

pub mod apply;
pub mod client;
pub mod host;
pub mod packet;
pub mod queue;
pub mod session;

pub use apply::{Lease, LeaseCandidate};
pub use client::{DhcpClient, DhcpConfig, DhcpOutcome, DhcpState, WaitOutcome, DEFAULT_TIMEOUT_MS};
pub use host::{
    Clock, ConfigStore, DeviceInfo, Diagnostics, LogDiagnostics, NetworkHost, TimerClock,
};
pub use packet::{build_discover, build_release, build_request, InboundPacket, PacketKind};
pub use queue::{Delivery, ReceiveQueue, RECEIVE_QUEUE_CAPACITY};
pub use session::{Session, SessionId, SessionSlot};
