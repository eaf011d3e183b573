//! DHCP client state machine
//!
//! One exchange runs as a loop over three live states:
//!
//! ```text
//! Idle --start_discovery--> DiscoverSent --Offer/Request--> OfferPending
//!                                |                               |
//!                                +-----------Ack/Nak-------------+--> Bound (or Idle if unusable)
//! ```
//!
//! Every step waits on the receive queue for a bounded number of whole
//! seconds. A timeout or an irrelevant frame ends the attempt; the caller
//! decides whether to start over.

use alloc::sync::Arc;
use core::fmt;
use log::{debug, info, warn};
use smoltcp::wire::Ipv4Address;

use super::apply::{self, Lease, LeaseCandidate};
use super::host::{Clock, Diagnostics, NetworkHost};
use super::packet::{self, InboundPacket, PacketKind};
use super::session::{Session, SessionId, SessionSlot};
use crate::error::NetError;

/// Default bound on each receive wait
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Client tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpConfig {
    /// Bound on each receive wait, in milliseconds
    ///
    /// Only whole seconds are observed; see [`DhcpClient::receive_wait`].
    pub timeout_ms: u64,
}

impl DhcpConfig {
    pub fn new() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// DHCP client state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpState {
    /// No exchange in progress
    Idle,
    /// DISCOVER sent, waiting for an OFFER
    DiscoverSent,
    /// OFFER seen and REQUEST sent, waiting for ACK/NAK
    OfferPending,
    /// ACK applied
    Bound,
    /// Lease given back
    Released,
    /// A wait expired with nothing usable received
    TimedOut,
}

impl fmt::Display for DhcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhcpState::Idle => write!(f, "Idle"),
            DhcpState::DiscoverSent => write!(f, "DiscoverSent"),
            DhcpState::OfferPending => write!(f, "OfferPending"),
            DhcpState::Bound => write!(f, "Bound"),
            DhcpState::Released => write!(f, "Released"),
            DhcpState::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// How a discovery attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpOutcome {
    /// The lease was installed on every device
    Bound(Lease),
    /// An ACK/NAK arrived but its addresses were unusable; configuration is cleared
    ConfigFailed,
    /// No usable reply within the bound
    TimedOut,
    /// A frame that does not advance the exchange ended the attempt
    Ignored(PacketKind),
}

/// Result of one bounded receive wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Received {
        packet: InboundPacket,
        elapsed_secs: u64,
    },
    TimedOut,
}

/// DHCP client driving one exchange at a time over a [`NetworkHost`]
pub struct DhcpClient<H, C, D> {
    host: H,
    clock: C,
    diagnostics: D,
    sessions: Arc<SessionSlot>,
    config: DhcpConfig,
    session: Option<Session>,
    state: DhcpState,
}

impl<H, C, D> DhcpClient<H, C, D>
where
    H: NetworkHost,
    C: Clock,
    D: Diagnostics,
{
    /// Create a client
    ///
    /// # Arguments
    /// * `host` - Device table, transmission and configuration store
    /// * `clock` - Whole-second monotonic clock bounding each wait
    /// * `diagnostics` - Sink for operator-visible status lines
    /// * `sessions` - Registry shared with the inbound delivery path
    pub fn new(host: H, clock: C, diagnostics: D, sessions: Arc<SessionSlot>) -> Self {
        Self {
            host,
            clock,
            diagnostics,
            sessions,
            config: DhcpConfig::default(),
            session: None,
            state: DhcpState::Idle,
        }
    }

    pub fn with_config(mut self, config: DhcpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> DhcpState {
        self.state
    }

    pub fn config(&self) -> &DhcpConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    pub fn sessions(&self) -> &Arc<SessionSlot> {
        &self.sessions
    }

    /// Id of this client's open session, if any
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(Session::id)
    }

    pub fn is_awaiting_first_ack(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| session.awaiting_first_ack)
    }

    /// Reset every device, broadcast DISCOVER and run the exchange
    ///
    /// Any session opened earlier is replaced. Collaborator failures (a
    /// flush that cannot reach the wire) are returned as errors; everything
    /// else is reported through [`DhcpOutcome`].
    pub fn start_discovery(&mut self) -> Result<DhcpOutcome, NetError> {
        let xid = self.open_session();
        self.host.clear_all();

        for device in self.host.devices() {
            self.host.set_addresses(
                &device,
                Ipv4Address::UNSPECIFIED,
                Ipv4Address::UNSPECIFIED,
                Ipv4Address::UNSPECIFIED,
            );
            self.transmit(packet::build_discover(device.mac, xid))?;
            debug!("[DHCP DISCOVER][{}] sent, xid {:#010x}", device.name, xid);

            if let Some(session) = self.session.as_mut() {
                session.awaiting_first_ack = true;
            }
        }

        self.state = DhcpState::DiscoverSent;
        self.run_exchange(xid)
    }

    /// Send RELEASE for every device with a lease, then clear all configuration
    ///
    /// The server is the device's configured gateway and the released
    /// address is the local interface on that server's network. The shared
    /// registry is emptied even if the registered session belongs to another
    /// client, or there was nothing to release.
    pub fn release(&mut self) -> Result<(), NetError> {
        let xid = match self.session.as_ref() {
            Some(session) => session.xid(),
            None => self.clock.now_secs() as u32,
        };
        let devices = self.host.devices();

        for device in &devices {
            let Some(server) = self.host.gateway(device) else {
                debug!("[DHCP RELEASE][{}] no lease to release", device.name);
                continue;
            };
            let client = self
                .host
                .network_containing(server)
                .unwrap_or(Ipv4Address::UNSPECIFIED);
            self.transmit(packet::build_release(device.mac, client, server, xid))?;
            info!("[DHCP RELEASE][{}] released {} to {}", device.name, client, server);
        }

        apply::revert(&mut self.host, &devices);
        self.close_session();
        self.sessions.clear();
        self.state = DhcpState::Released;
        Ok(())
    }

    /// Wait for the next frame on the open session's queue
    ///
    /// Elapsed time is counted in changes of the clock's second counter, so
    /// the wait gives up once more than `timeout_ms / 1000` changes have
    /// been seen. Depending on where in the current second the wait starts,
    /// a 5000 ms timeout therefore lasts between 5 and 6 seconds. A timeout
    /// of zero returns immediately without looking at the queue, as does a
    /// client with no open session.
    pub fn receive_wait(&mut self, timeout_ms: u64) -> WaitOutcome {
        let Some(queue) = self.session.as_ref().map(|s| Arc::clone(s.queue())) else {
            return WaitOutcome::TimedOut;
        };
        if timeout_ms == 0 {
            return WaitOutcome::TimedOut;
        }

        let limit = timeout_ms / 1000;
        let mut elapsed_secs = 0;
        let mut last_seen = self.clock.now_secs();

        loop {
            if let Some(packet) = queue.pop() {
                return WaitOutcome::Received {
                    packet,
                    elapsed_secs,
                };
            }

            let now = self.clock.now_secs();
            if now != last_seen {
                elapsed_secs += 1;
                last_seen = now;
            }
            if elapsed_secs > limit {
                return WaitOutcome::TimedOut;
            }

            self.host.relax();
        }
    }

    fn run_exchange(&mut self, xid: u32) -> Result<DhcpOutcome, NetError> {
        loop {
            let packet = match self.receive_wait(self.config.timeout_ms) {
                WaitOutcome::Received { packet, .. } => packet,
                WaitOutcome::TimedOut => {
                    warn!(
                        "DHCP timed out in state {} after {} ms",
                        self.state, self.config.timeout_ms
                    );
                    self.state = DhcpState::TimedOut;
                    return Ok(DhcpOutcome::TimedOut);
                }
            };

            match packet.kind() {
                PacketKind::Offer if self.state == DhcpState::DiscoverSent => {
                    let (Some(offered), Some(server)) = (packet.client(), packet.server()) else {
                        warn!("DHCP OFFER without usable addresses, giving up");
                        return Ok(DhcpOutcome::Ignored(PacketKind::Offer));
                    };
                    info!("[DHCP OFFER] {} offered by {}", offered, server);
                    self.send_request(offered, server, xid)?;
                    self.state = DhcpState::OfferPending;
                }
                PacketKind::Ack | PacketKind::Nak => {
                    if packet.kind() == PacketKind::Nak {
                        warn!("[DHCP NAK] received in state {}", self.state);
                    }
                    let verbose = self.is_awaiting_first_ack();
                    return Ok(self.apply(&packet.lease_candidate(), verbose));
                }
                other => {
                    debug!("DHCP ignoring {:?} in state {}", other, self.state);
                    return Ok(DhcpOutcome::Ignored(other));
                }
            }
        }
    }

    fn send_request(
        &mut self,
        offered: Ipv4Address,
        server: Ipv4Address,
        xid: u32,
    ) -> Result<(), NetError> {
        for device in self.host.devices() {
            self.transmit(packet::build_request(device.mac, offered, server, xid))?;
            debug!("[DHCP REQUEST][{}] requested {} from {}", device.name, offered, server);
        }
        Ok(())
    }

    fn apply(&mut self, candidate: &LeaseCandidate, verbose: bool) -> DhcpOutcome {
        let devices = self.host.devices();
        let outcome = match apply::apply_lease(
            &mut self.host,
            &devices,
            candidate,
            verbose,
            &mut self.diagnostics,
        ) {
            Ok(lease) => {
                if let Some(session) = self.session.as_mut() {
                    session.awaiting_first_ack = false;
                }
                info!("DHCP bound to {}", lease.client);
                self.state = DhcpState::Bound;
                DhcpOutcome::Bound(lease)
            }
            Err(e) => {
                warn!("{}", e);
                self.state = DhcpState::Idle;
                DhcpOutcome::ConfigFailed
            }
        };

        self.close_session();
        outcome
    }

    fn transmit(&mut self, frame: alloc::vec::Vec<u8>) -> Result<(), NetError> {
        self.host.enqueue_outbound(frame);
        self.host.flush()
    }

    fn open_session(&mut self) -> u32 {
        let session = self.sessions.open(self.clock.now_secs());
        let xid = session.xid();
        debug!("DHCP session {} opened", session.id());
        self.session = Some(session);
        xid
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.sessions.close(session.id());
            debug!("DHCP session {} closed", session.id());
        }
    }
}
