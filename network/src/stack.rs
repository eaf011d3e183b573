// Network stack context
// Owns the drivers, the outgoing frame buffer and the configuration tables,
// and routes inbound DHCP frames to the active client session.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use smoltcp::wire::{EthernetFrame, EthernetProtocol, IpProtocol, Ipv4Address, Ipv4Packet, UdpPacket};
use spin::Mutex;

use crate::dhcp::host::{Clock, ConfigStore, DeviceInfo, Diagnostics, NetworkHost};
use crate::dhcp::packet::CLIENT_PORT;
use crate::dhcp::{
    DhcpClient, DhcpConfig, DhcpOutcome, Delivery, LogDiagnostics, SessionSlot, TimerClock,
};
use crate::drivers::NetworkDriver;
use crate::error::NetError;
use crate::ipconfig::IpConfigStore;

/// Network stack
///
/// Devices are identified by their position in the driver table.
pub struct NetworkStack {
    /// Registered drivers
    drivers: Vec<Box<dyn NetworkDriver>>,
    /// Frames waiting for `flush`
    outgoing: VecDeque<Vec<u8>>,
    /// Interface addresses and DNS servers
    config: IpConfigStore,
    /// Delivery target for inbound DHCP frames
    sessions: Arc<SessionSlot>,
}

impl NetworkStack {
    /// Create an empty stack with no devices
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
            outgoing: VecDeque::new(),
            config: IpConfigStore::new(),
            sessions: Arc::new(SessionSlot::new()),
        }
    }

    /// Register a driver; returns its device index
    pub fn add_device(&mut self, driver: Box<dyn NetworkDriver>) -> usize {
        self.drivers.push(driver);
        self.drivers.len() - 1
    }

    /// Registry shared with DHCP clients running on this stack
    ///
    /// Delivery paths outside the driver poll loop should take this handle
    /// up front and call [`SessionSlot::deliver`] on it: an exchange started
    /// through [`dhcp_discover`] holds the global stack lock until it ends.
    pub fn session_slot(&self) -> Arc<SessionSlot> {
        Arc::clone(&self.sessions)
    }

    pub fn config(&self) -> &IpConfigStore {
        &self.config
    }

    /// Number of frames waiting for `flush`
    pub fn pending_outbound(&self) -> usize {
        self.outgoing.len()
    }

    /// Hand an inbound frame to the active DHCP session
    ///
    /// Returns immediately; see [`Delivery`] for what happened to the frame.
    /// Reaching this through the global stack waits for any running exchange,
    /// so callers that must not block use [`NetworkStack::session_slot`].
    pub fn deliver_inbound(&self, frame: Vec<u8>) -> Delivery {
        self.sessions.deliver(frame)
    }

    /// Poll every driver and route DHCP client frames
    ///
    /// # Returns
    /// * `Ok(count)` - Number of frames handed to the DHCP session
    /// * `Err(NetError)` - A driver failed
    pub fn poll(&mut self) -> Result<usize, NetError> {
        let mut delivered = 0;
        for driver in self.drivers.iter_mut() {
            driver.poll()?;
            while let Some(frame) = driver.receive()? {
                if !is_dhcp_client_frame(&frame) {
                    continue;
                }
                match self.sessions.deliver(frame) {
                    Delivery::Queued => delivered += 1,
                    Delivery::Dropped => log::debug!("[{}] DHCP frame dropped", driver.name()),
                    Delivery::NoSession => {}
                }
            }
        }
        Ok(delivered)
    }

    /// Run DHCP discovery on every device, bounding each wait with `clock`
    pub fn discover<C, D>(
        &mut self,
        clock: C,
        diagnostics: D,
        config: DhcpConfig,
    ) -> Result<DhcpOutcome, NetError>
    where
        C: Clock,
        D: Diagnostics,
    {
        let sessions = self.session_slot();
        DhcpClient::new(self, clock, diagnostics, sessions)
            .with_config(config)
            .start_discovery()
    }

    /// Release every device's lease and unregister any open DHCP session
    pub fn release_leases<C, D>(&mut self, clock: C, diagnostics: D) -> Result<(), NetError>
    where
        C: Clock,
        D: Diagnostics,
    {
        let sessions = self.session_slot();
        DhcpClient::new(self, clock, diagnostics, sessions).release()
    }
}

impl Default for NetworkStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a frame is UDP addressed to the DHCP client port
pub fn is_dhcp_client_frame(frame: &[u8]) -> bool {
    let Ok(eth) = EthernetFrame::new_checked(frame) else {
        return false;
    };
    if eth.ethertype() != EthernetProtocol::Ipv4 {
        return false;
    }
    let Ok(ip) = Ipv4Packet::new_checked(eth.payload()) else {
        return false;
    };
    if ip.next_header() != IpProtocol::Udp {
        return false;
    }
    match UdpPacket::new_checked(ip.payload()) {
        Ok(udp) => udp.dst_port() == CLIENT_PORT,
        Err(_) => false,
    }
}

impl ConfigStore for NetworkStack {
    fn set_addresses(
        &mut self,
        device: &DeviceInfo,
        client: Ipv4Address,
        subnet: Ipv4Address,
        gateway: Ipv4Address,
    ) {
        self.config.set_addresses(device, client, subnet, gateway);
    }

    fn clear_all(&mut self) {
        self.config.clear_all();
    }

    fn add_dns_server(&mut self, address: Ipv4Address) {
        self.config.add_dns_server(address);
    }

    fn network_containing(&self, address: Ipv4Address) -> Option<Ipv4Address> {
        self.config.network_containing(address)
    }

    fn gateway(&self, device: &DeviceInfo) -> Option<Ipv4Address> {
        self.config.gateway(device)
    }
}

impl NetworkHost for NetworkStack {
    fn devices(&self) -> Vec<DeviceInfo> {
        self.drivers
            .iter()
            .enumerate()
            .map(|(index, driver)| DeviceInfo::new(index, driver.name(), driver.mac_address()))
            .collect()
    }

    fn enqueue_outbound(&mut self, frame: Vec<u8>) {
        self.outgoing.push_back(frame);
    }

    /// Send each queued frame through the driver owning its source MAC
    fn flush(&mut self) -> Result<(), NetError> {
        while let Some(frame) = self.outgoing.pop_front() {
            let source = EthernetFrame::new_checked(&frame[..])
                .map_err(|_| NetError::InvalidPacket(format!("{} byte frame", frame.len())))?
                .src_addr();
            let driver = self
                .drivers
                .iter_mut()
                .find(|driver| driver.mac_address() == source.0)
                .ok_or(NetError::DeviceNotFound)?;
            if !driver.is_link_up() {
                log::warn!("[{}] link down, frame not sent", driver.name());
                continue;
            }
            driver.send(&frame)?;
        }
        Ok(())
    }

    fn relax(&mut self) {
        if let Err(e) = self.poll() {
            log::warn!("network poll failed: {}", e);
        }
        core::hint::spin_loop();
    }
}

/// Global network stack instance (protected by mutex)
static NETWORK_STACK: Mutex<Option<NetworkStack>> = Mutex::new(None);

/// Initialize the global network stack with the given drivers
pub fn init_network_stack(drivers: Vec<Box<dyn NetworkDriver>>) {
    let mut stack = NetworkStack::new();
    for driver in drivers {
        stack.add_device(driver);
    }

    let mut global = NETWORK_STACK.lock();
    *global = Some(stack);
}

/// Get the global network stack instance
pub fn get_network_stack() -> spin::MutexGuard<'static, Option<NetworkStack>> {
    NETWORK_STACK.lock()
}

/// Poll the global network stack
///
/// This should be called regularly from the main loop.
pub fn poll_network_stack() -> Result<usize, NetError> {
    let mut stack = NETWORK_STACK.lock();
    if let Some(ref mut stack) = *stack {
        stack.poll()
    } else {
        Err(NetError::DeviceNotInitialized)
    }
}

/// Run DHCP discovery on every device of the global stack
///
/// Holds the stack for the whole exchange; inbound frames are picked up by
/// the client's wait loop polling the drivers.
pub fn dhcp_discover(config: DhcpConfig) -> Result<DhcpOutcome, NetError> {
    let mut guard = NETWORK_STACK.lock();
    let stack = guard.as_mut().ok_or(NetError::DeviceNotInitialized)?;
    stack.discover(TimerClock, LogDiagnostics, config)
}

/// Release the leases held by every device of the global stack
pub fn dhcp_release() -> Result<(), NetError> {
    let mut guard = NETWORK_STACK.lock();
    let stack = guard.as_mut().ok_or(NetError::DeviceNotInitialized)?;
    stack.release_leases(TimerClock, LogDiagnostics)
}
