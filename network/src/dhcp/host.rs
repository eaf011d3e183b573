//! Interfaces the DHCP client consumes from the surrounding kernel
//!
//! The client never touches drivers, the configuration tables or the timer
//! directly. Everything goes through these traits so the exchange can be
//! driven by the real network stack or by a scripted host in tests.

use alloc::string::String;
use alloc::vec::Vec;
use smoltcp::wire::{EthernetAddress, Ipv4Address};

use crate::error::NetError;

/// A network device as seen by the DHCP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position in the stack's device table
    pub index: usize,
    /// Human-readable interface name
    pub name: String,
    /// Hardware address
    pub mac: EthernetAddress,
}

impl DeviceInfo {
    pub fn new(index: usize, name: &str, mac: [u8; 6]) -> Self {
        Self {
            index,
            name: String::from(name),
            mac: EthernetAddress(mac),
        }
    }
}

/// System-wide IP/DNS configuration
///
/// Writes must be idempotent: repeating `clear_all` followed by the same
/// `set_addresses`/`add_dns_server` calls yields the same state.
pub trait ConfigStore {
    /// Install address, subnet mask and gateway for a device
    fn set_addresses(
        &mut self,
        device: &DeviceInfo,
        client: Ipv4Address,
        subnet: Ipv4Address,
        gateway: Ipv4Address,
    );

    /// Remove the IP configuration of every device
    ///
    /// The DNS server list is kept; only interface addresses are dropped.
    fn clear_all(&mut self);

    /// Add a DNS server to the system list
    fn add_dns_server(&mut self, address: Ipv4Address);

    /// Local interface address on the network containing `address`
    fn network_containing(&self, address: Ipv4Address) -> Option<Ipv4Address>;

    /// Gateway currently configured for a device
    fn gateway(&self, device: &DeviceInfo) -> Option<Ipv4Address>;
}

/// The network stack as seen by the DHCP client
pub trait NetworkHost: ConfigStore {
    /// Every known network device
    fn devices(&self) -> Vec<DeviceInfo>;

    /// Queue a frame for transmission
    fn enqueue_outbound(&mut self, frame: Vec<u8>);

    /// Push every queued frame onto the wire
    fn flush(&mut self) -> Result<(), NetError>;

    /// Called on every iteration of a receive wait
    ///
    /// The real stack polls its drivers here so replies reach the receive
    /// queue while the client spins.
    fn relax(&mut self) {
        core::hint::spin_loop();
    }
}

impl<T: ConfigStore + ?Sized> ConfigStore for &mut T {
    fn set_addresses(
        &mut self,
        device: &DeviceInfo,
        client: Ipv4Address,
        subnet: Ipv4Address,
        gateway: Ipv4Address,
    ) {
        (**self).set_addresses(device, client, subnet, gateway)
    }

    fn clear_all(&mut self) {
        (**self).clear_all()
    }

    fn add_dns_server(&mut self, address: Ipv4Address) {
        (**self).add_dns_server(address)
    }

    fn network_containing(&self, address: Ipv4Address) -> Option<Ipv4Address> {
        (**self).network_containing(address)
    }

    fn gateway(&self, device: &DeviceInfo) -> Option<Ipv4Address> {
        (**self).gateway(device)
    }
}

impl<T: NetworkHost + ?Sized> NetworkHost for &mut T {
    fn devices(&self) -> Vec<DeviceInfo> {
        (**self).devices()
    }

    fn enqueue_outbound(&mut self, frame: Vec<u8>) {
        (**self).enqueue_outbound(frame)
    }

    fn flush(&mut self) -> Result<(), NetError> {
        (**self).flush()
    }

    fn relax(&mut self) {
        (**self).relax()
    }
}

/// Monotonic whole-second counter
pub trait Clock {
    fn now_secs(&self) -> u64;
}

/// Clock backed by the kernel tick counter
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerClock;

impl Clock for TimerClock {
    fn now_secs(&self) -> u64 {
        hostconf_shared::timer::uptime_secs()
    }
}

/// Operator-visible diagnostics
///
/// Sinks must not fail; a line that cannot be written is dropped.
pub trait Diagnostics {
    fn send(&mut self, line: &str);
}

/// Forwards diagnostics to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn send(&mut self, line: &str) {
        log::info!("{}", line);
    }
}

impl Diagnostics for Vec<String> {
    fn send(&mut self, line: &str) {
        self.push(String::from(line));
    }
}

impl<T: Diagnostics + ?Sized> Diagnostics for &mut T {
    fn send(&mut self, line: &str) {
        (**self).send(line)
    }
}
