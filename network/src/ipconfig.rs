// IP and DNS configuration tables
// The system of record for interface addresses; outlives any DHCP session.

use alloc::vec::Vec;
use smoltcp::wire::Ipv4Address;

use crate::dhcp::host::{ConfigStore, DeviceInfo};

/// Address configuration of one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpConfig {
    /// Interface address
    pub address: Ipv4Address,
    /// Subnet mask
    pub subnet_mask: Ipv4Address,
    /// Gateway/router address
    pub gateway: Ipv4Address,
}

impl IpConfig {
    /// All-zero configuration of an interface waiting for DHCP
    pub const UNCONFIGURED: Self = Self {
        address: Ipv4Address::UNSPECIFIED,
        subnet_mask: Ipv4Address::UNSPECIFIED,
        gateway: Ipv4Address::UNSPECIFIED,
    };

    pub fn new(address: Ipv4Address, subnet_mask: Ipv4Address, gateway: Ipv4Address) -> Self {
        Self {
            address,
            subnet_mask,
            gateway,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.address.is_unspecified()
    }

    /// Prefix length of the subnet mask (number of leading one bits)
    pub fn prefix_len(&self) -> u8 {
        u32::from_be_bytes(self.subnet_mask.0).leading_ones() as u8
    }

    /// Whether `address` lies on this interface's network
    pub fn contains(&self, address: Ipv4Address) -> bool {
        if !self.is_configured() {
            return false;
        }
        let mask = u32::from_be_bytes(self.subnet_mask.0);
        let local = u32::from_be_bytes(self.address.0);
        let other = u32::from_be_bytes(address.0);
        local & mask == other & mask
    }
}

/// Per-device address table plus the system DNS list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpConfigStore {
    interfaces: Vec<(usize, IpConfig)>,
    dns: Vec<Ipv4Address>,
}

impl IpConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration of the device at `index`, if any
    pub fn get(&self, index: usize) -> Option<&IpConfig> {
        self.interfaces
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, config)| config)
    }

    pub fn dns_servers(&self) -> &[Ipv4Address] {
        &self.dns
    }

    /// Number of devices with an entry (configured or zeroed)
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl ConfigStore for IpConfigStore {
    fn set_addresses(
        &mut self,
        device: &DeviceInfo,
        client: Ipv4Address,
        subnet: Ipv4Address,
        gateway: Ipv4Address,
    ) {
        let config = IpConfig::new(client, subnet, gateway);
        match self.interfaces.iter_mut().find(|(i, _)| *i == device.index) {
            Some((_, existing)) => *existing = config,
            None => self.interfaces.push((device.index, config)),
        }
    }

    fn clear_all(&mut self) {
        self.interfaces.clear();
    }

    fn add_dns_server(&mut self, address: Ipv4Address) {
        if !self.dns.contains(&address) {
            self.dns.push(address);
        }
    }

    fn network_containing(&self, address: Ipv4Address) -> Option<Ipv4Address> {
        self.interfaces
            .iter()
            .find(|(_, config)| config.contains(address))
            .map(|(_, config)| config.address)
    }

    fn gateway(&self, device: &DeviceInfo) -> Option<Ipv4Address> {
        self.get(device.index)
            .map(|config| config.gateway)
            .filter(|gateway| !gateway.is_unspecified())
    }
}
