//! Turning an accepted reply into system configuration
//!
//! This is the only place where protocol state becomes system state.

use alloc::string::String;
use smoltcp::wire::Ipv4Address;

use super::host::{ConfigStore, DeviceInfo, Diagnostics};
use crate::error::NetError;

/// Configuration granted by a server, ready to install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub client: Ipv4Address,
    pub subnet: Ipv4Address,
    pub gateway: Ipv4Address,
    pub dns: Ipv4Address,
}

/// Addresses decoded from an Ack or Nak; any of them may be missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaseCandidate {
    pub client: Option<Ipv4Address>,
    pub subnet: Option<Ipv4Address>,
    pub gateway: Option<Ipv4Address>,
    pub dns: Option<Ipv4Address>,
}

impl LeaseCandidate {
    /// A lease, if every address is usable
    pub fn resolve(&self) -> Option<Lease> {
        Some(Lease {
            client: self.client?,
            subnet: self.subnet?,
            gateway: self.gateway?,
            dns: self.dns?,
        })
    }
}

impl From<Lease> for LeaseCandidate {
    fn from(lease: Lease) -> Self {
        Self {
            client: Some(lease.client),
            subnet: Some(lease.subnet),
            gateway: Some(lease.gateway),
            dns: Some(lease.dns),
        }
    }
}

/// Clear all configuration, then install `candidate` on every device
///
/// Either every device ends up configured or nothing is written after the
/// initial clear. With `verbose` set, each step is reported to `diagnostics`.
pub fn apply_lease<S, D>(
    store: &mut S,
    devices: &[DeviceInfo],
    candidate: &LeaseCandidate,
    verbose: bool,
    diagnostics: &mut D,
) -> Result<Lease, NetError>
where
    S: ConfigStore + ?Sized,
    D: Diagnostics + ?Sized,
{
    store.clear_all();

    let Some(lease) = candidate.resolve() else {
        diagnostics.send("Parsing DHCP ACK packet failed, can't apply network configuration.");
        return Err(NetError::DhcpConfigFailed(String::from(
            "reply carried unusable addresses",
        )));
    };

    for device in devices {
        if verbose {
            diagnostics.send(&format!(
                "[DHCP ACK][{}] Packet received, applying IP configuration...",
                device.name
            ));
            diagnostics.send(&format!("   IP Address  : {}", lease.client));
            diagnostics.send(&format!("   Subnet mask : {}", lease.subnet));
            diagnostics.send(&format!("   Gateway     : {}", lease.gateway));
            diagnostics.send(&format!("   DNS server  : {}", lease.dns));
        }

        install(store, device, &lease);

        if verbose {
            diagnostics.send(&format!(
                "[DHCP CONFIG][{}] IP configuration applied.",
                device.name
            ));
        }
    }

    Ok(lease)
}

/// Write one device's addresses and register the DNS server
pub fn install<S: ConfigStore + ?Sized>(store: &mut S, device: &DeviceInfo, lease: &Lease) {
    store.set_addresses(device, lease.client, lease.subnet, lease.gateway);
    store.add_dns_server(lease.dns);
}

/// Clear all configuration and put every device back on 0.0.0.0
pub fn revert<S: ConfigStore + ?Sized>(store: &mut S, devices: &[DeviceInfo]) {
    store.clear_all();
    for device in devices {
        store.set_addresses(
            device,
            Ipv4Address::UNSPECIFIED,
            Ipv4Address::UNSPECIFIED,
            Ipv4Address::UNSPECIFIED,
        );
    }
}
