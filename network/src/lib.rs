#![no_std]

// Network stack for hostconf
// Provides the driver interface, the interface configuration tables and the
// DHCP client that fills them in

#[macro_use]
extern crate alloc;

pub mod dhcp;
pub mod drivers;
pub mod error;
pub mod ipconfig;
pub mod stack;

// Re-export commonly used types
pub use dhcp::{DhcpClient, DhcpConfig, DhcpOutcome, DhcpState, Lease};
pub use drivers::NetworkDriver;
pub use error::NetError;
pub use ipconfig::{IpConfig, IpConfigStore};
pub use stack::{
    dhcp_discover, dhcp_release, get_network_stack, init_network_stack, poll_network_stack,
    NetworkStack,
};
