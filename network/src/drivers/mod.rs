// Network driver interface

use crate::error::NetError;
use alloc::vec::Vec;

/// Trait for network drivers
///
/// All network drivers must implement this trait to be registered with the network stack.
pub trait NetworkDriver: Send {
    /// Human-readable interface name (e.g. "eth0")
    fn name(&self) -> &str;

    /// Send a raw Ethernet frame
    ///
    /// # Arguments
    /// * `packet` - The Ethernet frame to send (including Ethernet header)
    ///
    /// # Returns
    /// * `Ok(())` if the packet was successfully queued for transmission
    /// * `Err(NetError)` if transmission failed
    fn send(&mut self, packet: &[u8]) -> Result<(), NetError>;

    /// Receive a raw Ethernet frame (non-blocking)
    ///
    /// # Returns
    /// * `Ok(Some(packet))` if a packet was received
    /// * `Ok(None)` if no packet is available
    /// * `Err(NetError)` if an error occurred
    fn receive(&mut self) -> Result<Option<Vec<u8>>, NetError>;

    /// Get the MAC address of the network interface
    fn mac_address(&self) -> [u8; 6];

    /// Check if the network link is up
    fn is_link_up(&self) -> bool;

    /// Poll the hardware (must be called regularly)
    ///
    /// Drivers without deferred work can rely on the default no-op.
    fn poll(&mut self) -> Result<(), NetError> {
        Ok(())
    }
}
