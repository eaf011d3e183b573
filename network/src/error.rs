// Error types for network operations

use alloc::string::String;
use thiserror::Error;

/// Network-related errors
#[derive(Debug, Error)]
pub enum NetError {
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Device not found")]
    DeviceNotFound,

    #[error("Device not initialized")]
    DeviceNotInitialized,

    #[error("DHCP configuration failed: {0}")]
    DhcpConfigFailed(String),
}
