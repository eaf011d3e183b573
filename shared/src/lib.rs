#![no_std]

// Shared crate for hostconf
// Kernel services the network crates depend on but do not own

pub mod timer;

pub use timer::{get_frequency, get_ticks, uptime_secs};
