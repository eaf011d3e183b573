// Monotonic timekeeping
// The timer interrupt handler advances a global tick counter; everything
// else derives elapsed time from it.

use core::sync::atomic::{AtomicU64, Ordering};

/// Global tick counter
static TICKS: AtomicU64 = AtomicU64::new(0);

/// Timer frequency in Hz
static TIMER_FREQUENCY: AtomicU64 = AtomicU64::new(100); // Default to 100Hz

/// Record the frequency the timer hardware was programmed with
///
/// # Arguments
///
/// * `frequency_hz` - Interrupt rate in Hz (e.g., 100 for 100Hz = 10ms intervals)
///
/// A frequency of zero is ignored so `uptime_secs` never divides by zero.
pub fn set_frequency(frequency_hz: u64) {
    if frequency_hz != 0 {
        TIMER_FREQUENCY.store(frequency_hz, Ordering::Relaxed);
    }
}

/// Get the current tick count
///
/// The tick count increments on each timer interrupt.
pub fn get_ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Increment the tick counter
///
/// This is called by the timer interrupt handler.
pub fn increment_ticks() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Get the timer frequency in Hz
pub fn get_frequency() -> u64 {
    TIMER_FREQUENCY.load(Ordering::Relaxed)
}

/// Whole seconds since the timer started
///
/// Monotonic and coarse: the value only changes once per second.
pub fn uptime_secs() -> u64 {
    ticks_to_secs(get_ticks(), get_frequency())
}

/// Convert a tick count to whole seconds at the given frequency
pub const fn ticks_to_secs(ticks: u64, frequency_hz: u64) -> u64 {
    if frequency_hz == 0 {
        0
    } else {
        ticks / frequency_hz
    }
}
