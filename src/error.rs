//! Unified error type for rht-peripheral.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

/// Top-level error type returned by the event dispatcher.
///
/// Every variant is a stack-side failure the firmware cannot recover
/// from; the image asserts on it. Sensor failures never surface here,
/// they are folded into [`crate::temperature::BleTemperature::SENSOR_FAILURE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A BLE stack command (advertising setup, advertising start) failed.
    Stack(StackError),

    /// The periodic timer refused a start or stop.
    Timer(StackError),

    /// Advertising was asked to restart before the boot event created
    /// the advertising set.
    NotBooted,
}

/// Failure reported by the BLE stack or the timer subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackError {
    /// Raw status code from the vendor stack.
    Raw(u32),
    /// The stack has no free advertising set / timer slot.
    NoResources,
    /// Command issued in a state where the stack does not accept it.
    InvalidState,
    /// The connection handle is unknown or already closed.
    NotConnected,
    /// The GATT server rejected the value.
    Rejected,
}

/// Failure of one RHT sensor transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// The sensor session is closed.
    NotInitialized,
    /// No supported sensor answered on the bus.
    NotPresent,
    /// I²C transaction failed.
    Bus,
    /// Measurement checksum mismatch.
    Crc,
    /// Reading does not fit the BLE temperature format.
    OutOfRange,
}

// Convenience conversions

impl From<StackError> for Error {
    fn from(e: StackError) -> Self {
        Error::Stack(e)
    }
}
