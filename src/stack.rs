//! Capability interface between the application core and its collaborators.
//!
//! The BLE stack, the timer subsystem and the RHT sensor driver are owned
//! by the platform. The core only sees these traits, so the same dispatch
//! logic runs against the SoftDevice on target and against recording fakes
//! in host tests.

use crate::error::{SensorError, StackError};

/// Advertising set handle issued by the stack at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvHandle(pub u8);

/// Connection handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnHandle(pub u16);

/// GATT characteristic identifier (attribute handle in the GATT database).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicId(pub u16);

/// Discoverability advertised in the AD flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoverableMode {
    NonDiscoverable,
    LimitedDiscoverable,
    GeneralDiscoverable,
}

/// Legacy advertising PDU kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingMode {
    NonConnectable,
    Scannable,
    Connectable,
}

/// Commands the core issues to the BLE stack.
pub trait BleStack {
    /// Allocate an advertising set.
    fn create_advertising_set(&mut self) -> Result<AdvHandle, StackError>;

    /// Build the advertising payload for `handle`.
    fn generate_adv_payload(
        &mut self,
        handle: AdvHandle,
        mode: DiscoverableMode,
    ) -> Result<(), StackError>;

    /// Interval bounds in 0.625 ms units, duration in 10 ms units
    /// (0 = unlimited), `max_events` 0 = unlimited.
    fn set_adv_timing(
        &mut self,
        handle: AdvHandle,
        interval_min: u32,
        interval_max: u32,
        duration: u16,
        max_events: u8,
    ) -> Result<(), StackError>;

    fn start_advertising(
        &mut self,
        handle: AdvHandle,
        mode: AdvertisingMode,
    ) -> Result<(), StackError>;

    /// Answer a pending user read request.
    fn send_read_response(
        &mut self,
        connection: ConnHandle,
        characteristic: CharacteristicId,
        offset: u16,
        payload: &[u8],
    ) -> Result<(), StackError>;

    /// Push a notification to a subscribed client.
    fn send_notification(
        &mut self,
        connection: ConnHandle,
        characteristic: CharacteristicId,
        payload: &[u8],
    ) -> Result<(), StackError>;
}

/// Periodic timer owned by the platform. Ticks come back to the core as
/// [`crate::peripheral::Event::Tick`].
///
/// Starting a running timer or stopping a stopped one is not defined by
/// the platform; callers keep the calls alternating.
pub trait PeriodicTimer {
    fn start_periodic(&mut self, period_ms: u32) -> Result<(), StackError>;
    fn stop(&mut self) -> Result<(), StackError>;
}

/// One combined relative-humidity / temperature measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RhtSample {
    /// Relative humidity in milli-percent.
    pub humidity: u32,
    /// Temperature in milli-degrees Celsius.
    pub temperature: i32,
}

/// RHT sensor session.
pub trait RhtSensor {
    /// Open the session (power up / probe the device).
    fn init(&mut self) -> Result<(), SensorError>;
    /// Release the session. Reads fail until the next `init`.
    fn deinit(&mut self);
    fn is_initialized(&self) -> bool;
    /// Perform one measurement transaction.
    fn read(&mut self) -> Result<RhtSample, SensorError>;
}
