//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **GATT server** - Environmental Sensing service with one
//!    Temperature characteristic (read + notify).
//! 2. **Stack adapter** - [`SoftdeviceStack`] implements the core's
//!    [`BleStack`] commands on top of `nrf-softdevice`.
//! 3. **Notification timer** - [`timer::TickerTimer`] backs the core's
//!    periodic timer with an embassy `Ticker`.
//!
//! The SoftDevice serves GATT reads from its attribute table, so a read
//! response is realised by storing the value in the table; the task in
//! `main.rs` issues a read request on every new connection and then every
//! `READ_REFRESH_MS` to keep it current.

pub mod timer;

use defmt::{info, warn};
use nrf_softdevice::ble::advertisement_builder::{
    LegacyAdvertisementBuilder, LegacyAdvertisementPayload,
};
use nrf_softdevice::ble::peripheral::{self, AdvertiseError, ConnectableAdvertisement};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::{raw, Softdevice};

use rht_peripheral::config;
use rht_peripheral::stack::{
    AdvHandle, AdvertisingMode, BleStack, CharacteristicId, ConnHandle, DiscoverableMode,
};
use rht_peripheral::{BleTemperature, StackError};

#[nrf_softdevice::gatt_service(uuid = "181a")]
pub struct EnvironmentalSensingService {
    #[characteristic(uuid = "2a6e", read, notify)]
    pub temperature: i16,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub ess: EnvironmentalSensingService,
}

impl Server {
    /// GATT database id of the temperature value.
    pub fn temperature_id(&self) -> CharacteristicId {
        CharacteristicId(self.ess.temperature_value_handle)
    }
}

// Flags + complete list of 16-bit service UUIDs (0x181A).
#[rustfmt::skip]
static GENERAL_ADV_DATA: [u8; 7] = [
    0x02, 0x01, raw::BLE_GAP_ADV_FLAGS_LE_ONLY_GENERAL_DISC_MODE as u8,
    0x03, 0x03, 0x1A, 0x18,
];
#[rustfmt::skip]
static LIMITED_ADV_DATA: [u8; 7] = [
    0x02, 0x01, raw::BLE_GAP_ADV_FLAGS_LE_ONLY_LIMITED_DISC_MODE as u8,
    0x03, 0x03, 0x1A, 0x18,
];
#[rustfmt::skip]
static HIDDEN_ADV_DATA: [u8; 7] = [
    0x02, 0x01, raw::BLE_GAP_ADV_FLAG_BR_EDR_NOT_SUPPORTED as u8,
    0x03, 0x03, 0x1A, 0x18,
];

static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .full_name(config::DEVICE_NAME)
    .build();

/// [`BleStack`] over the SoftDevice.
///
/// The SoftDevice has a single legacy advertising set; `start_advertising`
/// arms it and [`SoftdeviceStack::advertise`] runs it until a central
/// connects.
pub struct SoftdeviceStack {
    server: &'static Server,
    adv_set: Option<AdvHandle>,
    adv_data: &'static [u8],
    adv_config: peripheral::Config,
    armed: bool,
    connection: Option<Connection>,
}

impl SoftdeviceStack {
    pub fn new(server: &'static Server) -> Self {
        Self {
            server,
            adv_set: None,
            adv_data: &GENERAL_ADV_DATA,
            adv_config: peripheral::Config::default(),
            armed: false,
            connection: None,
        }
    }

    /// Advertise with the armed configuration until a central connects.
    pub async fn advertise(&mut self, sd: &Softdevice) -> Result<Connection, AdvertiseError> {
        if !self.armed {
            warn!("Advertising requested before start_advertising");
        }
        let adv = ConnectableAdvertisement::ScannableUndirected {
            adv_data: self.adv_data,
            scan_data: &SCAN_DATA,
        };
        let conn = peripheral::advertise_connectable(sd, adv, &self.adv_config).await?;
        self.armed = false;
        self.connection = Some(conn.clone());
        Ok(conn)
    }

    /// Forget the connection once the GATT server has returned.
    pub fn detach(&mut self) {
        self.connection = None;
    }

    fn check_set(&self, handle: AdvHandle) -> Result<(), StackError> {
        match self.adv_set {
            Some(set) if set == handle => Ok(()),
            _ => Err(StackError::InvalidState),
        }
    }

    fn connection(&self, connection: ConnHandle) -> Result<&Connection, StackError> {
        self.connection
            .as_ref()
            .filter(|conn| conn.handle() == Some(connection.0))
            .ok_or(StackError::NotConnected)
    }

    fn check_characteristic(&self, characteristic: CharacteristicId) -> Result<(), StackError> {
        if characteristic == self.server.temperature_id() {
            Ok(())
        } else {
            Err(StackError::Rejected)
        }
    }
}

impl BleStack for SoftdeviceStack {
    fn create_advertising_set(&mut self) -> Result<AdvHandle, StackError> {
        if self.adv_set.is_some() {
            return Err(StackError::NoResources);
        }
        let handle = AdvHandle(0);
        self.adv_set = Some(handle);
        Ok(handle)
    }

    fn generate_adv_payload(
        &mut self,
        handle: AdvHandle,
        mode: DiscoverableMode,
    ) -> Result<(), StackError> {
        self.check_set(handle)?;
        self.adv_data = match mode {
            DiscoverableMode::GeneralDiscoverable => &GENERAL_ADV_DATA,
            DiscoverableMode::LimitedDiscoverable => &LIMITED_ADV_DATA,
            DiscoverableMode::NonDiscoverable => &HIDDEN_ADV_DATA,
        };
        Ok(())
    }

    fn set_adv_timing(
        &mut self,
        handle: AdvHandle,
        interval_min: u32,
        interval_max: u32,
        duration: u16,
        max_events: u8,
    ) -> Result<(), StackError> {
        self.check_set(handle)?;
        // Legacy advertising takes a single interval.
        self.adv_config.interval = (interval_min + interval_max) / 2;
        self.adv_config.timeout = (duration != 0).then_some(duration);
        self.adv_config.max_events = (max_events != 0).then_some(max_events);
        Ok(())
    }

    fn start_advertising(
        &mut self,
        handle: AdvHandle,
        mode: AdvertisingMode,
    ) -> Result<(), StackError> {
        self.check_set(handle)?;
        if mode != AdvertisingMode::Connectable {
            return Err(StackError::InvalidState);
        }
        self.armed = true;
        Ok(())
    }

    fn send_read_response(
        &mut self,
        connection: ConnHandle,
        characteristic: CharacteristicId,
        _offset: u16,
        payload: &[u8],
    ) -> Result<(), StackError> {
        self.connection(connection)?;
        self.check_characteristic(characteristic)?;
        let value = BleTemperature::from_le_bytes(payload).ok_or(StackError::Rejected)?;
        self.server
            .ess
            .temperature_set(&value.raw())
            .map_err(|_| StackError::Rejected)
    }

    fn send_notification(
        &mut self,
        connection: ConnHandle,
        characteristic: CharacteristicId,
        payload: &[u8],
    ) -> Result<(), StackError> {
        self.check_characteristic(characteristic)?;
        let value = BleTemperature::from_le_bytes(payload).ok_or(StackError::Rejected)?;
        let conn = self.connection(connection)?;
        // Keep reads consistent with what was pushed.
        if let Err(e) = self.server.ess.temperature_set(&value.raw()) {
            warn!("Stored temperature not updated: {:?}", e);
        }
        self.server
            .ess
            .temperature_notify(conn, &value.raw())
            .map_err(|_| StackError::Rejected)?;
        info!("Notified {}", value.raw());
        Ok(())
    }
}
