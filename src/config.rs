//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, GATT identifiers and sensor bus settings live
//! here so they can be tuned in one place.

// BLE advertising

/// Complete local name carried in the scan response.
pub const DEVICE_NAME: &str = "RHT Peripheral";

/// Advertising interval (ms).
pub const ADV_INTERVAL_MS: u32 = 100;

/// Advertising interval in stack units (0.625 ms). 160 = 100 ms.
pub const ADV_INTERVAL_UNITS: u32 = ADV_INTERVAL_MS * 16 / 10;

/// Advertising duration (10 ms units). 0 = advertise until connected.
pub const ADV_DURATION: u16 = 0;

/// Maximum number of advertising events. 0 = no limit.
pub const ADV_MAX_EVENTS: u8 = 0;

// GATT

/// Environmental Sensing service (0x181A).
pub const ENVIRONMENTAL_SENSING_SERVICE_UUID: u16 = 0x181A;

/// Temperature characteristic (0x2A6E): sint16, 0.01 °C.
pub const TEMPERATURE_CHAR_UUID: u16 = 0x2A6E;

// Notifications

/// Period of the notification timer while a client is subscribed (ms).
pub const NOTIFY_PERIOD_MS: u32 = 1000;

/// Period at which the served temperature value is re-read while a client
/// is connected, subscribed or not (ms).
pub const READ_REFRESH_MS: u32 = 1000;

// RHT sensor (Si70xx family on TWIM0)
//
//   I²C SDA  → P0.26
//   I²C SCL  → P0.27

/// Si70xx 7-bit I²C address.
pub const SI70XX_I2C_ADDR: u8 = 0x40;

/// Time for a 12-bit RH plus 14-bit temperature conversion (ms).
pub const SI70XX_CONVERSION_MS: u32 = 25;

/// Power-up / soft-reset time (ms).
pub const SI70XX_RESET_MS: u32 = 15;

// SoftDevice

/// Concurrent peripheral links.
pub const BLE_CONN_COUNT: u8 = 1;

/// GAP event length (1.25 ms units).
pub const BLE_EVENT_LENGTH: u16 = 24;

/// ATT MTU; the 2-byte temperature fits the default.
pub const BLE_ATT_MTU: u16 = 23;
