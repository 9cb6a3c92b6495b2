//! BLE temperature value and the sensor reader that produces it.
//!
//! Wire format (2 bytes, little-endian):
//! ```text
//! sint16, resolution 0.01 °C
//! 0x8000 (-32768) = reading failed
//! ```

use crate::error::SensorError;
use crate::stack::RhtSensor;

/// Temperature in hundredths of a degree Celsius.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BleTemperature(i16);

impl BleTemperature {
    /// Serialized size in bytes.
    pub const SIZE: usize = 2;

    /// "No data this cycle". Successful conversions never produce it.
    pub const SENSOR_FAILURE: Self = Self(i16::MIN);

    /// Convert a driver reading in milli-degrees (truncating toward zero).
    ///
    /// Returns `None` when the result does not fit, including the one
    /// value that would collide with [`Self::SENSOR_FAILURE`].
    pub fn from_millidegrees(millidegrees: i32) -> Option<Self> {
        let hundredths = millidegrees / 10;
        if hundredths <= i16::MIN as i32 || hundredths > i16::MAX as i32 {
            return None;
        }
        Some(Self(hundredths as i16))
    }

    pub const fn from_raw(raw: i16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i16 {
        self.0
    }

    pub const fn is_failure(self) -> bool {
        self.0 == i16::MIN
    }

    pub const fn to_le_bytes(self) -> [u8; Self::SIZE] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(Self(i16::from_le_bytes([data[0], data[1]])))
    }

    /// Split into sign, whole degrees and hundredths for display.
    /// `None` for the failure sentinel.
    pub fn celsius(self) -> Option<Celsius> {
        if self.is_failure() {
            return None;
        }
        let magnitude = self.0.unsigned_abs();
        Some(Celsius {
            negative: self.0 < 0,
            whole: magnitude / 100,
            hundredths: (magnitude % 100) as u8,
        })
    }
}

/// Human-readable rendering of a [`BleTemperature`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Celsius {
    pub negative: bool,
    pub whole: u16,
    pub hundredths: u8,
}

impl Celsius {
    pub const fn sign(&self) -> &'static str {
        if self.negative {
            "-"
        } else {
            ""
        }
    }
}

impl core::fmt::Display for Celsius {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}.{:02}", self.sign(), self.whole, self.hundredths)
    }
}

/// Read the sensor once and return the temperature in BLE format.
///
/// A released sensor session is reopened first. Any failure is logged and
/// mapped to [`BleTemperature::SENSOR_FAILURE`]; nothing is retried.
pub fn read_ble_temperature<S: RhtSensor>(sensor: &mut S) -> BleTemperature {
    match read_temperature(sensor) {
        Ok(temperature) => {
            info!(
                "Temperature read and converted: {} (BLE format)",
                temperature.raw()
            );
            temperature
        }
        Err(e) => {
            error!("RHT read failed: {:?}", e);
            BleTemperature::SENSOR_FAILURE
        }
    }
}

fn read_temperature<S: RhtSensor>(sensor: &mut S) -> Result<BleTemperature, SensorError> {
    if !sensor.is_initialized() {
        debug!("RHT session closed, reopening");
        sensor.init()?;
    }
    let sample = sensor.read()?;
    BleTemperature::from_millidegrees(sample.temperature).ok_or(SensorError::OutOfRange)
}
