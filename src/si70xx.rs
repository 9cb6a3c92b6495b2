//! Minimal blocking driver for the Si70xx relative-humidity/temperature
//! sensor family (Si7006, Si7013, Si7020, Si7021).
//!
//! One measurement transaction:
//! ```text
//! W 0xF5            start RH conversion (no clock stretching)
//!   wait ~25 ms
//! R [MSB, LSB, CRC] RH code
//! W 0xE0            fetch the temperature measured for that RH
//! R [MSB, LSB]      temperature code
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config;
use crate::error::SensorError;
use crate::stack::{RhtSample, RhtSensor};

const CMD_MEASURE_RH_NO_HOLD: u8 = 0xF5;
const CMD_READ_TEMP_FROM_RH: u8 = 0xE0;
const CMD_RESET: u8 = 0xFE;
const CMD_READ_ID_2: [u8; 2] = [0xFC, 0xC9];

/// First byte of electronic ID 2 for the supported parts.
const DEVICE_IDS: [u8; 4] = [0x06, 0x0D, 0x14, 0x15];

pub struct Si70xx<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    device_id: Option<u8>,
}

impl<I2C: I2c, D: DelayNs> Si70xx<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, config::SI70XX_I2C_ADDR)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            device_id: None,
        }
    }

    /// Device id read during `init`, if the session is open.
    pub fn device_id(&self) -> Option<u8> {
        self.device_id
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    // Commands are copied to the stack first: TWIM EasyDMA cannot read
    // from flash.
    fn command(&mut self, cmd: u8) -> Result<(), SensorError> {
        let buf = [cmd];
        self.i2c
            .write(self.address, &buf)
            .map_err(|_| SensorError::Bus)
    }

    fn measure(&mut self) -> Result<RhtSample, SensorError> {
        self.command(CMD_MEASURE_RH_NO_HOLD)?;
        self.delay.delay_ms(config::SI70XX_CONVERSION_MS);

        let mut rh = [0u8; 3];
        self.i2c
            .read(self.address, &mut rh)
            .map_err(|_| SensorError::Bus)?;
        if crc8(&rh[..2]) != rh[2] {
            return Err(SensorError::Crc);
        }

        let cmd = [CMD_READ_TEMP_FROM_RH];
        let mut temp = [0u8; 2];
        self.i2c
            .write_read(self.address, &cmd, &mut temp)
            .map_err(|_| SensorError::Bus)?;

        Ok(RhtSample {
            humidity: rh_millipercent(u16::from_be_bytes([rh[0], rh[1]])),
            temperature: temp_millidegrees(u16::from_be_bytes(temp)),
        })
    }
}

impl<I2C: I2c, D: DelayNs> RhtSensor for Si70xx<I2C, D> {
    fn init(&mut self) -> Result<(), SensorError> {
        self.device_id = None;
        self.command(CMD_RESET)?;
        self.delay.delay_ms(config::SI70XX_RESET_MS);

        let cmd = CMD_READ_ID_2;
        let mut id = [0u8; 6];
        self.i2c
            .write_read(self.address, &cmd, &mut id)
            .map_err(|_| SensorError::Bus)?;
        if !DEVICE_IDS.contains(&id[0]) {
            return Err(SensorError::NotPresent);
        }

        info!("Si70xx id {:#x} found at {:#x}", id[0], self.address);
        self.device_id = Some(id[0]);
        Ok(())
    }

    fn deinit(&mut self) {
        self.device_id = None;
    }

    fn is_initialized(&self) -> bool {
        self.device_id.is_some()
    }

    fn read(&mut self) -> Result<RhtSample, SensorError> {
        if !self.is_initialized() {
            return Err(SensorError::NotInitialized);
        }
        self.measure()
    }
}

/// RH code → milli-percent, clamped to 0..=100 %.
pub fn rh_millipercent(code: u16) -> u32 {
    let rh = ((code as i32 * 15625) >> 13) - 6000;
    rh.clamp(0, 100_000) as u32
}

/// Temperature code → milli-degrees Celsius.
pub fn temp_millidegrees(code: u16) -> i32 {
    ((code as i32 * 21965) >> 13) - 46850
}

/// CRC-8, polynomial x^8 + x^5 + x^4 + 1 (0x31), initial value 0.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}
