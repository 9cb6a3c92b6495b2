//! Host-testable core of the rht-peripheral firmware.
//!
//! Everything here is `no_std` and talks to the BLE stack, the timer
//! subsystem and the sensor only through the traits in [`stack`], so the
//! whole dispatch path runs on the host against fakes.
//!
//! Usage: `cargo test`
//!
//! Note: The embedded binary (main.rs, feature `embedded`) implements the
//! traits over the SoftDevice, an embassy `Ticker` and TWIM0, and links
//! this library for the application logic.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod notify_timer;
pub mod peripheral;
pub mod si70xx;
pub mod stack;
pub mod temperature;

pub use error::{Error, SensorError, StackError};
pub use peripheral::{Event, Peripheral, StatusFlags};
pub use temperature::{read_ble_temperature, BleTemperature};

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::error::{SensorError, StackError};
    use super::fmt::capture::{self, Level};
    use super::notify_timer::{ClientConfig, NotifyTimer, TimerState};
    use super::si70xx::{self, Si70xx};
    use super::stack::{PeriodicTimer, RhtSample, RhtSensor};
    use super::temperature::{read_ble_temperature, BleTemperature};
    use super::Error;

    // ════════════════════════════════════════════════════════════════════════
    // Fakes
    // ════════════════════════════════════════════════════════════════════════

    struct FakeSensor {
        initialized: bool,
        reading: Result<i32, SensorError>,
        init_result: Result<(), SensorError>,
        reads: usize,
        inits: usize,
    }

    impl FakeSensor {
        fn reading(milli: i32) -> Self {
            Self {
                initialized: true,
                reading: Ok(milli),
                init_result: Ok(()),
                reads: 0,
                inits: 0,
            }
        }

        fn failing(e: SensorError) -> Self {
            Self {
                reading: Err(e),
                ..Self::reading(0)
            }
        }
    }

    impl RhtSensor for FakeSensor {
        fn init(&mut self) -> Result<(), SensorError> {
            self.inits += 1;
            self.init_result?;
            self.initialized = true;
            Ok(())
        }

        fn deinit(&mut self) {
            self.initialized = false;
        }

        fn is_initialized(&self) -> bool {
            self.initialized
        }

        fn read(&mut self) -> Result<RhtSample, SensorError> {
            self.reads += 1;
            if !self.initialized {
                return Err(SensorError::NotInitialized);
            }
            self.reading.map(|temperature| RhtSample {
                humidity: 45_000,
                temperature,
            })
        }
    }

    #[derive(Default)]
    struct FakeTimer {
        starts: heapless::Vec<u32, 8>,
        stops: usize,
        fail: Option<StackError>,
    }

    impl PeriodicTimer for FakeTimer {
        fn start_periodic(&mut self, period_ms: u32) -> Result<(), StackError> {
            if let Some(e) = self.fail {
                return Err(e);
            }
            self.starts.push(period_ms).unwrap();
            Ok(())
        }

        fn stop(&mut self) -> Result<(), StackError> {
            if let Some(e) = self.fail {
                return Err(e);
            }
            self.stops += 1;
            Ok(())
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Temperature Conversion Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn conversion_divides_by_ten() {
        assert_eq!(BleTemperature::from_millidegrees(2350).unwrap().raw(), 235);
        assert_eq!(BleTemperature::from_millidegrees(0).unwrap().raw(), 0);
        assert_eq!(BleTemperature::from_millidegrees(100_000).unwrap().raw(), 10_000);
    }

    #[test]
    fn conversion_truncates_toward_zero() {
        assert_eq!(BleTemperature::from_millidegrees(2359).unwrap().raw(), 235);
        assert_eq!(BleTemperature::from_millidegrees(-2359).unwrap().raw(), -235);
        assert_eq!(BleTemperature::from_millidegrees(-9).unwrap().raw(), 0);
        assert_eq!(BleTemperature::from_millidegrees(9).unwrap().raw(), 0);
    }

    #[test]
    fn conversion_never_yields_sentinel() {
        // Most negative representable reading.
        let t = BleTemperature::from_millidegrees(-327_679).unwrap();
        assert_eq!(t.raw(), -32_767);
        assert!(!t.is_failure());

        // Would divide to exactly -32768: rejected instead of colliding.
        assert!(BleTemperature::from_millidegrees(-327_680).is_none());
        assert!(BleTemperature::from_millidegrees(-327_689).is_none());
        assert!(BleTemperature::from_millidegrees(i32::MIN).is_none());
    }

    #[test]
    fn conversion_upper_bound() {
        assert_eq!(BleTemperature::from_millidegrees(327_679).unwrap().raw(), 32_767);
        assert!(BleTemperature::from_millidegrees(327_680).is_none());
        assert!(BleTemperature::from_millidegrees(i32::MAX).is_none());
    }

    #[test]
    fn wire_bytes_little_endian() {
        assert_eq!(BleTemperature::from_raw(235).to_le_bytes(), [0xEB, 0x00]);
        assert_eq!(BleTemperature::SENSOR_FAILURE.to_le_bytes(), [0x00, 0x80]);
        assert_eq!(BleTemperature::from_raw(-1).to_le_bytes(), [0xFF, 0xFF]);
        assert_eq!(
            BleTemperature::from_le_bytes(&[0xEB, 0x00]),
            Some(BleTemperature::from_raw(235))
        );
        assert!(BleTemperature::from_le_bytes(&[0xEB]).is_none());
    }

    #[test]
    fn celsius_rendering() {
        let c = BleTemperature::from_raw(2305).celsius().unwrap();
        assert_eq!((c.negative, c.whole, c.hundredths), (false, 23, 5));
        assert_eq!(format!("{}", c), "23.05");

        // Sign survives when the whole part is zero.
        let c = BleTemperature::from_raw(-50).celsius().unwrap();
        assert_eq!(format!("{}", c), "-0.50");

        assert_eq!(
            format!("{}", BleTemperature::from_raw(-32_767).celsius().unwrap()),
            "-327.67"
        );
        assert!(BleTemperature::SENSOR_FAILURE.celsius().is_none());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Sensor Reader Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn reader_converts_successful_read() {
        let mut sensor = FakeSensor::reading(2350);
        capture::take();
        assert_eq!(read_ble_temperature(&mut sensor).raw(), 235);
        assert_eq!(sensor.reads, 1);

        let lines = capture::take();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Level::Info);
    }

    #[test]
    fn reader_performs_exactly_one_transaction() {
        let mut sensor = FakeSensor::failing(SensorError::Bus);
        let _ = read_ble_temperature(&mut sensor);
        assert_eq!(sensor.reads, 1);
    }

    #[test]
    fn reader_failure_returns_sentinel() {
        let mut sensor = FakeSensor::failing(SensorError::Bus);
        capture::take();
        let t = read_ble_temperature(&mut sensor);
        assert_eq!(t, BleTemperature::SENSOR_FAILURE);
        assert_eq!(t.raw(), -32_768);

        let lines = capture::take();
        assert_eq!(lines, [(Level::Error, "RHT read failed: {:?}")]);
    }

    #[test]
    fn reader_out_of_range_returns_sentinel() {
        let mut sensor = FakeSensor::reading(-400_000);
        assert!(read_ble_temperature(&mut sensor).is_failure());
    }

    #[test]
    fn reader_reopens_released_session() {
        let mut sensor = FakeSensor::reading(-1250);
        sensor.deinit();
        assert_eq!(read_ble_temperature(&mut sensor).raw(), -125);
        assert_eq!(sensor.inits, 1);
        assert!(sensor.is_initialized());
    }

    #[test]
    fn reader_init_failure_returns_sentinel_without_read() {
        let mut sensor = FakeSensor::reading(2000);
        sensor.deinit();
        sensor.init_result = Err(SensorError::NotPresent);
        assert!(read_ble_temperature(&mut sensor).is_failure());
        assert_eq!(sensor.reads, 0);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Notification Timer Tests
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn client_config_decoding() {
        assert_eq!(ClientConfig::from_raw(0x0000), ClientConfig::Disabled);
        assert_eq!(ClientConfig::from_raw(0x0001), ClientConfig::Notify);
        assert_eq!(ClientConfig::from_raw(0x0002), ClientConfig::Other(2));
    }

    #[test]
    fn timer_enable_starts_with_period() {
        let mut ctl = NotifyTimer::new(1000);
        let mut timer = FakeTimer::default();
        ctl.apply(ClientConfig::Notify, &mut timer).unwrap();
        assert_eq!(ctl.state(), TimerState::Running);
        assert_eq!(timer.starts.as_slice(), &[1000]);
    }

    #[test]
    fn timer_double_enable_starts_once() {
        let mut ctl = NotifyTimer::new(1000);
        let mut timer = FakeTimer::default();
        ctl.apply(ClientConfig::Notify, &mut timer).unwrap();
        ctl.apply(ClientConfig::Notify, &mut timer).unwrap();
        assert_eq!(timer.starts.len(), 1);
    }

    #[test]
    fn timer_disable_without_enable_does_not_stop() {
        let mut ctl = NotifyTimer::new(1000);
        let mut timer = FakeTimer::default();
        ctl.apply(ClientConfig::Disabled, &mut timer).unwrap();
        assert_eq!(timer.stops, 0);
        assert_eq!(ctl.state(), TimerState::Stopped);
    }

    #[test]
    fn timer_enable_disable_alternate() {
        let mut ctl = NotifyTimer::new(1000);
        let mut timer = FakeTimer::default();
        ctl.apply(ClientConfig::Notify, &mut timer).unwrap();
        ctl.apply(ClientConfig::Disabled, &mut timer).unwrap();
        ctl.apply(ClientConfig::Disabled, &mut timer).unwrap();
        ctl.apply(ClientConfig::Notify, &mut timer).unwrap();
        assert_eq!(timer.starts.len(), 2);
        assert_eq!(timer.stops, 1);
        assert!(ctl.is_running());
    }

    #[test]
    fn timer_ignores_other_config_values() {
        let mut ctl = NotifyTimer::new(1000);
        let mut timer = FakeTimer::default();
        ctl.apply(ClientConfig::Other(0x0002), &mut timer).unwrap();
        assert!(timer.starts.is_empty());
        assert_eq!(ctl.state(), TimerState::Stopped);
    }

    #[test]
    fn timer_start_failure_is_reported_and_state_kept() {
        let mut ctl = NotifyTimer::new(1000);
        let mut timer = FakeTimer {
            fail: Some(StackError::NoResources),
            ..FakeTimer::default()
        };
        let err = ctl.apply(ClientConfig::Notify, &mut timer).unwrap_err();
        assert_eq!(err, Error::Timer(StackError::NoResources));
        assert_eq!(ctl.state(), TimerState::Stopped);
    }

    #[test]
    fn timer_ticks_count_up() {
        let mut ctl = NotifyTimer::new(1000);
        assert_eq!(ctl.tick(), 1);
        assert_eq!(ctl.tick(), 2);
        assert_eq!(ctl.ticks(), 2);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Si70xx Driver Tests
    // ════════════════════════════════════════════════════════════════════════

    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

    /// Scripted bus: answers reads from a queue, records writes.
    #[derive(Default)]
    struct FakeBus {
        reads: heapless::Deque<heapless::Vec<u8, 8>, 8>,
        writes: heapless::Vec<heapless::Vec<u8, 4>, 16>,
        fail: bool,
    }

    impl FakeBus {
        fn answer(&mut self, bytes: &[u8]) {
            self.reads
                .push_back(heapless::Vec::from_slice(bytes).unwrap())
                .unwrap();
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            assert_eq!(address, 0x40);
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.writes
                            .push(heapless::Vec::from_slice(&bytes[..]).unwrap())
                            .unwrap();
                    }
                    Operation::Read(buf) => {
                        let data = self.reads.pop_front().ok_or(ErrorKind::Other)?;
                        if data.len() < buf.len() {
                            return Err(ErrorKind::Other);
                        }
                        buf.copy_from_slice(&data[..buf.len()]);
                    }
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl embedded_hal::delay::DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn probed_sensor() -> Si70xx<FakeBus, NoDelay> {
        let mut bus = FakeBus::default();
        bus.answer(&[0x15, 0xFF, 0x00, 0x00, 0x00, 0x00]);
        let mut sensor = Si70xx::new(bus, NoDelay);
        sensor.init().unwrap();
        sensor
    }

    #[test]
    fn si70xx_crc_known_vectors() {
        assert_eq!(si70xx::crc8(&[0x00, 0x00]), 0x00);
        assert_eq!(si70xx::crc8(&[0x80, 0x00]), 0x23);
        assert_eq!(si70xx::crc8(&[0x66, 0x66]), 0x12);
    }

    #[test]
    fn si70xx_code_conversions() {
        assert_eq!(si70xx::temp_millidegrees(0x6000), 19_045);
        assert_eq!(si70xx::temp_millidegrees(0x0000), -46_850);
        assert_eq!(si70xx::rh_millipercent(0x8000), 56_500);
        assert_eq!(si70xx::rh_millipercent(0x0000), 0);
        assert_eq!(si70xx::rh_millipercent(0xFFFF), 100_000);
    }

    #[test]
    fn si70xx_init_probes_device() {
        let sensor = probed_sensor();
        assert!(sensor.is_initialized());
        assert_eq!(sensor.device_id(), Some(0x15));

        let (bus, _) = sensor.release();
        assert_eq!(bus.writes[0].as_slice(), &[0xFE]);
        assert_eq!(bus.writes[1].as_slice(), &[0xFC, 0xC9]);
    }

    #[test]
    fn si70xx_init_rejects_unknown_device() {
        let mut bus = FakeBus::default();
        bus.answer(&[0x42, 0, 0, 0, 0, 0]);
        let mut sensor = Si70xx::new(bus, NoDelay);
        assert_eq!(sensor.init(), Err(SensorError::NotPresent));
        assert!(!sensor.is_initialized());
    }

    #[test]
    fn si70xx_read_sample() {
        let mut bus = FakeBus::default();
        bus.answer(&[0x15, 0xFF, 0x00, 0x00, 0x00, 0x00]);
        bus.answer(&[0x80, 0x00, 0x23]);
        bus.answer(&[0x60, 0x00]);
        let mut sensor = Si70xx::new(bus, NoDelay);
        sensor.init().unwrap();

        let sample = sensor.read().unwrap();
        assert_eq!(sample.humidity, 56_500);
        assert_eq!(sample.temperature, 19_045);

        let (bus, _) = sensor.release();
        assert_eq!(bus.writes[2].as_slice(), &[0xF5]);
        assert_eq!(bus.writes[3].as_slice(), &[0xE0]);
    }

    #[test]
    fn si70xx_crc_mismatch() {
        let mut bus = FakeBus::default();
        bus.answer(&[0x15, 0xFF, 0x00, 0x00, 0x00, 0x00]);
        bus.answer(&[0x80, 0x00, 0x24]);
        let mut sensor = Si70xx::new(bus, NoDelay);
        sensor.init().unwrap();
        assert_eq!(sensor.read(), Err(SensorError::Crc));
    }

    #[test]
    fn si70xx_bus_error() {
        let mut sensor = probed_sensor();
        let (mut bus, delay) = sensor.release();
        bus.fail = true;
        let mut sensor = Si70xx::new(bus, delay);
        assert_eq!(sensor.init(), Err(SensorError::Bus));
        assert!(!sensor.is_initialized());
    }

    #[test]
    fn si70xx_deinit_closes_session() {
        let mut sensor = probed_sensor();
        sensor.deinit();
        assert!(!sensor.is_initialized());
        assert_eq!(sensor.read(), Err(SensorError::NotInitialized));
    }

    #[test]
    fn si70xx_feeds_sensor_reader() {
        let mut bus = FakeBus::default();
        bus.answer(&[0x15, 0xFF, 0x00, 0x00, 0x00, 0x00]);
        bus.answer(&[0x80, 0x00, 0x23]);
        bus.answer(&[0x60, 0x00]);
        let mut sensor = Si70xx::new(bus, NoDelay);
        sensor.init().unwrap();
        // 19045 m°C -> 1904 hundredths
        assert_eq!(read_ble_temperature(&mut sensor).raw(), 1904);
    }
}
