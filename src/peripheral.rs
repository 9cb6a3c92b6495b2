//! Event dispatcher.
//!
//! The platform turns every stack callback into an [`Event`] and hands it
//! to [`Peripheral::handle_event`] together with the capabilities the
//! handler may use. All process-lifetime state (advertising set, open
//! connection, notification timer, tick counter) lives in the
//! [`Peripheral`] value; there are no statics.
//!
//! Errors returned from `handle_event` are stack failures and fatal for
//! the caller. Sensor failures are answered with the sentinel value.

use crate::config;
use crate::error::Error;
use crate::notify_timer::{ClientConfig, NotifyTimer, TimerState};
use crate::stack::{
    AdvHandle, AdvertisingMode, BleStack, CharacteristicId, ConnHandle, DiscoverableMode,
    PeriodicTimer, RhtSensor,
};
use crate::temperature::{read_ble_temperature, BleTemperature};

/// What changed in a characteristic status event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusFlags {
    /// The client wrote the CCCD.
    ClientConfig,
    /// The client confirmed an indication.
    Confirmation,
    Other(u8),
}

impl StatusFlags {
    pub const fn from_raw(flags: u8) -> Self {
        match flags {
            0x01 => StatusFlags::ClientConfig,
            0x02 => StatusFlags::Confirmation,
            other => StatusFlags::Other(other),
        }
    }
}

/// Events delivered by the BLE stack and the notification timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Stack is up and the radio is ready. No stack command before this.
    Boot,
    ConnectionOpened {
        connection: ConnHandle,
    },
    ConnectionClosed {
        connection: ConnHandle,
        reason: u16,
    },
    /// A client reads a characteristic served by the application.
    ReadRequest {
        connection: ConnHandle,
        characteristic: CharacteristicId,
        offset: u16,
    },
    CharacteristicStatus {
        connection: ConnHandle,
        characteristic: CharacteristicId,
        status: StatusFlags,
        client_config: u16,
    },
    /// Notification timer fired.
    Tick,
    /// Anything the application does not handle.
    Other,
}

pub struct Peripheral {
    temperature: CharacteristicId,
    adv_handle: Option<AdvHandle>,
    connection: Option<ConnHandle>,
    notify: NotifyTimer,
}

impl Peripheral {
    /// `temperature` is the GATT database id of the temperature value.
    pub const fn new(temperature: CharacteristicId) -> Self {
        Self {
            temperature,
            adv_handle: None,
            connection: None,
            notify: NotifyTimer::new(config::NOTIFY_PERIOD_MS),
        }
    }

    pub fn adv_handle(&self) -> Option<AdvHandle> {
        self.adv_handle
    }

    pub fn connection(&self) -> Option<ConnHandle> {
        self.connection
    }

    pub fn timer_state(&self) -> TimerState {
        self.notify.state()
    }

    pub fn ticks(&self) -> u32 {
        self.notify.ticks()
    }

    pub fn handle_event<B, T, S>(
        &mut self,
        event: Event,
        stack: &mut B,
        timer: &mut T,
        sensor: &mut S,
    ) -> Result<(), Error>
    where
        B: BleStack,
        T: PeriodicTimer,
        S: RhtSensor,
    {
        match event {
            Event::Boot => self.on_boot(stack),
            Event::ConnectionOpened { connection } => {
                info!("Connection opened: {}", connection.0);
                self.connection = Some(connection);
                Ok(())
            }
            Event::ConnectionClosed { connection, reason } => {
                info!("Connection closed: {} (reason {:#x})", connection.0, reason);
                self.on_connection_closed(stack, timer, sensor)
            }
            Event::ReadRequest {
                connection,
                characteristic,
                offset,
            } => {
                info!(
                    "Read request on attribute ID: {} (offset {})",
                    characteristic.0, offset
                );
                if characteristic == self.temperature {
                    self.answer_temperature_read(connection, stack, sensor);
                }
                Ok(())
            }
            Event::CharacteristicStatus {
                connection: _,
                characteristic,
                status,
                client_config,
            } => {
                info!(
                    "Characteristic status: ID={}, flags={:?}, config={:#x}",
                    characteristic.0, status, client_config
                );
                if characteristic == self.temperature && status == StatusFlags::ClientConfig {
                    self.notify
                        .apply(ClientConfig::from_raw(client_config), timer)?;
                }
                Ok(())
            }
            Event::Tick => {
                self.on_tick(stack, sensor);
                Ok(())
            }
            Event::Other => Ok(()),
        }
    }

    fn on_boot<B: BleStack>(&mut self, stack: &mut B) -> Result<(), Error> {
        if let Some(handle) = self.adv_handle {
            warn!("Boot event with advertising set {} already created", handle.0);
            return Ok(());
        }

        let handle = stack.create_advertising_set()?;
        stack.generate_adv_payload(handle, DiscoverableMode::GeneralDiscoverable)?;
        stack.set_adv_timing(
            handle,
            config::ADV_INTERVAL_UNITS,
            config::ADV_INTERVAL_UNITS,
            config::ADV_DURATION,
            config::ADV_MAX_EVENTS,
        )?;
        stack.start_advertising(handle, AdvertisingMode::Connectable)?;
        self.adv_handle = Some(handle);
        info!("Advertising started (set {})", handle.0);
        Ok(())
    }

    fn on_connection_closed<B, T, S>(
        &mut self,
        stack: &mut B,
        timer: &mut T,
        sensor: &mut S,
    ) -> Result<(), Error>
    where
        B: BleStack,
        T: PeriodicTimer,
        S: RhtSensor,
    {
        self.connection = None;
        sensor.deinit();
        // No subscriber is left to notify.
        self.notify.stop(timer)?;

        let handle = self.adv_handle.ok_or(Error::NotBooted)?;
        stack.generate_adv_payload(handle, DiscoverableMode::GeneralDiscoverable)?;
        stack.start_advertising(handle, AdvertisingMode::Connectable)?;
        info!("Advertising restarted");
        Ok(())
    }

    fn answer_temperature_read<B, S>(&mut self, connection: ConnHandle, stack: &mut B, sensor: &mut S)
    where
        B: BleStack,
        S: RhtSensor,
    {
        let temperature = read_ble_temperature(sensor);
        let payload = temperature.to_le_bytes();

        if let Err(e) = stack.send_read_response(connection, self.temperature, 0, &payload) {
            warn!("Read response not sent: {:?}", e);
        }
        log_sent(temperature);
    }

    fn on_tick<B: BleStack, S: RhtSensor>(&mut self, stack: &mut B, sensor: &mut S) {
        self.notify.tick();

        let connection = match self.connection {
            Some(connection) if self.notify.is_running() => connection,
            _ => return,
        };
        let temperature = read_ble_temperature(sensor);
        if let Err(e) =
            stack.send_notification(connection, self.temperature, &temperature.to_le_bytes())
        {
            warn!("Notification not sent: {:?}", e);
        }
    }
}

fn log_sent(temperature: BleTemperature) {
    match temperature.celsius() {
        Some(c) => {
            info!(
                "Temperature sent: {} (BLE format) -> {}{}.{}{} deg C",
                temperature.raw(),
                c.sign(),
                c.whole,
                c.hundredths / 10,
                c.hundredths % 10
            );
        }
        None => error!("Temperature read failed!"),
    }
}
