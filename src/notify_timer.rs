//! Notification timer controller.
//!
//! Two states, STOPPED (initial) and RUNNING. The platform timer is only
//! touched on a real transition, so repeated enables or a disable without
//! a prior enable never reach it.

use crate::error::Error;
use crate::stack::PeriodicTimer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerState {
    Stopped,
    Running,
}

/// Client Characteristic Configuration value written by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientConfig {
    /// 0x0000
    Disabled,
    /// 0x0001
    Notify,
    /// Indications or anything else; ignored.
    Other(u16),
}

impl ClientConfig {
    pub const fn from_raw(value: u16) -> Self {
        match value {
            0x0000 => ClientConfig::Disabled,
            0x0001 => ClientConfig::Notify,
            other => ClientConfig::Other(other),
        }
    }
}

pub struct NotifyTimer {
    state: TimerState,
    period_ms: u32,
    ticks: u32,
}

impl NotifyTimer {
    pub const fn new(period_ms: u32) -> Self {
        Self {
            state: TimerState::Stopped,
            period_ms,
            ticks: 0,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Timer firings since start-up.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Drive the state machine from a client configuration update.
    pub fn apply<T: PeriodicTimer>(
        &mut self,
        config: ClientConfig,
        timer: &mut T,
    ) -> Result<(), Error> {
        match config {
            ClientConfig::Notify => self.start(timer),
            ClientConfig::Disabled => self.stop(timer),
            ClientConfig::Other(value) => {
                debug!("Ignoring client config {:#x}", value);
                Ok(())
            }
        }
    }

    /// STOPPED → RUNNING. No-op when already running.
    pub fn start<T: PeriodicTimer>(&mut self, timer: &mut T) -> Result<(), Error> {
        if self.is_running() {
            debug!("Notify timer already running");
            return Ok(());
        }
        timer.start_periodic(self.period_ms).map_err(Error::Timer)?;
        self.state = TimerState::Running;
        info!("Notify enabled -> Timer started ({} ms)", self.period_ms);
        Ok(())
    }

    /// RUNNING → STOPPED. No-op when already stopped.
    pub fn stop<T: PeriodicTimer>(&mut self, timer: &mut T) -> Result<(), Error> {
        if !self.is_running() {
            debug!("Notify timer already stopped");
            return Ok(());
        }
        timer.stop().map_err(Error::Timer)?;
        self.state = TimerState::Stopped;
        info!("Notify disabled -> Timer stopped");
        Ok(())
    }

    /// Count one timer firing and return the new count.
    pub fn tick(&mut self) -> u32 {
        self.ticks = self.ticks.wrapping_add(1);
        info!("Timer step {}", self.ticks);
        self.ticks
    }
}
