//! Notification timer backed by an embassy `Ticker`.

use core::future::pending;

use embassy_time::{Duration, Ticker};

use rht_peripheral::stack::PeriodicTimer;
use rht_peripheral::StackError;

/// At most one ticker; `None` while stopped.
pub struct TickerTimer {
    ticker: Option<Ticker>,
}

impl TickerTimer {
    pub const fn new() -> Self {
        Self { ticker: None }
    }

    /// Wait for the next firing. Never completes while stopped.
    pub async fn next(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => ticker.next().await,
            None => pending::<()>().await,
        }
    }
}

impl PeriodicTimer for TickerTimer {
    fn start_periodic(&mut self, period_ms: u32) -> Result<(), StackError> {
        if self.ticker.is_some() {
            return Err(StackError::InvalidState);
        }
        self.ticker = Some(Ticker::every(Duration::from_millis(period_ms as u64)));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StackError> {
        self.ticker
            .take()
            .map(|_| ())
            .ok_or(StackError::InvalidState)
    }
}
