//! Request pacing for the Google Sheets API.
//!
//! Sheets enforces per-minute read quotas. The throttle spaces requests by a
//! minimum interval and lets a 429 response push the next slot further out.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Enforces a minimum interval between outgoing requests.
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,

    /// Earliest moment the next request may start.
    next_slot: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    /// Creates a throttle with the given minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits for the next free slot and reserves the one after it.
    ///
    /// Returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        let mut next_slot = self.next_slot.lock().await;

        let wait = next_slot.map_or(Duration::ZERO, |slot| {
            slot.saturating_duration_since(Instant::now())
        });

        if !wait.is_zero() {
            debug!("Sheets throttle: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        *next_slot = Some(Instant::now() + self.min_interval);
        wait
    }

    /// Delays the next slot by at least `wait` from now.
    pub async fn back_off(&self, wait: Duration) {
        warn!("Sheets API asked to back off for {:?}", wait);

        let mut next_slot = self.next_slot.lock().await;
        let until = Instant::now() + wait;
        *next_slot = Some(next_slot.map_or(until, |slot| slot.max(until)));
    }

    /// Returns the time remaining until a request would start immediately.
    #[cfg(test)]
    async fn time_until_allowed(&self) -> Duration {
        self.next_slot
            .lock()
            .await
            .map_or(Duration::ZERO, |slot| slot.saturating_duration_since(Instant::now()))
    }
}
