//! Process-wide pacing for calls to the generative service.
//!
//! One `RateLimiter` is built at startup and shared (via `Arc`) by every caller of
//! `GenerativeClient`. The slot is claimed under the lock, so concurrent requests are
//! serialized and each physical call starts at least `min_spacing` after the previous one.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

pub const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct RateLimiter {
    min_spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_call: Mutex::new(None),
        }
    }

    /// Waits until the next physical call may start, then records it as started.
    ///
    /// Dropping the returned future while it sleeps releases the lock without
    /// claiming the slot.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let ready_at = previous + self.min_spacing;
            let now = Instant::now();
            if ready_at > now {
                debug!(
                    "Pacing generative call: waiting {}ms",
                    (ready_at - now).as_millis()
                );
                sleep_until(ready_at).await;
            }
        }

        *last_call = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SPACING)
    }
}
