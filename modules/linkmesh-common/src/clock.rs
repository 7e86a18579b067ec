use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

/// Time source used by periodic services. Abstracted so tests can drive
/// ticks deterministically instead of sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for the given duration (or until the test clock is advanced).
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the system time and the tokio timer.
pub struct WallClock;

#[async_trait]
impl Clock for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test clock. `sleep` parks until `advance` is called, so a test controls
/// exactly how many ticks a periodic loop runs.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    tick: Notify,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            tick: Notify::new(),
        }
    }

    /// Move the clock forward and release every parked sleeper.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now = *now + chrono::Duration::from_std(by).expect("duration out of range");
        self.tick.notify_waiters();
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }

    async fn sleep(&self, _duration: Duration) {
        self.tick.notified().await;
    }
}
