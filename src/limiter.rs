use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};

/// Saturates instead of wrapping for intervals beyond `u64::MAX` ms.
fn millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}

/// Single global fixed-interval gate in front of the external geocoder.
pub struct PacingGate {
    min_interval_ms: AtomicU64,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl PacingGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            min_interval_ms: AtomicU64::new(millis(interval)),
            last_tick: AsyncMutex::new(None),
        }
    }

    pub fn set_interval(&self, interval: Duration) {
        self.min_interval_ms.store(millis(interval), Ordering::SeqCst);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms.load(Ordering::SeqCst))
    }

    /// Waits until at least one interval has passed since the previous acquire.
    pub async fn acquire(&self) {
        let interval = self.interval();
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < interval {
                sleep(interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}
