use rand::{thread_rng, Rng};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Instant};

/// Token bucket bounding how many handshakes start per second.
pub struct RateLimiter {
    permits: Semaphore,
    fill_rate: u32,
    last_refill: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(fill_rate: u32) -> Self {
        Self {
            permits: Semaphore::new(fill_rate as usize),
            fill_rate,
            last_refill: Mutex::new(Instant::now()),
        }
    }

    pub async fn acquire(&self) {
        loop {
            self.refill().await;
            if let Ok(permit) = self.permits.try_acquire() {
                // Tokens are spent, not returned.
                permit.forget();
                return;
            }
            sleep(self.until_refill().await).await;
        }
    }

    async fn refill(&self) {
        let mut guard = self.last_refill.lock().await;
        let now = Instant::now();
        if now.duration_since(*guard) >= Duration::from_secs(1) {
            let to_add = self
                .fill_rate
                .saturating_sub(self.permits.available_permits() as u32);
            if to_add > 0 {
                self.permits.add_permits(to_add as usize);
            }
            *guard = now;
        }
    }

    async fn until_refill(&self) -> Duration {
        let guard = self.last_refill.lock().await;
        Duration::from_secs(1).saturating_sub(guard.elapsed())
    }

    pub async fn sleep_jitter(&self) {
        let jitter_ms: u64 = thread_rng().gen_range(5..20);
        sleep(Duration::from_millis(jitter_ms)).await;
    }
}
