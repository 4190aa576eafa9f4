use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Spaces requests at least `min_interval` apart across every task sharing it.
#[derive(Debug)]
pub struct RequestGate {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Reserve the next free slot, then sleep until it arrives.
    pub async fn wait(&self) {
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
