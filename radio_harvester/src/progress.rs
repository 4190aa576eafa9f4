use std::time::Duration;

/// Harvest progress, owned by the harvest loop and handed to a reporter after
/// every recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressTracker {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Wall time since the harvest started.
    pub elapsed: Duration,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn advance(&mut self, succeeded: bool, elapsed: Duration) {
        self.completed += 1;
        if !succeeded {
            self.failed += 1;
        }
        self.elapsed = elapsed;
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }

    /// Remaining time at the average pace so far.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        if self.completed == 0 {
            return None;
        }
        let per_item = self.elapsed.as_secs_f64() / self.completed as f64;
        Some(Duration::from_secs_f64(per_item * self.remaining() as f64))
    }
}

pub fn format_eta(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{} hours, {} minutes", secs / 3600, (secs % 3600) / 60)
}

pub trait ProgressReporter {
    fn report(&mut self, progress: &ProgressTracker);
}

/// Logs a remaining-time estimate every `every` recordings and on the last one.
#[derive(Debug)]
pub struct LogReporter {
    every: usize,
}

impl LogReporter {
    pub fn new(every: usize) -> Self {
        Self { every: every.max(1) }
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ProgressReporter for LogReporter {
    fn report(&mut self, p: &ProgressTracker) {
        if p.completed % self.every != 0 && p.remaining() != 0 {
            return;
        }
        let eta = p
            .estimated_remaining()
            .map(format_eta)
            .unwrap_or_else(|| "unknown".to_string());
        tracing::info!(
            "harvested {}/{} ({} failed), time left: {}",
            p.completed,
            p.total,
            p.failed,
            eta
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eta_from_average_pace() {
        let mut p = ProgressTracker::new(10);
        assert_eq!(p.estimated_remaining(), None);
        p.advance(true, Duration::from_secs(30));
        p.advance(false, Duration::from_secs(60));
        assert_eq!(p.remaining(), 8);
        assert_eq!(p.failed, 1);
        assert_eq!(p.estimated_remaining(), Some(Duration::from_secs(240)));
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(Duration::from_secs(0)), "0 hours, 0 minutes");
        assert_eq!(format_eta(Duration::from_secs(3 * 3600 + 25 * 60 + 59)), "3 hours, 25 minutes");
    }

    #[test]
    fn test_remaining_never_underflows() {
        let mut p = ProgressTracker::new(1);
        p.advance(true, Duration::from_secs(1));
        p.advance(true, Duration::from_secs(2));
        assert_eq!(p.remaining(), 0);
        assert_eq!(p.estimated_remaining(), Some(Duration::ZERO));
    }
}
