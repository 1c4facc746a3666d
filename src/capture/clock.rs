use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Elapsed-time clock for a capture session
///
/// A repeating one-second tick that advances the elapsed count by 1 while
/// running. The clock is derived state: it runs if and only if the session
/// is recording, and is halted on every transition out of that state so no
/// tick can fire while paused or after stop.
pub struct ElapsedClock {
    seconds: Arc<AtomicU64>,
    ticker: Option<JoinHandle<()>>,
}

impl ElapsedClock {
    pub fn new() -> Self {
        Self {
            seconds: Arc::new(AtomicU64::new(0)),
            ticker: None,
        }
    }

    /// Current elapsed count in whole seconds
    pub fn seconds(&self) -> u64 {
        self.seconds.load(Ordering::SeqCst)
    }

    /// Reset the count to zero (new session start)
    pub fn reset(&self) {
        self.seconds.store(0, Ordering::SeqCst);
    }

    /// Start ticking, continuing from the current count
    pub fn resume(&mut self) {
        if self.ticker.is_some() {
            return;
        }

        let seconds = Arc::clone(&self.seconds);
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // First tick completes immediately; the count starts moving one
            // second after resume.
            interval.tick().await;
            loop {
                interval.tick().await;
                seconds.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    /// Halt the ticker, freezing the current count
    pub fn pause(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }
}

impl Default for ElapsedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ElapsedClock {
    fn drop(&mut self) {
        self.pause();
    }
}

/// Format an elapsed second count as MM:SS for display
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(9), "00:09");
        assert_eq!(format_elapsed(65), "01:05");
        assert_eq!(format_elapsed(600), "10:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_counts_only_while_running() {
        let mut clock = ElapsedClock::new();
        assert_eq!(clock.seconds(), 0);

        clock.resume();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(clock.seconds(), 2);

        clock.pause();
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(clock.seconds(), 2, "No tick may fire while halted");

        clock.resume();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(clock.seconds(), 3);

        clock.reset();
        assert_eq!(clock.seconds(), 0);
    }
}
