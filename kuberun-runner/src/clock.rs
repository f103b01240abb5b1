//! Time source for the monitor loop
//!
//! Both reading the time and sleeping go through [`Clock`] so polling can be
//! driven without real delays in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock whose `sleep` returns immediately and advances time instead
///
/// `overhead` is added on every sleep to simulate time lost between polls.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
    overhead: Duration,
    sleeps: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self::with_overhead(Duration::ZERO)
    }

    pub fn with_overhead(overhead: Duration) -> Self {
        Self {
            now: std::sync::Mutex::new(Utc::now()),
            overhead,
            sleeps: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let step = chrono::Duration::from_std(duration + self.overhead).unwrap();
        *self.now.lock().unwrap() += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::with_overhead(Duration::from_secs(1));
        let start = clock.now();

        clock.sleep(Duration::from_secs(2)).await;
        clock.sleep(Duration::from_secs(2)).await;

        assert_eq!((clock.now() - start).num_seconds(), 6);
        assert_eq!(clock.sleep_count(), 2);
    }

    #[tokio::test]
    async fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let start = clock.now();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.now() >= start);
    }
}
