//! Debounce, interval and timeout primitive used by every polling loop.
//!
//! A `Timer` only reports `reached()` once the limit has elapsed *and* it has
//! been polled more than `count` times since the last reset. Requiring both
//! keeps a slow capture channel from tripping a timeout after a single frame.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Timer {
    limit: Duration,
    count: u32,
    start: Option<Instant>,
    reach_count: u32,
}

impl Timer {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            count: 0,
            start: None,
            reach_count: 0,
        }
    }

    /// Timer from fractional seconds with a confirm count.
    pub fn secs(limit: f64, count: u32) -> Self {
        Self::new(Duration::from_secs_f64(limit.max(0.0))).with_count(count)
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self.reach_count = count;
        self
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Start the clock and zero the poll count, unless it is already running.
    pub fn start(&mut self) -> &mut Self {
        if self.start.is_none() {
            self.start = Some(Instant::now());
            self.reach_count = 0;
        }
        self
    }

    pub fn started(&self) -> bool {
        self.start.is_some()
    }

    /// Time elapsed since the last start, zero when not started.
    pub fn current(&self) -> Duration {
        self.start.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// Counts one poll, then reports whether the limit elapsed and enough polls
    /// have been seen. An un-started clock counts as already elapsed.
    pub fn reached(&mut self) -> bool {
        self.reach_count = self.reach_count.saturating_add(1);
        let elapsed = match self.start {
            Some(start) => start.elapsed() > self.limit,
            None => true,
        };
        elapsed && self.reach_count > self.count
    }

    pub fn reset(&mut self) -> &mut Self {
        self.start = Some(Instant::now());
        self.reach_count = 0;
        self
    }

    /// Un-start the clock and pre-arm the counter, so the next `reached()` is true.
    pub fn clear(&mut self) -> &mut Self {
        self.start = None;
        self.reach_count = self.count;
        self
    }

    pub fn reached_and_reset(&mut self) -> bool {
        if self.reached() {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Sleep until the limit has elapsed since the last start.
    pub async fn wait(&self) {
        if let Some(start) = self.start {
            let remaining = (start + self.limit).saturating_duration_since(Instant::now());
            if !remaining.is_zero() {
                tokio::time::sleep(remaining).await;
            }
        }
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Timer(limit={:.3}/{:.3}, count={}/{})",
            self.current().as_secs_f64(),
            self.limit.as_secs_f64(),
            self.reach_count,
            self.count
        )
    }
}
