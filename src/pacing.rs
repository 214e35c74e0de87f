//! # Request Pacing
//!
//! The batch runner calls [`Pacer::pace`] once after every poster, whether the
//! extraction succeeded or not. What happens there is the pacer's business:
//!
//! - [`FixedInterval`]: sleep a constant interval (2s by default)
//! - [`TokenBucket`]: allow a burst, then hold the long-run rate to N requests per minute
//! - [`Unpaced`]: never wait
//!
//! Pacers compute delays from an explicit `now` so the arithmetic is testable
//! without sleeping.

use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

/// Default pause between posters.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

pub trait Pacer {
    /// How long to wait after a request that completed at `now`.
    fn next_delay(&mut self, now: Instant) -> Duration;

    /// Block for the computed delay.
    fn pace(&mut self) {
        let delay = self.next_delay(Instant::now());
        if !delay.is_zero() {
            trace!(delay_ms = delay.as_millis() as u64, "pacing");
            thread::sleep(delay);
        }
    }
}

/// Constant pause after every request.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Pacer for FixedInterval {
    fn next_delay(&mut self, _now: Instant) -> Duration {
        self.interval
    }
}

/// Token bucket refilled at `per_minute / 60` tokens per second.
///
/// Each request spends one token. When the bucket is empty the delay is the
/// time until the deficit refills.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last: Option<Instant>,
}

impl TokenBucket {
    /// `per_minute` must be non-zero; `burst` is clamped to at least 1.
    pub fn per_minute(per_minute: u32, burst: u32) -> Self {
        let capacity = burst.max(1) as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: per_minute.max(1) as f64 / 60.0,
            last: None,
        }
    }
}

impl Pacer for TokenBucket {
    fn next_delay(&mut self, now: Instant) -> Duration {
        if let Some(last) = self.last {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        }
        self.last = Some(now);
        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.refill_per_sec)
        }
    }
}

/// No pacing at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unpaced;

impl Pacer for Unpaced {
    fn next_delay(&mut self, _now: Instant) -> Duration {
        Duration::ZERO
    }
}
