use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Time source for signing timestamps, nonces and book capture brackets.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for reproducible tests.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
    step_ms: AtomicI64,
}

impl FixedClock {
    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
            step_ms: AtomicI64::new(0),
        }
    }

    /// Each reading advances the clock by `step_ms` after returning.
    pub fn ticking(millis: i64, step_ms: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
            step_ms: AtomicI64::new(step_ms),
        }
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let step = self.step_ms.load(Ordering::SeqCst);
        let millis = self.millis.fetch_add(step, Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_default()
    }
}

/// Strictly increasing nonce issuer: `max(previous + 1, now_ms)`.
#[derive(Debug, Default)]
pub struct NonceCounter {
    last: AtomicU64,
}

impl NonceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now_ms: i64) -> u64 {
        let floor = u64::try_from(now_ms).unwrap_or(0);
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = floor.max(current + 1);
            match self.last.compare_exchange(
                current,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}
