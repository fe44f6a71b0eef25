use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of wall-clock timestamps and monotonic instants
///
/// Record timestamps come from `now`; cache freshness and rate limiting use
/// `instant`. Both advance together on [`ManualClock`].
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    fn instant(&self) -> Instant;

    /// Wall-clock time at the millisecond precision the backends store
    fn now_millis(&self) -> DateTime<Utc> {
        self.now().trunc_subsecs(3)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base_time: DateTime<Utc>,
    base_instant: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now().trunc_subsecs(3))
    }

    pub fn starting_at(base_time: DateTime<Utc>) -> Self {
        Self {
            base_time,
            base_instant: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    fn offset(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.offset()).unwrap_or(chrono::Duration::zero());
        self.base_time + offset
    }

    fn instant(&self) -> Instant {
        self.base_instant + self.offset()
    }
}
