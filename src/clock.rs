use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Source of the current time.
///
/// The orchestrator computes inquiry progress from elapsed wall-clock time,
/// so tests inject a [`ManualClock`] to drive the workflow deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests. Cloning shares the underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    instant: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut instant = self
            .instant
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *instant += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut instant = self
            .instant
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *instant = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .instant
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
