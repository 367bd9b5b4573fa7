// src/engine/clock.rs

//! Wall-clock access.
//!
//! The core never reads the system time itself; the runtime asks a
//! [`Clock`] and passes the result in. Tests use [`ManualClock`].

use chrono::{Local, NaiveDateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::types::ClockMode;

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The system clock in local time or UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    mode: ClockMode,
}

impl SystemClock {
    pub fn new(mode: ClockMode) -> Self {
        Self { mode }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.mode {
            ClockMode::Local => Local::now().naive_local(),
            ClockMode::Utc => Utc::now().naive_utc(),
        }
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, t: NaiveDateTime) {
        *self.now.lock() = t;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let start = NaiveDateTime::parse_from_str("2026-10-19 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(TimeDelta::seconds(90));
        assert_eq!(clock.now(), start + TimeDelta::seconds(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
