// src/trigger/mod.rs

//! Trigger evaluation.
//!
//! A task fires either at fixed times of day ([`time_of_day`]) or on a
//! five-field cron expression ([`cron`]). Both are minute-granular: the
//! evaluator turns "now" into an optional [`SlotKey`] naming the matched
//! minute, and the run ledger keys on that slot so that several ticks inside
//! the same minute still dispatch a task at most once.
//!
//! Triggers are parsed and validated at config load time; evaluation itself
//! never fails.

pub mod cron;
pub mod time_of_day;

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

pub use cron::CronSchedule;
pub use time_of_day::DailyTimes;

/// A matched trigger minute: the calendar date plus the `HH:MM` the trigger
/// fired for.
///
/// The slot is also the task's scheduling *window*: a run that was claimed
/// for a slot can only be dispatched while the clock is still inside that
/// minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey(NaiveDateTime);

impl SlotKey {
    /// Slot for the minute containing `t` (seconds are dropped).
    pub fn at_minute(t: NaiveDateTime) -> Self {
        Self(truncate_to_minute(t))
    }

    pub fn at(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    /// First instant after this slot's window.
    pub fn window_end(&self) -> NaiveDateTime {
        self.0 + TimeDelta::minutes(1)
    }

    /// Whether `t` still falls inside this slot's window.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        truncate_to_minute(t) == self.0
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M"))
    }
}

/// Start of the minute containing `t`. Leap-second instants map to the
/// minute they belong to.
pub(crate) fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    let minutes = i64::from(t.hour() * 60 + t.minute());
    t.date().and_time(NaiveTime::MIN + TimeDelta::minutes(minutes))
}

/// A task's trigger, resolved once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSpec {
    /// Fire at each listed `HH:MM`, every day.
    TimeOfDay(DailyTimes),
    /// Fire whenever the cron expression matches.
    Cron(CronSchedule),
}

impl TriggerSpec {
    /// Decide whether the trigger fires at `now`.
    ///
    /// Returns the matched slot when due.
    pub fn is_due(&self, now: NaiveDateTime) -> Option<SlotKey> {
        let due = match self {
            TriggerSpec::TimeOfDay(times) => times.matches(now),
            TriggerSpec::Cron(schedule) => schedule.matches(now),
        };
        due.then(|| SlotKey::at_minute(now))
    }

    /// Most recent slot at or before `t` at which this trigger was due.
    ///
    /// This is what "the same scheduling cycle" means for a dependency: a
    /// dependent firing at slot `s` looks at its prerequisite's latest slot
    /// `<= s`.
    pub fn latest_slot_at_or_before(&self, t: NaiveDateTime) -> Option<SlotKey> {
        let t = truncate_to_minute(t);
        let found = match self {
            TriggerSpec::TimeOfDay(times) => times.latest_at_or_before(t),
            TriggerSpec::Cron(schedule) => schedule.latest_at_or_before(t),
        };
        found.map(SlotKey)
    }

    /// First slot strictly after `t` at which this trigger is due.
    pub fn next_slot_after(&self, t: NaiveDateTime) -> Option<SlotKey> {
        let t = truncate_to_minute(t);
        let found = match self {
            TriggerSpec::TimeOfDay(times) => times.next_after(t),
            TriggerSpec::Cron(schedule) => schedule.next_after(t),
        };
        found.map(SlotKey)
    }
}

impl fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSpec::TimeOfDay(times) => write!(f, "time {}", times),
            TriggerSpec::Cron(schedule) => write!(f, "cron \"{}\"", schedule),
        }
    }
}
