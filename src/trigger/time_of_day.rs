// src/trigger/time_of_day.rs

//! Fixed daily `HH:MM` triggers.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};

/// Set of wall-clock minutes at which a task fires every day.
///
/// Stored as a set, so `"8:00"` and `"08:00"` collapse into one entry and the
/// task fires once for that minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTimes(BTreeSet<NaiveTime>);

impl DailyTimes {
    /// Parse a list of `HH:MM` strings. The list must not be empty.
    pub fn parse<I, S>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for entry in entries {
            set.insert(parse_hhmm(entry.as_ref())?);
        }
        if set.is_empty() {
            return Err("time list is empty".to_string());
        }
        Ok(Self(set))
    }

    pub fn times(&self) -> impl Iterator<Item = NaiveTime> + '_ {
        self.0.iter().copied()
    }

    pub(crate) fn matches(&self, now: NaiveDateTime) -> bool {
        minute_of(now).is_some_and(|m| self.0.contains(&m))
    }

    pub(crate) fn latest_at_or_before(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let now = minute_of(t)?;
        if let Some(time) = self.0.range(..=now).next_back() {
            return Some(t.date().and_time(*time));
        }
        let yesterday = t.date().pred_opt()?;
        self.0.last().map(|time| yesterday.and_time(*time))
    }

    pub(crate) fn next_after(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let now = minute_of(t)?;
        let later_today = self
            .0
            .range(now..)
            .find(|time| **time > now)
            .map(|time| t.date().and_time(*time));
        if later_today.is_some() {
            return later_today;
        }
        let tomorrow = (t + TimeDelta::days(1)).date();
        self.0.first().map(|time| tomorrow.and_time(*time))
    }
}

impl fmt::Display for DailyTimes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|t| t.format("%H:%M").to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

fn minute_of(t: NaiveDateTime) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0)
}

/// Parse `H:MM` / `HH:MM` (24-hour clock).
fn parse_hhmm(s: &str) -> Result<NaiveTime, String> {
    let s = s.trim();
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid time '{}': expected HH:MM", s))?;

    let valid_digits = |part: &str, max_len: usize| {
        !part.is_empty() && part.len() <= max_len && part.chars().all(|c| c.is_ascii_digit())
    };
    if !valid_digits(h, 2) || m.len() != 2 || !valid_digits(m, 2) {
        return Err(format!("invalid time '{}': expected HH:MM", s));
    }

    let hour: u32 = h
        .parse()
        .map_err(|e| format!("invalid hour in '{}': {}", s, e))?;
    let minute: u32 = m
        .parse()
        .map_err(|e| format!("invalid minute in '{}': {}", s, e))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| format!("time '{}' out of range (00:00-23:59)", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn parses_and_dedups_entries() {
        let times = DailyTimes::parse(["8:00", "08:00", "20:30"]).unwrap();
        assert_eq!(times.times().count(), 2);
        assert_eq!(times.to_string(), "[08:00, 20:30]");
    }

    #[test]
    fn rejects_malformed_entries() {
        for bad in ["", "8", "24:00", "12:60", "12:5", "ab:cd", "1:2:3", "123:00"] {
            assert!(DailyTimes::parse([bad]).is_err(), "{bad:?} should be rejected");
        }
        assert!(DailyTimes::parse(Vec::<String>::new()).is_err());
    }

    #[test]
    fn latest_wraps_to_previous_day() {
        let times = DailyTimes::parse(["08:00", "20:00"]).unwrap();
        assert_eq!(
            times.latest_at_or_before(at("2026-10-19 07:59")),
            Some(at("2026-10-18 20:00"))
        );
        assert_eq!(
            times.latest_at_or_before(at("2026-10-19 08:00")),
            Some(at("2026-10-19 08:00"))
        );
        assert_eq!(
            times.latest_at_or_before(at("2026-10-19 12:00")),
            Some(at("2026-10-19 08:00"))
        );
    }

    #[test]
    fn next_wraps_to_following_day() {
        let times = DailyTimes::parse(["08:00", "20:00"]).unwrap();
        assert_eq!(times.next_after(at("2026-10-19 08:00")), Some(at("2026-10-19 20:00")));
        assert_eq!(times.next_after(at("2026-10-19 21:00")), Some(at("2026-10-20 08:00")));
    }
}
