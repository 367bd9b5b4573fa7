// src/trigger/cron.rs

//! Five-field cron expressions: `MIN HOUR DOM MON DOW`.
//!
//! Each field accepts `*`, single values, ranges (`1-5`), lists (`0,15,30`)
//! and steps (`*/15`, `10-40/10`, `5/20`). Month and weekday fields also
//! accept three-letter names (`jan`, `mon`), and weekday `7` is Sunday.
//!
//! As in Vixie cron, when *both* day-of-month and day-of-week are restricted
//! (neither starts with `*`), a day matches if *either* field matches.
//!
//! The usual `@` shorthands (`@hourly`, `@daily`, `@midnight`, `@weekly`,
//! `@monthly`, `@yearly`, `@annually`) expand to their five-field forms.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

/// How far back/forward slot searches look before giving up.
///
/// Eight years covers every leap-day schedule (`0 0 29 2 *`).
const SEARCH_DAYS: i64 = 366 * 8;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// One parsed cron field as a bitset over its value range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    /// `false` when the field text starts with `*` (used by the DOM/DOW rule).
    restricted: bool,
}

impl Field {
    fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1u64 << value) != 0
    }
}

struct FieldKind {
    label: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Offset added to a name's index (months are 1-based).
    name_base: u32,
}

const MINUTE: FieldKind = FieldKind { label: "minute", min: 0, max: 59, names: &[], name_base: 0 };
const HOUR: FieldKind = FieldKind { label: "hour", min: 0, max: 23, names: &[], name_base: 0 };
const DAY_OF_MONTH: FieldKind =
    FieldKind { label: "day-of-month", min: 1, max: 31, names: &[], name_base: 0 };
const MONTH: FieldKind =
    FieldKind { label: "month", min: 1, max: 12, names: &MONTH_NAMES, name_base: 1 };
// 7 is accepted and folded onto 0 (Sunday) after parsing.
const DAY_OF_WEEK: FieldKind =
    FieldKind { label: "day-of-week", min: 0, max: 7, names: &WEEKDAY_NAMES, name_base: 0 };

/// A validated cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expr: String,
    minutes: Field,
    hours: Field,
    days_of_month: Field,
    months: Field,
    days_of_week: Field,
}

impl CronSchedule {
    /// The expression as written in the config.
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// Whether the schedule fires at the minute containing `t`.
    pub fn matches(&self, t: NaiveDateTime) -> bool {
        self.minutes.contains(t.minute())
            && self.hours.contains(t.hour())
            && self.day_matches(t.date())
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        if !self.months.contains(date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(date.day());
        let dow = self.days_of_week.contains(date.weekday().num_days_from_sunday());
        if self.days_of_month.restricted && self.days_of_week.restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    pub(crate) fn latest_at_or_before(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut date = t.date();
        for _ in 0..SEARCH_DAYS {
            if self.day_matches(date) {
                let same_day = date == t.date();
                let max_hour = if same_day { t.hour() } else { 23 };
                for hour in (0..=max_hour).rev().filter(|h| self.hours.contains(*h)) {
                    let max_minute = if same_day && hour == t.hour() { t.minute() } else { 59 };
                    if let Some(minute) =
                        (0..=max_minute).rev().find(|m| self.minutes.contains(*m))
                    {
                        return date.and_hms_opt(hour, minute, 0);
                    }
                }
            }
            date = date.pred_opt()?;
        }
        None
    }

    pub(crate) fn next_after(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let start = t + TimeDelta::minutes(1);
        let mut date = start.date();
        for _ in 0..SEARCH_DAYS {
            if self.day_matches(date) {
                let same_day = date == start.date();
                let min_hour = if same_day { start.hour() } else { 0 };
                for hour in (min_hour..=23).filter(|h| self.hours.contains(*h)) {
                    let min_minute = if same_day && hour == start.hour() { start.minute() } else { 0 };
                    if let Some(minute) = (min_minute..=59).find(|m| self.minutes.contains(*m)) {
                        return date.and_hms_opt(hour, minute, 0);
                    }
                }
            }
            date = date.succ_opt()?;
        }
        None
    }
}

impl FromStr for CronSchedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expr = s.trim();
        let expanded = expand_shorthand(expr)?;

        let parts: Vec<&str> = expanded.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(format!(
                "invalid cron expression '{}': need 5 fields (MIN HOUR DOM MON DOW), got {}",
                expr,
                parts.len()
            ));
        }

        let mut days_of_week = parse_field(parts[4], &DAY_OF_WEEK)?;
        if days_of_week.contains(7) {
            days_of_week.bits = (days_of_week.bits & !(1 << 7)) | 1;
        }

        Ok(Self {
            expr: expr.to_string(),
            minutes: parse_field(parts[0], &MINUTE)?,
            hours: parse_field(parts[1], &HOUR)?,
            days_of_month: parse_field(parts[2], &DAY_OF_MONTH)?,
            months: parse_field(parts[3], &MONTH)?,
            days_of_week,
        })
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

fn expand_shorthand(expr: &str) -> Result<&str, String> {
    if !expr.starts_with('@') {
        return Ok(expr);
    }
    match expr.to_lowercase().as_str() {
        "@hourly" => Ok("0 * * * *"),
        "@daily" | "@midnight" => Ok("0 0 * * *"),
        "@weekly" => Ok("0 0 * * 0"),
        "@monthly" => Ok("0 0 1 * *"),
        "@yearly" | "@annually" => Ok("0 0 1 1 *"),
        other => Err(format!("unsupported cron shorthand '{}'", other)),
    }
}

fn parse_field(text: &str, kind: &FieldKind) -> Result<Field, String> {
    let mut bits = 0u64;
    for item in text.split(',') {
        bits |= parse_item(item, kind)?;
    }
    Ok(Field {
        bits,
        restricted: !text.starts_with('*'),
    })
}

/// Parse one list item: `*`, `N`, `A-B`, each optionally followed by `/STEP`.
fn parse_item(item: &str, kind: &FieldKind) -> Result<u64, String> {
    let invalid = |why: &str| format!("invalid {} field item '{}': {}", kind.label, item, why);

    if item.is_empty() {
        return Err(invalid("empty item"));
    }

    let (range_part, step) = match item.split_once('/') {
        Some((r, s)) => {
            let step: u32 = s.parse().map_err(|_| invalid("step is not a number"))?;
            if step == 0 {
                return Err(invalid("step must be >= 1"));
            }
            (r, Some(step))
        }
        None => (item, None),
    };

    let (lo, hi) = if range_part == "*" {
        (kind.min, kind.max)
    } else if let Some((a, b)) = range_part.split_once('-') {
        let lo = parse_value(a, kind).map_err(|e| invalid(&e))?;
        let hi = parse_value(b, kind).map_err(|e| invalid(&e))?;
        if lo > hi {
            return Err(invalid("range start is after range end"));
        }
        (lo, hi)
    } else {
        let v = parse_value(range_part, kind).map_err(|e| invalid(&e))?;
        // `5/20` means "from 5 to the end of the range, every 20".
        match step {
            Some(_) => (v, kind.max),
            None => (v, v),
        }
    };

    let step = step.unwrap_or(1) as usize;
    Ok((lo..=hi).step_by(step).fold(0u64, |acc, v| acc | (1u64 << v)))
}

fn parse_value(text: &str, kind: &FieldKind) -> Result<u32, String> {
    let lower = text.to_lowercase();
    if let Some(idx) = kind.names.iter().position(|n| *n == lower) {
        return Ok(idx as u32 + kind.name_base);
    }
    let v: u32 = text
        .parse()
        .map_err(|_| format!("'{}' is not a number", text))?;
    if v < kind.min || v > kind.max {
        return Err(format!("{} out of range {}-{}", v, kind.min, kind.max));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn cron(s: &str) -> CronSchedule {
        s.parse().unwrap()
    }

    #[test]
    fn daily_at_three() {
        let c = cron("0 3 * * *");
        assert!(c.matches(at("2026-10-19 03:00")));
        assert!(c.matches(at("2024-02-29 03:00")));
        assert!(!c.matches(at("2026-10-19 03:01")));
        assert!(!c.matches(at("2026-10-19 15:00")));
    }

    #[test]
    fn steps_ranges_and_lists() {
        let c = cron("*/15 9-17 * * *");
        assert!(c.matches(at("2026-10-19 09:45")));
        assert!(!c.matches(at("2026-10-19 09:50")));
        assert!(!c.matches(at("2026-10-19 18:00")));

        let c = cron("10-40/10 0,12 * * *");
        for m in [10, 20, 30, 40] {
            assert!(c.matches(at(&format!("2026-10-19 12:{m:02}"))));
        }
        assert!(!c.matches(at("2026-10-19 12:50")));

        let c = cron("5/20 * * * *");
        assert!(c.matches(at("2026-10-19 01:45")));
        assert!(!c.matches(at("2026-10-19 01:00")));
    }

    #[test]
    fn names_and_sunday_seven() {
        // 2026-10-18 is a Sunday, 2026-10-19 a Monday.
        let c = cron("0 8 * oct sun");
        assert!(c.matches(at("2026-10-18 08:00")));
        assert!(!c.matches(at("2026-10-19 08:00")));
        assert!(cron("0 8 * * 7").matches(at("2026-10-18 08:00")));
        assert!(cron("0 8 * * mon-fri").matches(at("2026-10-19 08:00")));
    }

    #[test]
    fn dom_dow_or_rule_when_both_restricted() {
        // 1st of the month OR any Monday.
        let c = cron("0 0 1 * mon");
        assert!(c.matches(at("2026-10-01 00:00"))); // Thursday, the 1st
        assert!(c.matches(at("2026-10-19 00:00"))); // Monday
        assert!(!c.matches(at("2026-10-20 00:00")));

        // Only DOM restricted: DOW `*` must not widen the match.
        let c = cron("0 0 1 * *");
        assert!(!c.matches(at("2026-10-19 00:00")));
    }

    #[test]
    fn shorthands() {
        assert!(cron("@daily").matches(at("2026-10-19 00:00")));
        assert!(cron("@hourly").matches(at("2026-10-19 13:00")));
        assert!(cron("@monthly").matches(at("2026-11-01 00:00")));
        assert_eq!(cron("@daily").expression(), "@daily");
    }

    #[test]
    fn rejects_malformed_expressions() {
        for bad in [
            "",
            "bad",
            "* * * *",
            "* * * * * *",
            "60 * * * *",
            "* 24 * * *",
            "* * 0 * *",
            "* * * 13 *",
            "* * * * 8",
            "*/0 * * * *",
            "5-1 * * * *",
            "1,,2 * * * *",
            "@reboot",
        ] {
            assert!(bad.parse::<CronSchedule>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn latest_and_next_slots() {
        let c = cron("30 6 * * 1-5");
        // Monday 06:29 -> previous Friday 06:30.
        assert_eq!(c.latest_at_or_before(at("2026-10-19 06:29")), Some(at("2026-10-16 06:30")));
        assert_eq!(c.latest_at_or_before(at("2026-10-19 06:30")), Some(at("2026-10-19 06:30")));
        assert_eq!(c.next_after(at("2026-10-19 06:30")), Some(at("2026-10-20 06:30")));
        // Friday evening -> Monday morning.
        assert_eq!(c.next_after(at("2026-10-16 18:00")), Some(at("2026-10-19 06:30")));
    }

    #[test]
    fn leap_day_schedule_is_found() {
        let c = cron("0 0 29 2 *");
        assert_eq!(c.latest_at_or_before(at("2026-10-19 00:00")), Some(at("2024-02-29 00:00")));
        assert_eq!(c.next_after(at("2026-10-19 00:00")), Some(at("2028-02-29 00:00")));
    }
}
