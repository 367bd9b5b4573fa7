// src/exec/dates.rs

//! Date expressions for `while` loop steps.
//!
//! A loop bound is written as `<anchor>[+|-]<offset>`:
//!
//! - anchor: a keyword resolved against the firing slot (`today`, `now`,
//!   `yesterday`, `start_of_month`, ...) or a literal date, either compact
//!   (`2024`, `202401`, `20240108`, `2024010806`, `202401080630`,
//!   `20240108063000`) or ISO (`2024-01-08`, `2024-01-08T06:00`).
//! - offset: one or more `<N><unit>` components with unit `d`, `h`, `m` or
//!   `s`, e.g. `today-1d`, `yesterday+6h30m`.
//!
//! Increments use the same component syntax (`6h`, `+1d`) and must be
//! positive.

use std::fmt::{self, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;

const DATE_EXPR_PATTERN: &str = r"^(?P<anchor>[A-Za-z_]+|\d{4}(?:\d{2}){0,5}|\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2})?)?)(?P<offset>[+-](?:\d+[dhms])+)?$";

/// Named anchors, resolved relative to a reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Now,
    Today,
    Tomorrow,
    Yesterday,
    StartOfMonth,
    EndOfMonth,
    StartOfYear,
    EndOfYear,
    NextWeek,
    LastWeek,
    BeginningOfNextMonth,
    EndOfNextMonth,
}

impl Keyword {
    fn parse(s: &str) -> Option<Self> {
        let kw = match s.to_lowercase().as_str() {
            "now" => Keyword::Now,
            "today" => Keyword::Today,
            "tomorrow" => Keyword::Tomorrow,
            "yesterday" => Keyword::Yesterday,
            "start_of_month" => Keyword::StartOfMonth,
            "end_of_month" => Keyword::EndOfMonth,
            "start_of_year" => Keyword::StartOfYear,
            "end_of_year" => Keyword::EndOfYear,
            "next_week" => Keyword::NextWeek,
            "last_week" => Keyword::LastWeek,
            "beginning_of_next_month" => Keyword::BeginningOfNextMonth,
            "end_of_next_month" => Keyword::EndOfNextMonth,
            _ => return None,
        };
        Some(kw)
    }

    /// Resolve against `reference`. The time of day is kept for every
    /// keyword; only the date moves.
    fn resolve(self, reference: NaiveDateTime) -> Option<NaiveDateTime> {
        let time = reference.time();
        let date = reference.date();
        let first_of_month = date.with_day(1)?;
        let resolved = match self {
            Keyword::Now | Keyword::Today => date,
            Keyword::Tomorrow => date.succ_opt()?,
            Keyword::Yesterday => date.pred_opt()?,
            Keyword::StartOfMonth => first_of_month,
            Keyword::EndOfMonth => first_of_month.checked_add_months(Months::new(1))?.pred_opt()?,
            Keyword::StartOfYear => NaiveDate::from_ymd_opt(date.year(), 1, 1)?,
            Keyword::EndOfYear => NaiveDate::from_ymd_opt(date.year(), 12, 31)?,
            Keyword::NextWeek => date.checked_add_signed(TimeDelta::weeks(1))?,
            Keyword::LastWeek => date.checked_sub_signed(TimeDelta::weeks(1))?,
            Keyword::BeginningOfNextMonth => first_of_month.checked_add_months(Months::new(1))?,
            Keyword::EndOfNextMonth => first_of_month.checked_add_months(Months::new(2))?.pred_opt()?,
        };
        Some(resolved.and_time(time))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Keyword(Keyword),
    Literal(NaiveDateTime),
}

/// A parsed loop bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateExpr {
    source: String,
    anchor: Anchor,
    offset: TimeDelta,
}

impl DateExpr {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let re = Regex::new(DATE_EXPR_PATTERN).map_err(|e| e.to_string())?;
        let caps = re
            .captures(s)
            .ok_or_else(|| format!("invalid date expression '{}'", s))?;

        let anchor_text = caps.name("anchor").map(|m| m.as_str()).unwrap_or_default();
        let anchor = if anchor_text.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            let kw = Keyword::parse(anchor_text)
                .ok_or_else(|| format!("unknown date keyword '{}' in '{}'", anchor_text, s))?;
            Anchor::Keyword(kw)
        } else {
            Anchor::Literal(parse_literal(anchor_text)?)
        };

        let offset = match caps.name("offset") {
            Some(m) => parse_signed_components(m.as_str())?,
            None => TimeDelta::zero(),
        };

        Ok(Self {
            source: s.to_string(),
            anchor,
            offset,
        })
    }

    /// Resolve the expression against the firing time of the task.
    pub fn resolve(&self, reference: NaiveDateTime) -> Option<NaiveDateTime> {
        let base = match self.anchor {
            Anchor::Keyword(kw) => kw.resolve(reference)?,
            Anchor::Literal(dt) => dt,
        };
        base.checked_add_signed(self.offset)
    }
}

impl fmt::Display for DateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Positive step between loop iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment(TimeDelta);

impl Increment {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let body = s.strip_prefix('+').unwrap_or(s);
        if body.starts_with('-') {
            return Err(format!("increment '{}' must be positive", s));
        }
        let delta = parse_components(body).map_err(|e| format!("invalid increment '{}': {}", s, e))?;
        if delta <= TimeDelta::zero() {
            return Err(format!("increment '{}' must be positive", s));
        }
        Ok(Self(delta))
    }

    pub fn delta(&self) -> TimeDelta {
        self.0
    }
}

/// Render strftime placeholders in `template` against `at`.
pub fn render_command(template: &str, at: NaiveDateTime) -> Result<String, String> {
    let mut out = String::new();
    write!(out, "{}", at.format(template))
        .map_err(|_| format!("invalid date placeholder in command '{}'", template))?;
    Ok(out)
}

/// Check a command template for placeholders chrono cannot render.
pub fn check_template(template: &str) -> Result<(), String> {
    if StrftimeItems::new(template).any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid date placeholder in command '{}'", template));
    }
    Ok(())
}

fn parse_literal(s: &str) -> Result<NaiveDateTime, String> {
    let invalid = || format!("invalid date literal '{}'", s);

    if s.contains('-') {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).ok_or_else(invalid);
        }
        let normalized = s.replace(' ', "T");
        for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, fmt) {
                return Ok(dt);
            }
        }
        return Err(invalid());
    }

    // Compact form: %Y[%m[%d[%H[%M[%S]]]]], missing parts default to the
    // start of the period.
    let part = |range: std::ops::Range<usize>, default: u32| -> Result<u32, String> {
        match s.get(range) {
            Some(p) if !p.is_empty() => p.parse().map_err(|_| invalid()),
            _ => Ok(default),
        }
    };
    let year: i32 = s.get(0..4).and_then(|y| y.parse().ok()).ok_or_else(invalid)?;
    let month = part(4..6, 1)?;
    let day = part(6..8, 1)?;
    let hour = part(8..10, 0)?;
    let minute = part(10..12, 0)?;
    let second = part(12..14, 0)?;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(invalid)
}

fn parse_signed_components(s: &str) -> Result<TimeDelta, String> {
    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let delta = parse_components(body)?;
    Ok(if negative { -delta } else { delta })
}

/// Parse `1d6h30m15s`-style component lists (any order, at least one).
fn parse_components(s: &str) -> Result<TimeDelta, String> {
    if s.is_empty() {
        return Err("missing value".to_string());
    }

    let mut total = TimeDelta::zero();
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| format!("expected a number before '{}'", c))?;
        digits.clear();
        let component = match c {
            'd' => TimeDelta::try_days(value),
            'h' => TimeDelta::try_hours(value),
            'm' => TimeDelta::try_minutes(value),
            's' => TimeDelta::try_seconds(value),
            other => return Err(format!("unknown unit '{}' (expected d, h, m or s)", other)),
        }
        .ok_or_else(|| "value out of range".to_string())?;
        total += component;
    }
    if !digits.is_empty() {
        return Err(format!("'{}' is missing a unit (d, h, m or s)", digits));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn keywords_resolve_against_reference() {
        let r = at("2026-10-19 09:00");
        let cases = [
            ("today", "2026-10-19 09:00"),
            ("yesterday", "2026-10-18 09:00"),
            ("tomorrow", "2026-10-20 09:00"),
            ("start_of_month", "2026-10-01 09:00"),
            ("end_of_month", "2026-10-31 09:00"),
            ("start_of_year", "2026-01-01 09:00"),
            ("end_of_year", "2026-12-31 09:00"),
            ("next_week", "2026-10-26 09:00"),
            ("last_week", "2026-10-12 09:00"),
            ("beginning_of_next_month", "2026-11-01 09:00"),
            ("end_of_next_month", "2026-11-30 09:00"),
        ];
        for (expr, expected) in cases {
            let e = DateExpr::parse(expr).unwrap();
            assert_eq!(e.resolve(r), Some(at(expected)), "{expr}");
        }
    }

    #[test]
    fn end_of_month_handles_december_and_february() {
        let e = DateExpr::parse("end_of_month").unwrap();
        assert_eq!(e.resolve(at("2026-12-05 00:00")), Some(at("2026-12-31 00:00")));
        assert_eq!(e.resolve(at("2024-02-10 00:00")), Some(at("2024-02-29 00:00")));
        let e = DateExpr::parse("end_of_next_month").unwrap();
        assert_eq!(e.resolve(at("2026-12-05 00:00")), Some(at("2027-01-31 00:00")));
    }

    #[test]
    fn offsets_apply_to_anchor() {
        let r = at("2026-10-19 09:00");
        let e = DateExpr::parse("today-1d6h").unwrap();
        assert_eq!(e.resolve(r), Some(at("2026-10-18 03:00")));
        let e = DateExpr::parse("yesterday+30m").unwrap();
        assert_eq!(e.resolve(r), Some(at("2026-10-18 09:30")));
    }

    #[test]
    fn literals_compact_and_iso() {
        let r = at("2000-01-01 00:00");
        let cases = [
            ("2024", "2024-01-01 00:00"),
            ("202403", "2024-03-01 00:00"),
            ("20240308", "2024-03-08 00:00"),
            ("2024030806", "2024-03-08 06:00"),
            ("202403080630", "2024-03-08 06:30"),
            ("2024-03-08", "2024-03-08 00:00"),
            ("2024-03-08T06:30", "2024-03-08 06:30"),
            ("2024010100+12h", "2024-01-01 12:00"),
            ("2024-01-08-1d", "2024-01-07 00:00"),
        ];
        for (expr, expected) in cases {
            let e = DateExpr::parse(expr).unwrap();
            assert_eq!(e.resolve(r), Some(at(expected)), "{expr}");
        }
    }

    #[test]
    fn rejects_bad_expressions() {
        for bad in ["", "someday", "today-1", "today-1x", "20241", "2024-13-01", "2024023000"] {
            assert!(DateExpr::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn increments_must_be_positive() {
        assert_eq!(Increment::parse("6h").unwrap().delta(), TimeDelta::hours(6));
        assert_eq!(Increment::parse("+1d12h").unwrap().delta(), TimeDelta::hours(36));
        assert!(Increment::parse("0h").is_err());
        assert!(Increment::parse("-1d").is_err());
        assert!(Increment::parse("6").is_err());
        assert!(Increment::parse("").is_err());
    }

    #[test]
    fn renders_strftime_placeholders() {
        let out = render_command("fetch --cycle %Y%m%d%H", at("2026-10-19 06:00")).unwrap();
        assert_eq!(out, "fetch --cycle 2026101906");
        assert!(check_template("echo %Y-%m-%d").is_ok());
        assert!(check_template("echo %Q").is_err());
    }
}
