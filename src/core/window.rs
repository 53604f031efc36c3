//! Reporting windows. Both bounds are inclusive.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub label: String,
}

impl PeriodWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    /// A caller-supplied range; rejects `start > end`.
    pub fn custom(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            bail!("start_date must be before or equal to end_date");
        }
        let label = format!(
            "Custom Range ({} to {})",
            start.format("%Y-%m-%d %H:%M:%S"),
            end.format("%Y-%m-%d %H:%M:%S")
        );
        Ok(Self::new(start, end, label))
    }

    /// Every representable record time.
    pub fn all_time() -> Self {
        let start = NaiveDate::from_ymd_opt(1, 1, 1)
            .unwrap_or(NaiveDate::MIN)
            .and_time(NaiveTime::MIN);
        let end = end_of_day(NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX));
        Self::new(start, end, "All Time")
    }

    /// `[day 00:00:00, day+6 23:59:59]`.
    pub fn week_starting(day: NaiveDate) -> Result<Self> {
        let start = day.and_time(NaiveTime::MIN);
        let end = start
            .checked_add_signed(Duration::days(7) - Duration::seconds(1))
            .with_context(|| format!("Week starting {day} is outside the supported date range"))?;
        Ok(Self::new(start, end, format!("Week of {day}")))
    }

    /// The seven days immediately before this window's start, ending one
    /// second before it.
    pub fn preceding_week(&self) -> Result<Self> {
        let (Some(start), Some(end)) = (
            self.start.checked_sub_signed(Duration::days(7)),
            self.start.checked_sub_signed(Duration::seconds(1)),
        ) else {
            bail!(
                "Week before {} is outside the supported date range",
                self.start.date()
            );
        };
        Ok(Self::new(start, end, format!("Week of {}", start.date())))
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Canned reporting windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Today,
    PreviousDay,
    CurrentWeek,
    PreviousWeek,
    CurrentMonth,
    PreviousMonth,
    YearToDate,
}

impl Interval {
    pub const ALL: [Interval; 7] = [
        Interval::Today,
        Interval::PreviousDay,
        Interval::CurrentWeek,
        Interval::PreviousWeek,
        Interval::CurrentMonth,
        Interval::PreviousMonth,
        Interval::YearToDate,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Interval::Today => "today",
            Interval::PreviousDay => "previous_day",
            Interval::CurrentWeek => "current_week",
            Interval::PreviousWeek => "previous_week",
            Interval::CurrentMonth => "current_month",
            Interval::PreviousMonth => "previous_month",
            Interval::YearToDate => "year_to_date",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Interval::Today => "Today",
            Interval::PreviousDay => "Previous Day",
            Interval::CurrentWeek => "Current Week",
            Interval::PreviousWeek => "Previous Week",
            Interval::CurrentMonth => "Current Month",
            Interval::PreviousMonth => "Previous Month",
            Interval::YearToDate => "Year to Date",
        }
    }

    /// The window relative to the local wall clock.
    pub fn window(&self) -> PeriodWindow {
        self.window_at(Local::now().naive_local())
    }

    pub fn window_at(&self, now: NaiveDateTime) -> PeriodWindow {
        let today = now.date();
        let (start, end) = match self {
            Interval::Today => (today, today),
            Interval::PreviousDay => {
                let yesterday = today - Duration::days(1);
                (yesterday, yesterday)
            }
            Interval::CurrentWeek => {
                let monday = week_monday(today);
                (monday, monday + Duration::days(6))
            }
            Interval::PreviousWeek => {
                let monday = week_monday(today) - Duration::days(7);
                (monday, monday + Duration::days(6))
            }
            Interval::CurrentMonth => {
                let first = month_start(today);
                (first, next_month_start(first) - Duration::days(1))
            }
            Interval::PreviousMonth => {
                let first = month_start(today);
                let previous = first
                    .checked_sub_months(Months::new(1))
                    .unwrap_or(NaiveDate::MIN);
                (previous, first - Duration::days(1))
            }
            Interval::YearToDate => {
                let january = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
                (january, today)
            }
        };
        PeriodWindow::new(start.and_time(NaiveTime::MIN), end_of_day(end), self.label())
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|interval| interval.key() == s.trim().to_lowercase().replace('-', "_"))
            .ok_or_else(|| anyhow!("Invalid interval: {}", s))
    }
}

/// Monday of the ISO week containing `day`.
pub fn week_monday(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

fn next_month_start(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX)
}

/// Last representable instant of `day`.
pub fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_micro_opt(23, 59, 59, 999_999)
        .unwrap_or_else(|| day.and_time(NaiveTime::MIN))
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or ISO-8601 (`Z`, fractional
/// seconds and offsets accepted; the offset is dropped, wall time kept).
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if raw.contains('T') {
        let wall = strip_offset(raw);
        if let Ok(parsed) = NaiveDateTime::parse_from_str(wall, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(parsed);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|day| day.and_time(NaiveTime::MIN))
        .with_context(|| {
            format!(
                "Invalid date format: {raw}. Supported formats: YYYY-MM-DD, \
                 YYYY-MM-DD HH:MM:SS, or ISO 8601 (2025-12-31T21:00:00.000Z)"
            )
        })
}

fn strip_offset(raw: &str) -> &str {
    let raw = raw.trim_end_matches('Z');
    match raw.find('T') {
        Some(t) => {
            let time = &raw[t..];
            match time.find(['+', '-']) {
                Some(offset) => &raw[..t + offset],
                None => raw,
            }
        }
        None => raw,
    }
}

/// Like [`parse_datetime`], but a bare midnight expands to `23:59:59`.
pub fn parse_range_end(raw: &str) -> Result<NaiveDateTime> {
    let parsed = parse_datetime(raw)?;
    if parsed.time() == NaiveTime::MIN {
        return Ok(parsed.date().and_hms_opt(23, 59, 59).unwrap_or(parsed));
    }
    Ok(parsed)
}

/// Resolves request-style range arguments. Explicit dates take priority over
/// an interval; `None` means no filter.
pub fn resolve_window(
    interval: Option<Interval>,
    start: Option<&str>,
    end: Option<&str>,
    now: NaiveDateTime,
) -> Result<Option<PeriodWindow>> {
    if start.is_some() || end.is_some() {
        let all = PeriodWindow::all_time();
        let start = start.map(parse_datetime).transpose()?.unwrap_or(all.start);
        let end = end.map(parse_range_end).transpose()?.unwrap_or(all.end);
        return PeriodWindow::custom(start, end).map(Some);
    }
    Ok(interval.map(|interval| interval.window_at(now)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_canned_windows() {
        // Thursday
        let now = at("2026-01-22 15:30:00");

        let today = Interval::Today.window_at(now);
        assert_eq!(today.start, at("2026-01-22 00:00:00"));
        assert_eq!(today.end, end_of_day(day("2026-01-22")));
        assert_eq!(today.label, "Today");

        let previous = Interval::PreviousDay.window_at(now);
        assert_eq!(previous.start, at("2026-01-21 00:00:00"));

        let week = Interval::CurrentWeek.window_at(now);
        assert_eq!(week.start, at("2026-01-19 00:00:00"));
        assert_eq!(week.end, end_of_day(day("2026-01-25")));

        let last_week = Interval::PreviousWeek.window_at(now);
        assert_eq!(last_week.start, at("2026-01-12 00:00:00"));
        assert_eq!(last_week.end, end_of_day(day("2026-01-18")));

        let month = Interval::CurrentMonth.window_at(now);
        assert_eq!(month.start, at("2026-01-01 00:00:00"));
        assert_eq!(month.end, end_of_day(day("2026-01-31")));

        let last_month = Interval::PreviousMonth.window_at(now);
        assert_eq!(last_month.start, at("2025-12-01 00:00:00"));
        assert_eq!(last_month.end, end_of_day(day("2025-12-31")));

        let ytd = Interval::YearToDate.window_at(now);
        assert_eq!(ytd.start, at("2026-01-01 00:00:00"));
        assert_eq!(ytd.end, end_of_day(day("2026-01-22")));
    }

    #[test]
    fn test_month_windows_handle_february() {
        let now = at("2024-03-10 08:00:00");
        let last_month = Interval::PreviousMonth.window_at(now);
        assert_eq!(last_month.start, at("2024-02-01 00:00:00"));
        assert_eq!(last_month.end, end_of_day(day("2024-02-29")));
    }

    #[test]
    fn test_week_starting_and_preceding_week() {
        let week = PeriodWindow::week_starting(day("2026-01-19")).unwrap();
        assert_eq!(week.start, at("2026-01-19 00:00:00"));
        assert_eq!(week.end, at("2026-01-25 23:59:59"));

        let previous = week.preceding_week().unwrap();
        assert_eq!(previous.start, at("2026-01-12 00:00:00"));
        assert_eq!(previous.end, at("2026-01-18 23:59:59"));
    }

    #[test]
    fn test_weeks_at_calendar_limits_are_errors() {
        let err = PeriodWindow::week_starting(NaiveDate::MAX).unwrap_err();
        assert!(err.to_string().contains("outside the supported date range"));

        let first = PeriodWindow::week_starting(NaiveDate::MIN).unwrap();
        assert!(first.preceding_week().is_err());
    }

    #[test]
    fn test_day_ends_at_calendar_limit() {
        let end = end_of_day(NaiveDate::MAX);
        assert_eq!(end.date(), NaiveDate::MAX);
        assert_eq!(end.time().format("%H:%M:%S%.6f").to_string(), "23:59:59.999999");

        assert_eq!(parse_range_end("9999-12-31").unwrap(), at("9999-12-31 23:59:59"));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let window = PeriodWindow::new(at("2026-01-01 00:00:00"), at("2026-01-01 23:59:59"), "x");
        assert!(window.contains(at("2026-01-01 00:00:00")));
        assert!(window.contains(at("2026-01-01 23:59:59")));
        assert!(!window.contains(at("2026-01-02 00:00:00")));
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(parse_datetime("2025-12-31").unwrap(), at("2025-12-31 00:00:00"));
        assert_eq!(
            parse_datetime("2025-12-31 21:00:00").unwrap(),
            at("2025-12-31 21:00:00")
        );
        assert_eq!(
            parse_datetime("2025-12-31T21:00:00.000Z").unwrap(),
            at("2025-12-31 21:00:00")
        );
        assert_eq!(
            parse_datetime("2025-12-31T21:00:00+01:00").unwrap(),
            at("2025-12-31 21:00:00")
        );
        assert_eq!(
            parse_datetime("2025-12-31T21:00:00-05:00").unwrap(),
            at("2025-12-31 21:00:00")
        );
        let err = parse_datetime("31/12/2025").unwrap_err();
        assert!(err.to_string().contains("Invalid date format"));
    }

    #[test]
    fn test_resolve_window() {
        let now = at("2026-01-22 15:30:00");

        let none = resolve_window(None, None, None, now).unwrap();
        assert!(none.is_none());

        let today = resolve_window(Some(Interval::Today), None, None, now)
            .unwrap()
            .unwrap();
        assert_eq!(today.start, at("2026-01-22 00:00:00"));

        // Explicit dates win over the interval
        let custom = resolve_window(
            Some(Interval::Today),
            Some("2026-01-01"),
            Some("2026-01-31"),
            now,
        )
        .unwrap()
        .unwrap();
        assert_eq!(custom.start, at("2026-01-01 00:00:00"));
        assert_eq!(custom.end, at("2026-01-31 23:59:59"));

        let inverted = resolve_window(None, Some("2026-02-01"), Some("2026-01-01"), now);
        assert!(inverted.is_err());
    }

    #[test]
    fn test_interval_from_str() {
        assert_eq!("today".parse::<Interval>().unwrap(), Interval::Today);
        assert_eq!(
            "previous-week".parse::<Interval>().unwrap(),
            Interval::PreviousWeek
        );
        assert_eq!(
            "Year_To_Date".parse::<Interval>().unwrap(),
            Interval::YearToDate
        );
        assert!("fortnight".parse::<Interval>().is_err());
    }
}
