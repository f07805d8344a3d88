//! Turns the requested time window into independently processed ranges.
//!
//! A run targets either one explicit date range (exhaustive, repair-eligible)
//! or a sequence of calendar months (one bounded sample per month). Every
//! range carries a half-open `[from, before)` window over `_meta.updated`.

use crate::DefsyncErr;
use crate::Result;
use crate::store::RecordFilter;
use chrono::Days;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A calendar month in `YYYY-MM` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl FromStr for YearMonth {
    type Err = DefsyncErr;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DefsyncErr::InvalidMonth(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Every month between the two endpoints, inclusive, in ascending order
/// regardless of the order the endpoints were given in.
pub fn create_months(start: &str, end: &str) -> Result<Vec<YearMonth>> {
    Ok(MonthRange::parse(start, end)?.months())
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| DefsyncErr::InvalidDate(s.to_string()))
}

/// Inclusive day range. An end before the start collapses to a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if end < start {
            tracing::warn!("end date {end} is before start date {start}; using {start} for both");
            return Self { start, end: start };
        }
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self::new(parse_date(start)?, parse_date(end)?))
    }
}

/// Inclusive month range as given by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub start: YearMonth,
    pub end: YearMonth,
}

impl MonthRange {
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: start.parse()?,
            end: end.parse()?,
        })
    }

    pub fn months(&self) -> Vec<YearMonth> {
        let (mut current, last) = if self.start <= self.end {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        };
        let mut months = vec![current];
        while current < last {
            current = current.succ();
            months.push(current);
        }
        months
    }
}

/// What a run targets. A date range takes precedence over months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunWindow {
    Dates(DateRange),
    Months(MonthRange),
}

/// Half-open `[from, before)` window over `_meta.updated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatedWindow {
    pub from: NaiveDate,
    pub before: NaiveDate,
}

impl UpdatedWindow {
    pub fn lower_bound(self) -> String {
        self.from.format(DATE_FORMAT).to_string()
    }

    pub fn upper_bound(self) -> String {
        self.before.format(DATE_FORMAT).to_string()
    }

    /// ISO-8601 timestamps order lexicographically, so a string comparison
    /// against the day boundaries is exact.
    pub fn contains(self, updated: &str) -> bool {
        updated >= self.lower_bound().as_str() && updated < self.upper_bound().as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// Explicit date range: every page is processed and repair may run.
    Exhaustive,
    /// One calendar month: a single page is sampled, never repaired.
    Sample,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub label: String,
    pub window: UpdatedWindow,
    pub kind: RangeKind,
}

impl Range {
    pub fn is_sample(&self) -> bool {
        self.kind == RangeKind::Sample
    }

    /// Every record updated inside the window.
    pub fn filter_all(&self) -> RecordFilter {
        RecordFilter {
            window: self.window,
            missing_declared_only: false,
        }
    }

    /// Records inside the window that have no declared value.
    pub fn filter_missing(&self) -> RecordFilter {
        RecordFilter {
            window: self.window,
            missing_declared_only: true,
        }
    }
}

pub fn date_range_label(range: DateRange, initial_skip: u64) -> String {
    let base = format!(
        "{}_{}",
        range.start.format(DATE_FORMAT),
        range.end.format(DATE_FORMAT)
    );
    if initial_skip > 0 {
        format!("{base}_offset_{initial_skip}")
    } else {
        base
    }
}

pub fn plan_ranges(window: &RunWindow, initial_skip: u64) -> Vec<Range> {
    match window {
        RunWindow::Dates(dates) => {
            let before = dates
                .end
                .checked_add_days(Days::new(1))
                .unwrap_or(dates.end);
            vec![Range {
                label: date_range_label(*dates, initial_skip),
                window: UpdatedWindow {
                    from: dates.start,
                    before,
                },
                kind: RangeKind::Exhaustive,
            }]
        }
        RunWindow::Months(months) => months
            .months()
            .into_iter()
            .filter_map(|month| {
                let from = month.first_day()?;
                let before = month.succ().first_day()?;
                Some(Range {
                    label: month.to_string(),
                    window: UpdatedWindow { from, before },
                    kind: RangeKind::Sample,
                })
            })
            .collect(),
    }
}

/// Default results filename derived from the window and skip offset.
pub fn default_output_file(window: &RunWindow, initial_skip: u64) -> String {
    match window {
        RunWindow::Dates(dates) => {
            let mut name = format!(
                "invalid_data_{}_{}",
                dates.start.format(DATE_FORMAT),
                dates.end.format(DATE_FORMAT)
            );
            if initial_skip > 0 {
                name.push_str(&format!("_skip{initial_skip}"));
            }
            name.push_str(".json");
            name
        }
        RunWindow::Months(months) => {
            let first = months.start.min(months.end);
            let last = months.start.max(months.end);
            format!("invalid_data_{first}_{last}.json")
        }
    }
}
