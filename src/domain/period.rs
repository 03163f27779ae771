use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::recurrence::first_of_month;

/// Bucket size for time-series reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Quarter => "quarter",
            Granularity::Year => "year",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Some(Granularity::Day),
            "week" | "weekly" => Some(Granularity::Week),
            "month" | "monthly" => Some(Granularity::Month),
            "quarter" | "quarterly" => Some(Granularity::Quarter),
            "year" | "yearly" | "annual" => Some(Granularity::Year),
            _ => None,
        }
    }

    /// Last day of the calendar unit containing `date`.
    fn unit_end(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => Some(date),
            // ISO weeks start on Monday
            Granularity::Week => {
                let offset = 6 - date.weekday().num_days_from_monday();
                Some(date + Duration::days(offset as i64))
            }
            Granularity::Month => first_of_month(date)
                .checked_add_months(Months::new(1))?
                .pred_opt(),
            Granularity::Quarter => {
                let start_month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), start_month, 1)?
                    .checked_add_months(Months::new(3))?
                    .pred_opt()
            }
            Granularity::Year => NaiveDate::from_ymd_opt(date.year(), 12, 31),
        }
    }

    fn label(&self, start: NaiveDate) -> String {
        match self {
            Granularity::Day => start.format("%Y-%m-%d").to_string(),
            Granularity::Week => format!("Week of {}", start.format("%Y-%m-%d")),
            Granularity::Month => start.format("%Y-%m").to_string(),
            Granularity::Quarter => format!("Q{} {}", start.month0() / 3 + 1, start.year()),
            Granularity::Year => start.year().to_string(),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days covered, zero for an inverted range.
    pub fn days(&self) -> i64 {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }

    pub fn periods(&self, granularity: Granularity) -> Periods {
        Periods::new(*self, granularity)
    }
}

/// A contiguous bucket of a date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Iterator over calendar-aligned buckets of a range.
///
/// The first bucket starts at the range start, each bucket ends on its calendar
/// unit boundary and the last one is clipped to the range end. An inverted range
/// yields nothing.
#[derive(Debug, Clone)]
pub struct Periods {
    next_start: Option<NaiveDate>,
    end: NaiveDate,
    granularity: Granularity,
}

impl Periods {
    pub fn new(range: DateRange, granularity: Granularity) -> Self {
        Self {
            next_start: (range.start <= range.end).then_some(range.start),
            end: range.end,
            granularity,
        }
    }
}

impl Iterator for Periods {
    type Item = Period;

    fn next(&mut self) -> Option<Period> {
        let start = self.next_start?;
        let end = self
            .granularity
            .unit_end(start)
            .map_or(self.end, |unit_end| unit_end.min(self.end));

        self.next_start = end.succ_opt().filter(|next| *next <= self.end);

        Some(Period {
            start,
            end,
            label: self.granularity.label(start),
        })
    }
}

/// Split `range` into buckets of `granularity`.
pub fn generate_periods(range: DateRange, granularity: Granularity) -> Vec<Period> {
    range.periods(granularity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(date(start), date(end))
    }

    #[test]
    fn test_months_clip_last_bucket() {
        let periods = generate_periods(range("2024-01-01", "2024-03-15"), Granularity::Month);

        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0].label, "2024-01");
        assert_eq!(periods[0].end, date("2024-01-31"));
        assert_eq!(periods[1].start, date("2024-02-01"));
        assert_eq!(periods[1].end, date("2024-02-29"));
        assert_eq!(periods[2].start, date("2024-03-01"));
        assert_eq!(periods[2].end, date("2024-03-15"));
    }

    #[test]
    fn test_buckets_are_contiguous() {
        for granularity in [
            Granularity::Day,
            Granularity::Week,
            Granularity::Month,
            Granularity::Quarter,
            Granularity::Year,
        ] {
            let r = range("2023-11-17", "2025-02-03");
            let periods = generate_periods(r, granularity);
            assert_eq!(periods.first().unwrap().start, r.start);
            assert_eq!(periods.last().unwrap().end, r.end);
            for pair in periods.windows(2) {
                assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start, "{}", granularity);
            }
        }
    }

    #[test]
    fn test_quarter_labels() {
        let periods = generate_periods(range("2024-02-10", "2024-12-31"), Granularity::Quarter);
        let labels: Vec<_> = periods.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Q1 2024", "Q2 2024", "Q3 2024", "Q4 2024"]);
        assert_eq!(periods[0].start, date("2024-02-10"));
        assert_eq!(periods[0].end, date("2024-03-31"));
    }

    #[test]
    fn test_week_buckets_start_monday() {
        // 2024-01-03 is a Wednesday
        let periods = generate_periods(range("2024-01-03", "2024-01-16"), Granularity::Week);
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0].label, "Week of 2024-01-03");
        assert_eq!(periods[0].end, date("2024-01-07"));
        assert_eq!(periods[1].label, "Week of 2024-01-08");
        assert_eq!(periods[2].end, date("2024-01-16"));
    }

    #[test]
    fn test_day_and_year_labels() {
        let days = generate_periods(range("2024-02-28", "2024-03-01"), Granularity::Day);
        let labels: Vec<_> = days.iter().map(|p| p.label.clone()).collect();
        assert_eq!(labels, vec!["2024-02-28", "2024-02-29", "2024-03-01"]);

        let years = generate_periods(range("2023-06-01", "2024-02-01"), Granularity::Year);
        assert_eq!(years.len(), 2);
        assert_eq!(years[0].label, "2023");
        assert_eq!(years[1].label, "2024");
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let periods = generate_periods(range("2024-03-01", "2024-01-01"), Granularity::Month);
        assert!(periods.is_empty());
    }

    #[test]
    fn test_restartable() {
        let r = range("2024-01-01", "2024-06-30");
        let first: Vec<_> = r.periods(Granularity::Month).collect();
        let second: Vec<_> = r.periods(Granularity::Month).collect();
        assert_eq!(first, second);
    }
}
