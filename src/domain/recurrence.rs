use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Invalid schedule parameter: {0}")]
    InvalidScheduleParameter(String),
}

/// Recurrence cadence of income events and payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    OneTime,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::OneTime => "one_time",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Annual => "annual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "one_time" | "once" => Some(Frequency::OneTime),
            "weekly" => Some(Frequency::Weekly),
            "biweekly" => Some(Frequency::Biweekly),
            "monthly" => Some(Frequency::Monthly),
            "quarterly" => Some(Frequency::Quarterly),
            "annual" | "yearly" => Some(Frequency::Annual),
            _ => None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Frequency::OneTime)
    }

    /// Step a date forward by one period.
    ///
    /// Month-based cadences land on `min(anchor_day, days_in_month)` so that an
    /// event anchored on the 31st keeps returning to month end instead of
    /// drifting to the 28th after February. One-time events have no next date.
    pub fn advance(&self, date: NaiveDate, anchor_day: u32) -> Option<NaiveDate> {
        match self {
            Frequency::OneTime => None,
            Frequency::Weekly => Some(date + Duration::days(7)),
            Frequency::Biweekly => Some(date + Duration::days(14)),
            Frequency::Monthly => add_months_clamped(date, 1, anchor_day),
            Frequency::Quarterly => add_months_clamped(date, 3, anchor_day),
            Frequency::Annual => add_months_clamped(date, 12, anchor_day),
        }
    }

    /// First occurrence strictly after every date in `after`, stepping from `date`.
    pub fn next_after(&self, date: NaiveDate, anchor_day: u32, after: NaiveDate) -> Option<NaiveDate> {
        let mut next = self.advance(date, anchor_day)?;
        while next <= after {
            next = self.advance(next, anchor_day)?;
        }
        Some(next)
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cadence of a scheduled report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleFrequency {
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl ScheduleFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleFrequency::Weekly => "weekly",
            ScheduleFrequency::Monthly => "monthly",
            ScheduleFrequency::Quarterly => "quarterly",
            ScheduleFrequency::Annual => "annual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "weekly" => Some(ScheduleFrequency::Weekly),
            "monthly" => Some(ScheduleFrequency::Monthly),
            "quarterly" => Some(ScheduleFrequency::Quarterly),
            "annual" | "yearly" => Some(ScheduleFrequency::Annual),
            _ => None,
        }
    }

    /// Delivery day used when a schedule does not name one: Sunday for
    /// weekly, the 1st otherwise.
    pub fn default_anchor(&self) -> u32 {
        match self {
            ScheduleFrequency::Weekly => 0,
            _ => 1,
        }
    }
}

impl std::fmt::Display for ScheduleFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated `(frequency, day, hour, timezone)` of a report schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySchedule {
    pub frequency: ScheduleFrequency,
    /// Day-of-week (0 = Sunday) for weekly, day-of-month otherwise.
    pub anchor: u32,
    pub hour: u32,
    pub timezone: Tz,
}

impl DeliverySchedule {
    pub fn new(
        frequency: ScheduleFrequency,
        anchor: Option<u32>,
        hour: u32,
        timezone: &str,
    ) -> Result<Self, ScheduleError> {
        let anchor = anchor.unwrap_or_else(|| frequency.default_anchor());
        match frequency {
            ScheduleFrequency::Weekly if anchor > 6 => {
                return Err(ScheduleError::InvalidScheduleParameter(format!(
                    "weekly delivery day must be 0-6, got {}",
                    anchor
                )));
            }
            ScheduleFrequency::Monthly | ScheduleFrequency::Quarterly | ScheduleFrequency::Annual
                if !(1..=31).contains(&anchor) =>
            {
                return Err(ScheduleError::InvalidScheduleParameter(format!(
                    "delivery day of month must be 1-31, got {}",
                    anchor
                )));
            }
            _ => {}
        }
        if hour > 23 {
            return Err(ScheduleError::InvalidScheduleParameter(format!(
                "delivery hour must be 0-23, got {}",
                hour
            )));
        }
        let timezone = parse_timezone(timezone)?;

        Ok(Self {
            frequency,
            anchor,
            hour,
            timezone,
        })
    }

    /// Next delivery instant strictly after `reference`.
    pub fn next_after(&self, reference: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let local_date = reference.with_timezone(&self.timezone).date_naive();

        let date = match self.frequency {
            ScheduleFrequency::Weekly => {
                let weekday = local_date.weekday().num_days_from_sunday();
                let days = match (self.anchor + 7 - weekday) % 7 {
                    0 => 7,
                    d => d,
                };
                local_date + Duration::days(days as i64)
            }
            ScheduleFrequency::Monthly => {
                let first = first_of_month(local_date);
                add_months_clamped(first, 1, self.anchor).ok_or_else(out_of_range)?
            }
            // Quarter and year boundaries always reset to day 1.
            ScheduleFrequency::Quarterly => {
                let quarter_start_month = (local_date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(local_date.year(), quarter_start_month, 1)
                    .and_then(|d| d.checked_add_months(Months::new(3)))
                    .ok_or_else(out_of_range)?
            }
            ScheduleFrequency::Annual => {
                NaiveDate::from_ymd_opt(local_date.year() + 1, 1, 1).ok_or_else(out_of_range)?
            }
        };

        let next = localize(date, self.hour, self.timezone)?;
        debug_assert!(next > reference);
        Ok(next)
    }
}

/// Compute the next occurrence of a report schedule after `reference`.
pub fn next_occurrence(
    frequency: ScheduleFrequency,
    anchor: Option<u32>,
    hour: u32,
    reference: DateTime<Utc>,
    timezone: &str,
) -> Result<DateTime<Utc>, ScheduleError> {
    DeliverySchedule::new(frequency, anchor, hour, timezone)?.next_after(reference)
}

pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidScheduleParameter(format!("unknown timezone: {}", name)))
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = first.and_then(|d| d.checked_add_months(Months::new(1)));
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 31,
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Add `months` to `date` and land on `min(anchor_day, days_in_target_month)`.
fn add_months_clamped(date: NaiveDate, months: u32, anchor_day: u32) -> Option<NaiveDate> {
    let target = first_of_month(date).checked_add_months(Months::new(months))?;
    let day = anchor_day.clamp(1, days_in_month(target.year(), target.month()));
    target.with_day(day)
}

/// Wall-clock `hour:00` on `date` in `tz`, as UTC.
fn localize(date: NaiveDate, hour: u32, tz: Tz) -> Result<DateTime<Utc>, ScheduleError> {
    let naive = date.and_hms_opt(hour, 0, 0).ok_or_else(out_of_range)?;
    // Nonexistent local times (spring-forward gaps) shift to the next hour.
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(out_of_range)
}

fn out_of_range() -> ScheduleError {
    ScheduleError::InvalidScheduleParameter("date out of range".to_string())
}
