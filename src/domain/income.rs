use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FamilyId, Frequency, Money};

pub type IncomeEventId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeStatus {
    Scheduled,
    Received,
    Cancelled,
}

impl IncomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeStatus::Scheduled => "scheduled",
            IncomeStatus::Received => "received",
            IncomeStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scheduled" => Some(IncomeStatus::Scheduled),
            "received" => Some(IncomeStatus::Received),
            "cancelled" => Some(IncomeStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for IncomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An expected or received income payment (salary, benefits, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeEvent {
    pub id: IncomeEventId,
    pub family_id: FamilyId,
    pub source: String,
    pub amount: Money,
    pub scheduled_date: NaiveDate,
    pub actual_date: Option<NaiveDate>,
    pub actual_amount: Option<Money>,
    pub frequency: Frequency,
    pub next_occurrence: Option<NaiveDate>,
    pub status: IncomeStatus,
    pub created_at: DateTime<Utc>,
}

impl IncomeEvent {
    pub fn new(
        family_id: FamilyId,
        source: String,
        amount: Money,
        scheduled_date: NaiveDate,
        frequency: Frequency,
    ) -> Self {
        let mut event = Self {
            id: Uuid::new_v4(),
            family_id,
            source,
            amount,
            scheduled_date,
            actual_date: None,
            actual_amount: None,
            frequency,
            next_occurrence: None,
            status: IncomeStatus::Scheduled,
            created_at: Utc::now(),
        };
        event.next_occurrence = event.compute_next_occurrence();
        event
    }

    /// Next date strictly after both the scheduled and the actual date.
    /// None for one-time income.
    pub fn compute_next_occurrence(&self) -> Option<NaiveDate> {
        let latest = self
            .actual_date
            .map_or(self.scheduled_date, |actual| actual.max(self.scheduled_date));
        self.frequency
            .next_after(self.scheduled_date, self.scheduled_date.day(), latest)
    }

    /// Mark the income as received.
    pub fn receive(&mut self, actual_date: NaiveDate, actual_amount: Money) {
        self.actual_date = Some(actual_date);
        self.actual_amount = Some(actual_amount);
        self.status = IncomeStatus::Received;
        let latest = actual_date.max(self.scheduled_date);
        self.next_occurrence = match self.next_occurrence {
            Some(next) if next > latest => Some(next),
            _ => self.compute_next_occurrence(),
        };
    }

    pub fn cancel(&mut self) {
        self.status = IncomeStatus::Cancelled;
    }

    pub fn is_received(&self) -> bool {
        self.status == IncomeStatus::Received
    }

    /// The scheduled instance that follows this one, if the income recurs.
    pub fn next_instance(&self) -> Option<IncomeEvent> {
        let date = self.next_occurrence?;
        let mut next = IncomeEvent::new(
            self.family_id,
            self.source.clone(),
            self.amount,
            date,
            self.frequency,
        );
        // keep the original anchor day (e.g. the 31st) across short months
        let anchor = self.scheduled_date.day().max(date.day());
        next.next_occurrence = self.frequency.advance(date, anchor);
        Some(next)
    }

    /// Upper bound for attributions against this income: the actual amount
    /// once received, the expected amount before that.
    pub fn attribution_cap(&self) -> Money {
        self.actual_amount.unwrap_or(self.amount)
    }

    /// Date the money arrives (or is expected to).
    pub fn effective_date(&self) -> NaiveDate {
        self.actual_date.unwrap_or(self.scheduled_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            IncomeStatus::Scheduled,
            IncomeStatus::Received,
            IncomeStatus::Cancelled,
        ] {
            assert_eq!(IncomeStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_one_time_has_no_next_occurrence() {
        let event = IncomeEvent::new(
            Uuid::new_v4(),
            "Bonus".into(),
            dec!(500),
            date("2024-03-15"),
            Frequency::OneTime,
        );
        assert_eq!(event.next_occurrence, None);
        assert!(event.next_instance().is_none());
    }

    #[test]
    fn test_recurring_next_occurrence_after_scheduled_date() {
        let event = IncomeEvent::new(
            Uuid::new_v4(),
            "Salary".into(),
            dec!(3000),
            date("2024-01-31"),
            Frequency::Monthly,
        );
        assert_eq!(event.next_occurrence, Some(date("2024-02-29")));
    }

    #[test]
    fn test_receive_late_moves_next_occurrence_past_actual_date() {
        let mut event = IncomeEvent::new(
            Uuid::new_v4(),
            "Freelance".into(),
            dec!(800),
            date("2024-01-01"),
            Frequency::Weekly,
        );
        event.receive(date("2024-01-10"), dec!(750));

        assert!(event.is_received());
        assert_eq!(event.actual_amount, Some(dec!(750)));
        assert_eq!(event.next_occurrence, Some(date("2024-01-15")));
        assert_eq!(event.attribution_cap(), dec!(750));
    }

    #[test]
    fn test_next_instance_is_scheduled() {
        let mut event = IncomeEvent::new(
            Uuid::new_v4(),
            "Salary".into(),
            dec!(3000),
            date("2024-01-25"),
            Frequency::Biweekly,
        );
        event.receive(date("2024-01-25"), dec!(3000));

        let next = event.next_instance().unwrap();
        assert_eq!(next.scheduled_date, date("2024-02-08"));
        assert_eq!(next.status, IncomeStatus::Scheduled);
        assert_eq!(next.next_occurrence, Some(date("2024-02-22")));
        assert_ne!(next.id, event.id);
    }

    #[test]
    fn test_month_end_anchor_survives_february() {
        let event = IncomeEvent::new(
            Uuid::new_v4(),
            "Salary".into(),
            dec!(3000),
            date("2024-01-31"),
            Frequency::Monthly,
        );
        let february = event.next_instance().unwrap();
        assert_eq!(february.scheduled_date, date("2024-02-29"));
        assert_eq!(february.next_occurrence, Some(date("2024-03-31")));
    }
}
