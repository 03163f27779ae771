use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FamilyId, Frequency, Money};

pub type PaymentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Once,
    Recurring,
    /// Recurring, but the amount changes from one instance to the next
    Variable,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Once => "once",
            PaymentType::Recurring => "recurring",
            PaymentType::Variable => "variable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "once" => Some(PaymentType::Once),
            "recurring" => Some(PaymentType::Recurring),
            "variable" => Some(PaymentType::Variable),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment status. `Overdue` is never stored: it is derived from the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Scheduled,
    Paid,
    Overdue,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Scheduled => "scheduled",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scheduled" => Some(PaymentStatus::Scheduled),
            "paid" => Some(PaymentStatus::Paid),
            "overdue" => Some(PaymentStatus::Overdue),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bill or other obligation the household has to pay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub family_id: FamilyId,
    pub payee: String,
    pub category: Option<String>,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub paid_amount: Option<Money>,
    pub payment_type: PaymentType,
    pub frequency: Frequency,
    pub next_due_date: Option<NaiveDate>,
    /// Stored state: scheduled, paid or cancelled.
    pub state: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        family_id: FamilyId,
        payee: String,
        amount: Money,
        due_date: NaiveDate,
        payment_type: PaymentType,
        frequency: Frequency,
    ) -> Self {
        let frequency = match payment_type {
            PaymentType::Once => Frequency::OneTime,
            _ => frequency,
        };
        Self {
            id: Uuid::new_v4(),
            family_id,
            payee,
            category: None,
            amount,
            due_date,
            paid_date: None,
            paid_amount: None,
            payment_type,
            frequency,
            next_due_date: frequency.advance(due_date, due_date.day()),
            state: PaymentStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Status as seen on `today`: unpaid payments past their due date are overdue.
    pub fn status_on(&self, today: NaiveDate) -> PaymentStatus {
        match self.state {
            PaymentStatus::Scheduled if self.due_date < today => PaymentStatus::Overdue,
            state => state,
        }
    }

    pub fn mark_paid(&mut self, paid_date: NaiveDate, paid_amount: Money) {
        self.paid_date = Some(paid_date);
        self.paid_amount = Some(paid_amount);
        self.state = PaymentStatus::Paid;
    }

    pub fn cancel(&mut self) {
        self.state = PaymentStatus::Cancelled;
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == PaymentStatus::Cancelled
    }

    /// The scheduled instance that follows this one, if the payment recurs.
    pub fn next_instance(&self) -> Option<Payment> {
        let due = self.next_due_date?;
        let mut next = Payment::new(
            self.family_id,
            self.payee.clone(),
            self.amount,
            due,
            self.payment_type,
            self.frequency,
        );
        // keep the original anchor day (e.g. the 31st) across short months
        next.next_due_date = self.frequency.advance(due, self.due_date.day().max(due.day()));
        next.category = self.category.clone();
        Some(next)
    }
}
