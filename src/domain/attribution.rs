use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{IncomeEvent, IncomeEventId, IncomeStatus, Money, Payment, PaymentId};

pub type AttributionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionType {
    Manual,
    Automatic,
}

impl AttributionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionType::Manual => "manual",
            AttributionType::Automatic => "automatic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Some(AttributionType::Manual),
            "automatic" => Some(AttributionType::Automatic),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttributionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Links part of an income event to a payment it funds.
/// Attributions are created or deleted, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
    pub id: AttributionId,
    pub payment_id: PaymentId,
    pub income_event_id: IncomeEventId,
    pub amount: Money,
    pub attribution_type: AttributionType,
    pub created_at: DateTime<Utc>,
}

impl Attribution {
    pub fn new(
        payment_id: PaymentId,
        income_event_id: IncomeEventId,
        amount: Money,
        attribution_type: AttributionType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            income_event_id,
            amount,
            attribution_type,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributionError {
    #[error("Invalid amount: attribution amount must be positive, got {0}")]
    InvalidAmount(Money),

    #[error("Over-allocation of {target}: cap {cap}, already attributed {attributed}, requested {requested}")]
    OverAllocation {
        target: AllocationTarget,
        cap: Money,
        attributed: Money,
        requested: Money,
    },

    #[error("Cannot attribute against a cancelled {0}")]
    Cancelled(AllocationTarget),

    #[error("Payment and income event belong to different families")]
    FamilyMismatch,
}

/// Which side of an attribution hit a limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationTarget {
    Payment,
    IncomeEvent,
}

impl std::fmt::Display for AllocationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationTarget::Payment => write!(f, "payment"),
            AllocationTarget::IncomeEvent => write!(f, "income event"),
        }
    }
}

/// Attributed and remaining amounts, always recomputed from attribution rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionTotals {
    pub cap: Money,
    pub attributed: Money,
    pub remaining: Money,
}

impl AttributionTotals {
    pub fn compute(cap: Money, attributions: &[Attribution]) -> Self {
        let attributed: Money = attributions.iter().map(|a| a.amount).sum();
        Self {
            cap,
            attributed,
            remaining: cap - attributed,
        }
    }
}

/// Check that attributing `amount` from `income` to `payment` keeps both caps.
///
/// `payment_attributions` and `income_attributions` are the existing rows for
/// each parent.
pub fn validate_attribution(
    payment: &Payment,
    income: &IncomeEvent,
    payment_attributions: &[Attribution],
    income_attributions: &[Attribution],
    amount: Money,
) -> Result<(), AttributionError> {
    if amount <= Decimal::ZERO {
        return Err(AttributionError::InvalidAmount(amount));
    }
    if payment.family_id != income.family_id {
        return Err(AttributionError::FamilyMismatch);
    }
    if payment.is_cancelled() {
        return Err(AttributionError::Cancelled(AllocationTarget::Payment));
    }
    if income.status == IncomeStatus::Cancelled {
        return Err(AttributionError::Cancelled(AllocationTarget::IncomeEvent));
    }

    let checks = [
        (
            AllocationTarget::Payment,
            AttributionTotals::compute(payment.amount, payment_attributions),
        ),
        (
            AllocationTarget::IncomeEvent,
            AttributionTotals::compute(income.attribution_cap(), income_attributions),
        ),
    ];
    for (target, totals) in checks {
        if totals.attributed + amount > totals.cap {
            return Err(AttributionError::OverAllocation {
                target,
                cap: totals.cap,
                attributed: totals.attributed,
                requested: amount,
            });
        }
    }

    Ok(())
}

/// Check that an income's received amount still covers its attributions.
pub fn validate_receipt(received: Money, attributions: &[Attribution]) -> Result<(), AttributionError> {
    let totals = AttributionTotals::compute(received, attributions);
    if totals.remaining < Decimal::ZERO {
        return Err(AttributionError::OverAllocation {
            target: AllocationTarget::IncomeEvent,
            cap: received,
            attributed: totals.attributed,
            requested: Decimal::ZERO,
        });
    }
    Ok(())
}

/// An income event proposed for automatic attribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub income_event_id: IncomeEventId,
    pub amount: Money,
}

/// Pick the received income event best suited to fund `payment_remaining`.
///
/// Candidates are received incomes within `window_days` of `due_date` that
/// still have capacity. An income whose remaining capacity equals the amount
/// due wins; otherwise the one closest in date. The proposed amount is the
/// smaller of what is due and what the income has left.
pub fn find_automatic_match(
    due_date: NaiveDate,
    payment_remaining: Money,
    incomes: &[(IncomeEvent, AttributionTotals)],
    window_days: i64,
) -> Option<MatchCandidate> {
    if payment_remaining <= Decimal::ZERO {
        return None;
    }

    incomes
        .iter()
        .filter(|(income, totals)| income.is_received() && totals.remaining > Decimal::ZERO)
        .filter_map(|(income, totals)| {
            let distance = (income.effective_date() - due_date).num_days().abs();
            (distance <= window_days).then_some((income, totals, distance))
        })
        .min_by_key(|(income, totals, distance)| {
            (totals.remaining != payment_remaining, *distance, income.effective_date())
        })
        .map(|(income, totals, _)| MatchCandidate {
            income_event_id: income.id,
            amount: payment_remaining.min(totals.remaining),
        })
}
