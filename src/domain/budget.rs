use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DateRange, FamilyId, Money};

pub type BudgetAllocationId = Uuid;

/// Amount set aside for a spending category over a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAllocation {
    pub id: BudgetAllocationId,
    pub family_id: FamilyId,
    pub category: String,
    pub amount: Money,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl BudgetAllocation {
    pub fn new(
        family_id: FamilyId,
        category: String,
        amount: Money,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            category,
            amount,
            period_start,
            period_end,
            created_at: Utc::now(),
        }
    }

    pub fn period(&self) -> DateRange {
        DateRange::new(self.period_start, self.period_end)
    }

    /// True when the allocation's period overlaps `range`.
    pub fn overlaps(&self, range: &DateRange) -> bool {
        self.period_start <= range.end && self.period_end >= range.start
    }
}

/// How spending compares to the budgeted amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetHealth {
    UnderBudget,
    OnTrack,
    OverBudget,
    WayOverBudget,
}

impl BudgetHealth {
    const UNDER_LIMIT: Decimal = dec!(0.75);
    const ON_TRACK_LIMIT: Decimal = dec!(1);
    const OVER_LIMIT: Decimal = dec!(1.25);

    /// Classify `spent / budgeted`: up to 75% under budget, up to 100% on track,
    /// up to 125% over budget, beyond that way over budget.
    ///
    /// Any spending against a zero budget is way over budget.
    pub fn classify(spent: Money, budgeted: Money) -> Self {
        if budgeted <= Decimal::ZERO {
            return if spent > Decimal::ZERO {
                BudgetHealth::WayOverBudget
            } else {
                BudgetHealth::UnderBudget
            };
        }

        // a ratio too large to represent is far past every threshold
        let Some(used) = spent.checked_div(budgeted) else {
            return if spent > Decimal::ZERO {
                BudgetHealth::WayOverBudget
            } else {
                BudgetHealth::UnderBudget
            };
        };
        if used <= Self::UNDER_LIMIT {
            BudgetHealth::UnderBudget
        } else if used <= Self::ON_TRACK_LIMIT {
            BudgetHealth::OnTrack
        } else if used <= Self::OVER_LIMIT {
            BudgetHealth::OverBudget
        } else {
            BudgetHealth::WayOverBudget
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetHealth::UnderBudget => "under_budget",
            BudgetHealth::OnTrack => "on_track",
            BudgetHealth::OverBudget => "over_budget",
            BudgetHealth::WayOverBudget => "way_over_budget",
        }
    }
}

impl std::fmt::Display for BudgetHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
