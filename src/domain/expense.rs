use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, FamilyId, Money};

pub type ExpenseId = Uuid;

/// A dated spending transaction. Amounts are positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub family_id: FamilyId,
    pub account_id: Option<AccountId>,
    pub date: NaiveDate,
    pub amount: Money,
    pub category: String,
    pub merchant: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(family_id: FamilyId, date: NaiveDate, amount: Money, category: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            account_id: None,
            date,
            amount,
            category,
            merchant: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }
}
