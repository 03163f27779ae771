use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FamilyId, Money};

pub type AccountId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
    /// Credit cards
    Credit,
    /// Mortgages, car loans, student loans
    Loan,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Credit => "credit",
            AccountType::Loan => "loan",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "checking" => Some(AccountType::Checking),
            "savings" => Some(AccountType::Savings),
            "credit" => Some(AccountType::Credit),
            "loan" => Some(AccountType::Loan),
            _ => None,
        }
    }

    /// Returns true for accounts that hold money the family owns.
    pub fn is_asset(&self) -> bool {
        matches!(self, AccountType::Checking | AccountType::Savings)
    }

    /// Returns true for accounts that represent money owed.
    pub fn is_liability(&self) -> bool {
        matches!(self, AccountType::Credit | AccountType::Loan)
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bank, card or loan account with its latest known balance.
///
/// Liability balances may be stored with either sign; reports use their
/// absolute value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub family_id: FamilyId,
    pub name: String,
    pub account_type: AccountType,
    pub balance: Money,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(family_id: FamilyId, name: String, account_type: AccountType, balance: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            family_id,
            name,
            account_type,
            balance,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_roundtrip() {
        for at in [
            AccountType::Checking,
            AccountType::Savings,
            AccountType::Credit,
            AccountType::Loan,
        ] {
            assert_eq!(AccountType::from_str(at.as_str()), Some(at));
        }
    }

    #[test]
    fn test_classification() {
        assert!(AccountType::Checking.is_asset());
        assert!(AccountType::Savings.is_asset());
        assert!(AccountType::Credit.is_liability());
        assert!(AccountType::Loan.is_liability());
        assert!(!AccountType::Loan.is_asset());
    }
}
