use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AccountType, BudgetHealth, DateRange, Granularity, Money, PaymentId, ReportType,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub category: String,
    pub total: Money,
    pub count: usize,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowReport {
    pub range: DateRange,
    pub granularity: Granularity,
    pub periods: Vec<CashFlowPeriod>,
    pub total_income: Money,
    pub total_expenses: Money,
    pub net: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowPeriod {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub income: Money,
    pub expenses: Money,
    pub net: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingAnalysisReport {
    pub range: DateRange,
    pub total: Money,
    /// Largest categories first, limited to the requested top N
    pub categories: Vec<CategoryAmount>,
    /// Spending in categories beyond the top N
    pub other: Money,
    pub top_merchants: Vec<MerchantAmount>,
    pub periods: Vec<SpendingPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantAmount {
    pub merchant: String,
    pub total: Money,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingPeriod {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPerformanceReport {
    pub range: DateRange,
    pub lines: Vec<BudgetLine>,
    pub total_budgeted: Money,
    pub total_spent: Money,
    /// Spending in categories without any budget for the range
    pub unbudgeted_spending: Money,
    pub status_counts: BudgetStatusCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub category: String,
    pub budgeted: Money,
    pub spent: Money,
    pub remaining: Money,
    pub percent_used: Decimal,
    pub status: BudgetHealth,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStatusCounts {
    pub under_budget: usize,
    pub on_track: usize,
    pub over_budget: usize,
    pub way_over_budget: usize,
}

impl BudgetStatusCounts {
    pub fn record(&mut self, status: BudgetHealth) {
        match status {
            BudgetHealth::UnderBudget => self.under_budget += 1,
            BudgetHealth::OnTrack => self.on_track += 1,
            BudgetHealth::OverBudget => self.over_budget += 1,
            BudgetHealth::WayOverBudget => self.way_over_budget += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeAnalysisReport {
    pub range: DateRange,
    /// Expected amount of non-cancelled income scheduled in the range
    pub total_expected: Money,
    /// Actual amount of income received in the range
    pub total_received: Money,
    pub variance: Money,
    pub pending_count: usize,
    pub sources: Vec<IncomeSource>,
    pub periods: Vec<IncomePeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeSource {
    pub source: String,
    pub expected: Money,
    pub received: Money,
    pub count: usize,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomePeriod {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub received: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWorthReport {
    pub as_of: NaiveDate,
    pub total_assets: Money,
    pub total_liabilities: Money,
    pub net_worth: Money,
    pub assets: Vec<AccountBalance>,
    pub liabilities: Vec<AccountBalance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub name: String,
    pub account_type: AccountType,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsRateReport {
    pub range: DateRange,
    pub total_income: Money,
    pub total_expenses: Money,
    pub savings: Money,
    pub savings_rate: Decimal,
    pub periods: Vec<SavingsPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsPeriod {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub income: Money,
    pub expenses: Money,
    pub savings: Money,
    pub savings_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummaryReport {
    pub range: DateRange,
    pub income: Money,
    pub expenses: Money,
    pub net: Money,
    pub savings_rate: Decimal,
    pub top_categories: Vec<CategoryAmount>,
    pub budget_status: BudgetStatusCounts,
    /// Payments due in the range and still unpaid at its end
    pub overdue_payments: Vec<PaymentSummary>,
    /// Payments due in the 30 days after the range
    pub upcoming_payments: Vec<PaymentSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub id: PaymentId,
    pub payee: String,
    pub amount: Money,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualSummaryReport {
    pub range: DateRange,
    pub cash_flow: CashFlowReport,
    pub spending: SpendingAnalysisReport,
    pub budget: BudgetPerformanceReport,
    pub income: IncomeAnalysisReport,
    pub savings: SavingsRateReport,
}

/// Any report the aggregator produces, tagged with its kind when serialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "report_type", rename_all = "snake_case")]
pub enum ReportPayload {
    CashFlow(CashFlowReport),
    SpendingAnalysis(SpendingAnalysisReport),
    BudgetPerformance(BudgetPerformanceReport),
    IncomeAnalysis(IncomeAnalysisReport),
    NetWorth(NetWorthReport),
    SavingsRate(SavingsRateReport),
    MonthlySummary(MonthlySummaryReport),
    AnnualSummary(Box<AnnualSummaryReport>),
}

impl ReportPayload {
    pub fn report_type(&self) -> ReportType {
        match self {
            ReportPayload::CashFlow(_) => ReportType::CashFlow,
            ReportPayload::SpendingAnalysis(_) => ReportType::SpendingAnalysis,
            ReportPayload::BudgetPerformance(_) => ReportType::BudgetPerformance,
            ReportPayload::IncomeAnalysis(_) => ReportType::IncomeAnalysis,
            ReportPayload::NetWorth(_) => ReportType::NetWorth,
            ReportPayload::SavingsRate(_) => ReportType::SavingsRate,
            ReportPayload::MonthlySummary(_) => ReportType::MonthlySummary,
            ReportPayload::AnnualSummary(_) => ReportType::AnnualSummary,
        }
    }
}
