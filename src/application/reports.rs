use tracing::debug;

use crate::domain::{
    DateRange, FamilyId, Granularity, IncomeEvent, ReportParameters, ReportType,
};
use crate::storage::Repository;

use super::aggregation::*;
use super::reporting::*;
use super::AppError;

/// Builds report payloads for one family over a date range.
///
/// Each kind has its own method; `generate` dispatches on the kind a schedule
/// stores. The annual summary composes the other builders directly.
#[derive(Clone)]
pub struct ReportAggregator {
    repo: Repository,
}

fn aggregation_error(err: anyhow::Error) -> AppError {
    AppError::AggregationFailure(format!("{:#}", err))
}

impl ReportAggregator {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Produce the report of the given kind.
    pub async fn generate(
        &self,
        report_type: ReportType,
        family_id: FamilyId,
        range: DateRange,
        parameters: &ReportParameters,
    ) -> Result<ReportPayload, AppError> {
        debug!(%family_id, report_type = %report_type, start = %range.start, end = %range.end, "aggregating report");

        Ok(match report_type {
            ReportType::CashFlow => {
                ReportPayload::CashFlow(self.cash_flow(family_id, range, parameters).await?)
            }
            ReportType::SpendingAnalysis => ReportPayload::SpendingAnalysis(
                self.spending_analysis(family_id, range, parameters).await?,
            ),
            ReportType::BudgetPerformance => ReportPayload::BudgetPerformance(
                self.budget_performance(family_id, range, parameters).await?,
            ),
            ReportType::IncomeAnalysis => ReportPayload::IncomeAnalysis(
                self.income_analysis(family_id, range, parameters).await?,
            ),
            ReportType::NetWorth => ReportPayload::NetWorth(self.net_worth(family_id, range).await?),
            ReportType::SavingsRate => {
                ReportPayload::SavingsRate(self.savings_rate(family_id, range, parameters).await?)
            }
            ReportType::MonthlySummary => ReportPayload::MonthlySummary(
                self.monthly_summary(family_id, range, parameters).await?,
            ),
            ReportType::AnnualSummary => ReportPayload::AnnualSummary(Box::new(
                self.annual_summary(family_id, range, parameters).await?,
            )),
        })
    }

    async fn received_income(
        &self,
        family_id: FamilyId,
        range: DateRange,
    ) -> Result<Vec<IncomeEvent>, AppError> {
        self.repo
            .list_income_in_range(family_id, range)
            .await
            .map_err(aggregation_error)
    }

    pub async fn cash_flow(
        &self,
        family_id: FamilyId,
        range: DateRange,
        parameters: &ReportParameters,
    ) -> Result<CashFlowReport, AppError> {
        let incomes = self.received_income(family_id, range).await?;
        let expenses = self
            .repo
            .list_expenses_in_range(family_id, range)
            .await
            .map_err(aggregation_error)?;

        Ok(build_cash_flow(
            range,
            parameters.granularity_or(Granularity::Month),
            &incomes,
            &expenses,
        ))
    }

    pub async fn spending_analysis(
        &self,
        family_id: FamilyId,
        range: DateRange,
        parameters: &ReportParameters,
    ) -> Result<SpendingAnalysisReport, AppError> {
        let expenses = self
            .repo
            .list_expenses_in_range(family_id, range)
            .await
            .map_err(aggregation_error)?;

        Ok(build_spending_analysis(range, parameters, &expenses))
    }

    pub async fn budget_performance(
        &self,
        family_id: FamilyId,
        range: DateRange,
        parameters: &ReportParameters,
    ) -> Result<BudgetPerformanceReport, AppError> {
        let budgets = self
            .repo
            .list_budget_allocations_in_range(family_id, range)
            .await
            .map_err(aggregation_error)?;
        let expenses = self
            .repo
            .list_expenses_in_range(family_id, range)
            .await
            .map_err(aggregation_error)?;

        Ok(build_budget_performance(range, parameters, &budgets, &expenses))
    }

    pub async fn income_analysis(
        &self,
        family_id: FamilyId,
        range: DateRange,
        parameters: &ReportParameters,
    ) -> Result<IncomeAnalysisReport, AppError> {
        let incomes = self.received_income(family_id, range).await?;

        Ok(build_income_analysis(
            range,
            parameters.granularity_or(Granularity::Month),
            &incomes,
        ))
    }

    /// Balances are a snapshot; the range end is reported as the as-of date.
    pub async fn net_worth(
        &self,
        family_id: FamilyId,
        range: DateRange,
    ) -> Result<NetWorthReport, AppError> {
        let accounts = self
            .repo
            .list_accounts(family_id)
            .await
            .map_err(aggregation_error)?;

        Ok(build_net_worth(range.end, &accounts))
    }

    pub async fn savings_rate(
        &self,
        family_id: FamilyId,
        range: DateRange,
        parameters: &ReportParameters,
    ) -> Result<SavingsRateReport, AppError> {
        let incomes = self.received_income(family_id, range).await?;
        let expenses = self
            .repo
            .list_expenses_in_range(family_id, range)
            .await
            .map_err(aggregation_error)?;

        Ok(build_savings_rate(
            range,
            parameters.granularity_or(Granularity::Month),
            &incomes,
            &expenses,
        ))
    }

    pub async fn monthly_summary(
        &self,
        family_id: FamilyId,
        range: DateRange,
        parameters: &ReportParameters,
    ) -> Result<MonthlySummaryReport, AppError> {
        let incomes = self.received_income(family_id, range).await?;
        let expenses = self
            .repo
            .list_expenses_in_range(family_id, range)
            .await
            .map_err(aggregation_error)?;
        let budgets = self
            .repo
            .list_budget_allocations_in_range(family_id, range)
            .await
            .map_err(aggregation_error)?;
        let payments = self
            .repo
            .list_payments_due_in_range(family_id, range)
            .await
            .map_err(aggregation_error)?;
        let upcoming = self
            .repo
            .list_payments_due_in_range(family_id, upcoming_range(&range))
            .await
            .map_err(aggregation_error)?;

        Ok(build_monthly_summary(
            range,
            parameters,
            &incomes,
            &expenses,
            &budgets,
            &payments,
            &upcoming,
        ))
    }

    /// Cash flow, spending, budget, income and savings over the same range,
    /// aggregated concurrently.
    pub async fn annual_summary(
        &self,
        family_id: FamilyId,
        range: DateRange,
        parameters: &ReportParameters,
    ) -> Result<AnnualSummaryReport, AppError> {
        let (cash_flow, spending, budget, income, savings) = tokio::try_join!(
            self.cash_flow(family_id, range, parameters),
            self.spending_analysis(family_id, range, parameters),
            self.budget_performance(family_id, range, parameters),
            self.income_analysis(family_id, range, parameters),
            self.savings_rate(family_id, range, parameters),
        )?;

        Ok(AnnualSummaryReport {
            range,
            cash_flow,
            spending,
            budget,
            income,
            savings,
        })
    }
}
