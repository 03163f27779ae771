//! Pure report builders.
//!
//! Every function here takes already-loaded records and a range; nothing
//! touches the store. Income means received income (actual amount at the
//! actual date) and expenses are recorded expense rows.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::domain::{
    generate_periods, percentage, Account, BudgetAllocation, BudgetHealth, DateRange, Expense,
    Granularity, IncomeEvent, IncomeStatus, Money, Payment, PaymentStatus, ReportParameters,
};

use super::reporting::*;

/// Days after the range covered by the upcoming payments list.
pub const UPCOMING_PAYMENT_DAYS: i64 = 30;

fn received_between(incomes: &[IncomeEvent], range: &DateRange) -> Money {
    incomes
        .iter()
        .filter(|i| i.status == IncomeStatus::Received)
        .filter_map(|i| Some((i.actual_date?, i.actual_amount?)))
        .filter(|(date, _)| range.contains(*date))
        .map(|(_, amount)| amount)
        .sum()
}

fn spent_between<'a>(expenses: impl IntoIterator<Item = &'a Expense>, range: &DateRange) -> Money {
    expenses
        .into_iter()
        .filter(|e| range.contains(e.date))
        .map(|e| e.amount)
        .sum()
}

fn filtered_expenses<'a>(
    expenses: &'a [Expense],
    parameters: &'a ReportParameters,
) -> impl Iterator<Item = &'a Expense> + 'a {
    expenses
        .iter()
        .filter(move |e| parameters.includes_category(&e.category))
}

/// Category totals, largest first; ties broken by name.
fn category_totals<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Vec<CategoryAmount> {
    let mut by_category: BTreeMap<&str, (Money, usize)> = BTreeMap::new();
    for expense in expenses {
        let entry = by_category
            .entry(expense.category.as_str())
            .or_insert((Decimal::ZERO, 0));
        entry.0 += expense.amount;
        entry.1 += 1;
    }

    let total: Money = by_category.values().map(|(amount, _)| *amount).sum();
    let mut categories: Vec<CategoryAmount> = by_category
        .into_iter()
        .map(|(category, (amount, count))| CategoryAmount {
            category: category.to_string(),
            total: amount,
            count,
            percentage: percentage(amount, total),
        })
        .collect();
    categories.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    categories
}

pub fn build_cash_flow(
    range: DateRange,
    granularity: Granularity,
    incomes: &[IncomeEvent],
    expenses: &[Expense],
) -> CashFlowReport {
    let periods: Vec<CashFlowPeriod> = generate_periods(range, granularity)
        .into_iter()
        .map(|period| {
            let bucket = DateRange::new(period.start, period.end);
            let income = received_between(incomes, &bucket);
            let spent = spent_between(expenses, &bucket);
            CashFlowPeriod {
                label: period.label,
                start: period.start,
                end: period.end,
                income,
                expenses: spent,
                net: income - spent,
            }
        })
        .collect();

    let total_income = periods.iter().map(|p| p.income).sum();
    let total_expenses = periods.iter().map(|p| p.expenses).sum();

    CashFlowReport {
        range,
        granularity,
        periods,
        total_income,
        total_expenses,
        net: total_income - total_expenses,
    }
}

pub fn build_spending_analysis(
    range: DateRange,
    parameters: &ReportParameters,
    expenses: &[Expense],
) -> SpendingAnalysisReport {
    let in_range: Vec<&Expense> = filtered_expenses(expenses, parameters)
        .filter(|e| range.contains(e.date))
        .collect();
    let total: Money = in_range.iter().map(|e| e.amount).sum();

    let mut categories = category_totals(in_range.iter().copied());
    let top_n = parameters.top_n();
    let other = categories.iter().skip(top_n).map(|c| c.total).sum();
    categories.truncate(top_n);

    let mut by_merchant: BTreeMap<&str, (Money, usize)> = BTreeMap::new();
    for expense in &in_range {
        if let Some(merchant) = expense.merchant.as_deref() {
            let entry = by_merchant.entry(merchant).or_insert((Decimal::ZERO, 0));
            entry.0 += expense.amount;
            entry.1 += 1;
        }
    }
    let mut top_merchants: Vec<MerchantAmount> = by_merchant
        .into_iter()
        .map(|(merchant, (total, count))| MerchantAmount {
            merchant: merchant.to_string(),
            total,
            count,
        })
        .collect();
    top_merchants.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.merchant.cmp(&b.merchant)));
    top_merchants.truncate(top_n);

    let periods = generate_periods(range, parameters.granularity_or(Granularity::Month))
        .into_iter()
        .map(|period| {
            let bucket = DateRange::new(period.start, period.end);
            SpendingPeriod {
                total: spent_between(in_range.iter().copied(), &bucket),
                label: period.label,
                start: period.start,
                end: period.end,
            }
        })
        .collect();

    SpendingAnalysisReport {
        range,
        total,
        categories,
        other,
        top_merchants,
        periods,
    }
}

/// Budgeted categories are compared with spending in the range. Every
/// allocation that overlaps the range counts in full.
pub fn build_budget_performance(
    range: DateRange,
    parameters: &ReportParameters,
    budgets: &[BudgetAllocation],
    expenses: &[Expense],
) -> BudgetPerformanceReport {
    let mut budgeted: BTreeMap<&str, Money> = BTreeMap::new();
    for budget in budgets
        .iter()
        .filter(|b| b.overlaps(&range) && parameters.includes_category(&b.category))
    {
        *budgeted.entry(budget.category.as_str()).or_insert(Decimal::ZERO) += budget.amount;
    }

    let mut spent: BTreeMap<&str, Money> = BTreeMap::new();
    for expense in filtered_expenses(expenses, parameters).filter(|e| range.contains(e.date)) {
        *spent.entry(expense.category.as_str()).or_insert(Decimal::ZERO) += expense.amount;
    }

    let mut status_counts = BudgetStatusCounts::default();
    let lines: Vec<BudgetLine> = budgeted
        .iter()
        .map(|(category, amount)| {
            let used = spent.get(category).copied().unwrap_or(Decimal::ZERO);
            let status = BudgetHealth::classify(used, *amount);
            status_counts.record(status);
            BudgetLine {
                category: category.to_string(),
                budgeted: *amount,
                spent: used,
                remaining: *amount - used,
                percent_used: percentage(used, *amount),
                status,
            }
        })
        .collect();

    let unbudgeted_spending = spent
        .iter()
        .filter(|(category, _)| !budgeted.contains_key(*category))
        .map(|(_, amount)| *amount)
        .sum();

    BudgetPerformanceReport {
        range,
        total_budgeted: lines.iter().map(|l| l.budgeted).sum(),
        total_spent: lines.iter().map(|l| l.spent).sum(),
        lines,
        unbudgeted_spending,
        status_counts,
    }
}

pub fn build_income_analysis(
    range: DateRange,
    granularity: Granularity,
    incomes: &[IncomeEvent],
) -> IncomeAnalysisReport {
    let active: Vec<&IncomeEvent> = incomes
        .iter()
        .filter(|i| i.status != IncomeStatus::Cancelled)
        .collect();

    let mut by_source: BTreeMap<&str, (Money, Money, usize)> = BTreeMap::new();
    let mut pending_count = 0;
    for income in &active {
        let entry = by_source
            .entry(income.source.as_str())
            .or_insert((Decimal::ZERO, Decimal::ZERO, 0));
        if range.contains(income.scheduled_date) {
            entry.0 += income.amount;
            entry.2 += 1;
            if income.status == IncomeStatus::Scheduled {
                pending_count += 1;
            }
        }
        if let (Some(date), Some(amount)) = (income.actual_date, income.actual_amount) {
            if range.contains(date) {
                entry.1 += amount;
            }
        }
    }

    let total_expected: Money = by_source.values().map(|(expected, _, _)| *expected).sum();
    let total_received: Money = by_source.values().map(|(_, received, _)| *received).sum();

    let mut sources: Vec<IncomeSource> = by_source
        .into_iter()
        .filter(|(_, (expected, received, _))| !expected.is_zero() || !received.is_zero())
        .map(|(source, (expected, received, count))| IncomeSource {
            source: source.to_string(),
            expected,
            received,
            count,
            percentage: percentage(received, total_received),
        })
        .collect();
    sources.sort_by(|a, b| b.received.cmp(&a.received).then_with(|| a.source.cmp(&b.source)));

    let periods = generate_periods(range, granularity)
        .into_iter()
        .map(|period| IncomePeriod {
            received: received_between(incomes, &DateRange::new(period.start, period.end)),
            label: period.label,
            start: period.start,
            end: period.end,
        })
        .collect();

    IncomeAnalysisReport {
        range,
        total_expected,
        total_received,
        variance: total_received - total_expected,
        pending_count,
        sources,
        periods,
    }
}

/// Checking and savings count at face value; credit and loan balances are
/// liabilities regardless of the sign they were recorded with.
pub fn build_net_worth(as_of: NaiveDate, accounts: &[Account]) -> NetWorthReport {
    let balance = |a: &Account| AccountBalance {
        name: a.name.clone(),
        account_type: a.account_type,
        balance: if a.account_type.is_liability() {
            a.balance.abs()
        } else {
            a.balance
        },
    };

    let assets: Vec<AccountBalance> = accounts
        .iter()
        .filter(|a| a.account_type.is_asset())
        .map(balance)
        .collect();
    let liabilities: Vec<AccountBalance> = accounts
        .iter()
        .filter(|a| a.account_type.is_liability())
        .map(balance)
        .collect();

    let total_assets: Money = assets.iter().map(|a| a.balance).sum();
    let total_liabilities: Money = liabilities.iter().map(|a| a.balance).sum();

    NetWorthReport {
        as_of,
        total_assets,
        total_liabilities,
        net_worth: total_assets - total_liabilities,
        assets,
        liabilities,
    }
}

pub fn build_savings_rate(
    range: DateRange,
    granularity: Granularity,
    incomes: &[IncomeEvent],
    expenses: &[Expense],
) -> SavingsRateReport {
    let periods: Vec<SavingsPeriod> = generate_periods(range, granularity)
        .into_iter()
        .map(|period| {
            let bucket = DateRange::new(period.start, period.end);
            let income = received_between(incomes, &bucket);
            let spent = spent_between(expenses, &bucket);
            let savings = income - spent;
            SavingsPeriod {
                label: period.label,
                start: period.start,
                end: period.end,
                income,
                expenses: spent,
                savings,
                savings_rate: percentage(savings, income),
            }
        })
        .collect();

    let total_income: Money = periods.iter().map(|p| p.income).sum();
    let total_expenses: Money = periods.iter().map(|p| p.expenses).sum();
    let savings = total_income - total_expenses;

    SavingsRateReport {
        range,
        total_income,
        total_expenses,
        savings,
        savings_rate: percentage(savings, total_income),
        periods,
    }
}

/// Range that follows `range` for the upcoming payments list.
pub fn upcoming_range(range: &DateRange) -> DateRange {
    let start = range.end + Duration::days(1);
    DateRange::new(start, range.end + Duration::days(UPCOMING_PAYMENT_DAYS))
}

fn payment_summary(payment: &Payment) -> PaymentSummary {
    PaymentSummary {
        id: payment.id,
        payee: payment.payee.clone(),
        amount: payment.amount,
        due_date: payment.due_date,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn build_monthly_summary(
    range: DateRange,
    parameters: &ReportParameters,
    incomes: &[IncomeEvent],
    expenses: &[Expense],
    budgets: &[BudgetAllocation],
    payments_in_range: &[Payment],
    upcoming_payments: &[Payment],
) -> MonthlySummaryReport {
    let income = received_between(incomes, &range);
    let spent = spent_between(expenses, &range);
    let net = income - spent;

    let mut top_categories =
        category_totals(filtered_expenses(expenses, parameters).filter(|e| range.contains(e.date)));
    top_categories.truncate(parameters.top_n());

    let budget_status = build_budget_performance(range, parameters, budgets, expenses).status_counts;

    // overdue as seen on the day after the range
    let as_of = range.end + Duration::days(1);
    let overdue_payments = payments_in_range
        .iter()
        .filter(|p| range.contains(p.due_date) && p.status_on(as_of) == PaymentStatus::Overdue)
        .map(payment_summary)
        .collect();

    let next = upcoming_range(&range);
    let upcoming_payments = upcoming_payments
        .iter()
        .filter(|p| next.contains(p.due_date) && p.state == PaymentStatus::Scheduled)
        .map(payment_summary)
        .collect();

    MonthlySummaryReport {
        range,
        income,
        expenses: spent,
        net,
        savings_rate: percentage(net, income),
        top_categories,
        budget_status,
        overdue_payments,
        upcoming_payments,
    }
}
