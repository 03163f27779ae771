mod common;

use anyhow::Result;
use common::{create_family, money, parse_date, test_service};
use hearth::application::{AppError, HouseholdService, ReportPayload};
use hearth::domain::{
    AccountType, BudgetHealth, DateRange, FamilyId, Frequency, Granularity, PaymentType,
    ReportParameters, ReportType,
};
use hearth::io::export::write_report_csv;

fn range(start: &str, end: &str) -> DateRange {
    DateRange::new(parse_date(start), parse_date(end))
}

async fn receive(
    service: &HouseholdService,
    family: FamilyId,
    source: &str,
    amount: &str,
    date: &str,
) -> Result<()> {
    let income = service
        .add_income(
            family,
            source.into(),
            money(amount),
            parse_date(date),
            Frequency::OneTime,
        )
        .await?;
    service
        .receive_income(income.id, parse_date(date), money(amount))
        .await?;
    Ok(())
}

async fn spend(
    service: &HouseholdService,
    family: FamilyId,
    amount: &str,
    category: &str,
    date: &str,
    merchant: Option<&str>,
) -> Result<()> {
    service
        .record_expense(
            family,
            parse_date(date),
            money(amount),
            category.into(),
            merchant.map(String::from),
            None,
        )
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_budget_performance_way_over_budget() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    service
        .set_budget(
            family,
            "Groceries".into(),
            money("100"),
            parse_date("2024-01-01"),
            parse_date("2024-01-31"),
        )
        .await?;
    service
        .set_budget(
            family,
            "Dining".into(),
            money("200"),
            parse_date("2024-01-01"),
            parse_date("2024-01-31"),
        )
        .await?;
    spend(&service, family, "80", "Groceries", "2024-01-05", Some("Market")).await?;
    spend(&service, family, "50", "Groceries", "2024-01-20", Some("Market")).await?;
    spend(&service, family, "40", "Dining", "2024-01-12", None).await?;
    spend(&service, family, "25", "Hobbies", "2024-01-15", None).await?;

    let payload = service
        .generate_report(
            ReportType::BudgetPerformance,
            family,
            range("2024-01-01", "2024-01-31"),
            &ReportParameters::default(),
        )
        .await?;
    let ReportPayload::BudgetPerformance(report) = payload else {
        panic!("expected budget performance report");
    };

    assert_eq!(report.lines.len(), 2);
    let groceries = report
        .lines
        .iter()
        .find(|l| l.category == "Groceries")
        .unwrap();
    assert_eq!(groceries.spent, money("130"));
    assert_eq!(groceries.remaining, money("-30"));
    assert_eq!(groceries.percent_used, money("130"));
    assert_eq!(groceries.status, BudgetHealth::WayOverBudget);

    let dining = report.lines.iter().find(|l| l.category == "Dining").unwrap();
    assert_eq!(dining.status, BudgetHealth::UnderBudget);

    assert_eq!(report.total_budgeted, money("300"));
    assert_eq!(report.total_spent, money("170"));
    assert_eq!(report.unbudgeted_spending, money("25"));
    assert_eq!(report.status_counts.way_over_budget, 1);
    assert_eq!(report.status_counts.under_budget, 1);

    Ok(())
}

#[tokio::test]
async fn test_cash_flow_monthly_buckets() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    receive(&service, family, "Salary", "3000", "2024-01-25").await?;
    receive(&service, family, "Salary", "3000", "2024-02-25").await?;
    spend(&service, family, "1200", "Rent", "2024-01-01", None).await?;
    spend(&service, family, "1200", "Rent", "2024-02-01", None).await?;
    spend(&service, family, "300", "Groceries", "2024-03-10", None).await?;
    // outside the range
    spend(&service, family, "999", "Travel", "2024-03-20", None).await?;

    let payload = service
        .generate_report(
            ReportType::CashFlow,
            family,
            range("2024-01-01", "2024-03-15"),
            &ReportParameters::default(),
        )
        .await?;
    let ReportPayload::CashFlow(report) = payload else {
        panic!("expected cash flow report");
    };

    assert_eq!(report.granularity, Granularity::Month);
    assert_eq!(report.periods.len(), 3);
    assert_eq!(report.periods[0].label, "2024-01");
    assert_eq!(report.periods[0].net, money("1800"));
    assert_eq!(report.periods[1].income, money("3000"));
    // the last bucket is clipped to the range
    assert_eq!(report.periods[2].end, parse_date("2024-03-15"));
    assert_eq!(report.periods[2].expenses, money("300"));
    assert_eq!(report.total_income, money("6000"));
    assert_eq!(report.total_expenses, money("2700"));
    assert_eq!(report.net, money("3300"));

    Ok(())
}

#[tokio::test]
async fn test_cash_flow_ignores_unreceived_and_other_families() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let neighbours = service.create_family("Neighbours".into()).await?.id;

    service
        .add_income(
            family,
            "Expected".into(),
            money("500"),
            parse_date("2024-01-10"),
            Frequency::OneTime,
        )
        .await?;
    receive(&service, neighbours, "Salary", "4000", "2024-01-10").await?;
    spend(&service, neighbours, "100", "Rent", "2024-01-10", None).await?;

    let payload = service
        .generate_report(
            ReportType::CashFlow,
            family,
            range("2024-01-01", "2024-01-31"),
            &ReportParameters::default(),
        )
        .await?;
    let ReportPayload::CashFlow(report) = payload else {
        panic!("expected cash flow report");
    };
    assert_eq!(report.total_income, money("0"));
    assert_eq!(report.total_expenses, money("0"));

    Ok(())
}

#[tokio::test]
async fn test_spending_analysis_top_categories() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    spend(&service, family, "300", "Rent", "2024-04-01", None).await?;
    spend(&service, family, "60", "Groceries", "2024-04-03", Some("Market")).await?;
    spend(&service, family, "40", "Groceries", "2024-04-10", Some("Bakery")).await?;
    spend(&service, family, "50", "Fun", "2024-04-12", Some("Cinema")).await?;
    spend(&service, family, "50", "Books", "2024-04-20", Some("Market")).await?;

    let parameters = ReportParameters {
        top_n: Some(2),
        ..Default::default()
    };
    let payload = service
        .generate_report(
            ReportType::SpendingAnalysis,
            family,
            range("2024-04-01", "2024-04-30"),
            &parameters,
        )
        .await?;
    let ReportPayload::SpendingAnalysis(report) = payload else {
        panic!("expected spending analysis report");
    };

    assert_eq!(report.total, money("500"));
    let names: Vec<&str> = report.categories.iter().map(|c| c.category.as_str()).collect();
    assert_eq!(names, vec!["Rent", "Groceries"]);
    assert_eq!(report.categories[0].percentage, money("60"));
    assert_eq!(report.categories[1].count, 2);
    assert_eq!(report.other, money("100"));
    assert_eq!(report.top_merchants[0].merchant, "Market");
    assert_eq!(report.top_merchants[0].total, money("110"));

    Ok(())
}

#[tokio::test]
async fn test_net_worth_treats_credit_as_liability() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    service
        .set_account_balance(family, "Checking".into(), AccountType::Checking, money("2500"))
        .await?;
    service
        .set_account_balance(family, "Savings".into(), AccountType::Savings, money("4000"))
        .await?;
    service
        .set_account_balance(family, "Visa".into(), AccountType::Credit, money("-800"))
        .await?;
    service
        .set_account_balance(family, "Car loan".into(), AccountType::Loan, money("1000"))
        .await?;
    // updating a balance keeps one account per name
    service
        .set_account_balance(family, "Checking".into(), AccountType::Checking, money("1500"))
        .await?;
    assert_eq!(service.list_accounts(family).await?.len(), 4);

    let payload = service
        .generate_report(
            ReportType::NetWorth,
            family,
            range("2024-05-01", "2024-05-31"),
            &ReportParameters::default(),
        )
        .await?;
    let ReportPayload::NetWorth(report) = payload else {
        panic!("expected net worth report");
    };

    assert_eq!(report.as_of, parse_date("2024-05-31"));
    assert_eq!(report.total_assets, money("5500"));
    assert_eq!(report.total_liabilities, money("1800"));
    assert_eq!(report.net_worth, money("3700"));
    assert_eq!(report.assets.len(), 2);
    assert_eq!(report.liabilities.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_savings_rate_and_income_analysis() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    receive(&service, family, "Salary", "4000", "2024-06-28").await?;
    service
        .add_income(
            family,
            "Freelance".into(),
            money("600"),
            parse_date("2024-06-15"),
            Frequency::OneTime,
        )
        .await?;
    spend(&service, family, "3000", "Living", "2024-06-10", None).await?;

    let june = range("2024-06-01", "2024-06-30");
    let payload = service
        .generate_report(ReportType::SavingsRate, family, june, &ReportParameters::default())
        .await?;
    let ReportPayload::SavingsRate(savings) = payload else {
        panic!("expected savings rate report");
    };
    assert_eq!(savings.savings, money("1000"));
    assert_eq!(savings.savings_rate, money("25"));

    let payload = service
        .generate_report(ReportType::IncomeAnalysis, family, june, &ReportParameters::default())
        .await?;
    let ReportPayload::IncomeAnalysis(income) = payload else {
        panic!("expected income analysis report");
    };
    assert_eq!(income.total_expected, money("4600"));
    assert_eq!(income.total_received, money("4000"));
    assert_eq!(income.variance, money("-600"));
    assert_eq!(income.pending_count, 1);
    assert_eq!(income.sources[0].source, "Salary");
    assert_eq!(income.sources[0].percentage, money("100"));

    Ok(())
}

#[tokio::test]
async fn test_monthly_summary_lists_overdue_and_upcoming_payments() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    receive(&service, family, "Salary", "2000", "2024-03-01").await?;
    spend(&service, family, "500", "Groceries", "2024-03-05", None).await?;

    let unpaid = service
        .add_payment(
            family,
            "Dentist".into(),
            money("120"),
            parse_date("2024-03-20"),
            PaymentType::Once,
            Frequency::OneTime,
            None,
        )
        .await?;
    let paid = service
        .add_payment(
            family,
            "Phone".into(),
            money("30"),
            parse_date("2024-03-15"),
            PaymentType::Once,
            Frequency::OneTime,
            None,
        )
        .await?;
    service.pay_payment(paid.id, parse_date("2024-03-15"), None).await?;
    let upcoming = service
        .add_payment(
            family,
            "Insurance".into(),
            money("90"),
            parse_date("2024-04-10"),
            PaymentType::Once,
            Frequency::OneTime,
            None,
        )
        .await?;

    let payload = service
        .generate_report(
            ReportType::MonthlySummary,
            family,
            range("2024-03-01", "2024-03-31"),
            &ReportParameters::default(),
        )
        .await?;
    let ReportPayload::MonthlySummary(summary) = payload else {
        panic!("expected monthly summary");
    };

    assert_eq!(summary.income, money("2000"));
    assert_eq!(summary.expenses, money("500"));
    assert_eq!(summary.net, money("1500"));
    assert_eq!(summary.savings_rate, money("75"));
    assert_eq!(summary.top_categories.len(), 1);

    let overdue: Vec<_> = summary.overdue_payments.iter().map(|p| p.id).collect();
    assert_eq!(overdue, vec![unpaid.id]);
    let next: Vec<_> = summary.upcoming_payments.iter().map(|p| p.id).collect();
    assert_eq!(next, vec![upcoming.id]);

    Ok(())
}

#[tokio::test]
async fn test_annual_summary_combines_reports() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    receive(&service, family, "Salary", "3000", "2024-01-31").await?;
    receive(&service, family, "Salary", "3000", "2024-07-31").await?;
    spend(&service, family, "1000", "Rent", "2024-02-01", None).await?;
    spend(&service, family, "1000", "Rent", "2024-08-01", None).await?;

    let parameters = ReportParameters {
        granularity: Some(Granularity::Quarter),
        ..Default::default()
    };
    let payload = service
        .generate_report(
            ReportType::AnnualSummary,
            family,
            range("2024-01-01", "2024-12-31"),
            &parameters,
        )
        .await?;
    assert_eq!(payload.report_type(), ReportType::AnnualSummary);
    let ReportPayload::AnnualSummary(summary) = &payload else {
        panic!("expected annual summary");
    };

    assert_eq!(summary.cash_flow.periods.len(), 4);
    assert_eq!(summary.cash_flow.net, money("4000"));
    assert_eq!(summary.spending.total, money("2000"));
    assert_eq!(summary.income.total_received, money("6000"));
    assert_eq!(summary.savings.periods.len(), 4);

    let json = serde_json::to_value(&payload)?;
    assert_eq!(json["report_type"], "annual_summary");

    let mut out = Vec::new();
    let rows = write_report_csv(&payload, &mut out)?;
    assert_eq!(rows, 4);

    Ok(())
}

#[tokio::test]
async fn test_report_for_unknown_family() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .generate_report(
            ReportType::CashFlow,
            uuid::Uuid::new_v4(),
            range("2024-01-01", "2024-01-31"),
            &ReportParameters::default(),
        )
        .await;
    assert!(matches!(result, Err(AppError::FamilyNotFound(_))));

    Ok(())
}
