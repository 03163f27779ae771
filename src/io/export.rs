use std::io::Write;

use anyhow::Result;

use crate::application::{CashFlowReport, ReportPayload};

/// Write the main table of a report as CSV. Returns the number of data rows.
///
/// Time-series reports export one row per period; the others export their
/// category, line, source or account rows. The annual summary exports the
/// cash-flow table it contains.
pub fn write_report_csv<W: Write>(payload: &ReportPayload, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut count = 0;

    match payload {
        ReportPayload::CashFlow(report) => {
            count += write_cash_flow(&mut csv_writer, report)?;
        }
        ReportPayload::AnnualSummary(summary) => {
            count += write_cash_flow(&mut csv_writer, &summary.cash_flow)?;
        }
        ReportPayload::SpendingAnalysis(report) => {
            csv_writer.write_record(["category", "total", "count", "percentage"])?;
            for c in &report.categories {
                csv_writer.write_record([
                    c.category.clone(),
                    c.total.to_string(),
                    c.count.to_string(),
                    c.percentage.to_string(),
                ])?;
                count += 1;
            }
        }
        ReportPayload::MonthlySummary(report) => {
            csv_writer.write_record(["category", "total", "count", "percentage"])?;
            for c in &report.top_categories {
                csv_writer.write_record([
                    c.category.clone(),
                    c.total.to_string(),
                    c.count.to_string(),
                    c.percentage.to_string(),
                ])?;
                count += 1;
            }
        }
        ReportPayload::BudgetPerformance(report) => {
            csv_writer.write_record(["category", "budgeted", "spent", "remaining", "percent_used", "status"])?;
            for line in &report.lines {
                csv_writer.write_record([
                    line.category.clone(),
                    line.budgeted.to_string(),
                    line.spent.to_string(),
                    line.remaining.to_string(),
                    line.percent_used.to_string(),
                    line.status.to_string(),
                ])?;
                count += 1;
            }
        }
        ReportPayload::IncomeAnalysis(report) => {
            csv_writer.write_record(["source", "expected", "received", "count", "percentage"])?;
            for s in &report.sources {
                csv_writer.write_record([
                    s.source.clone(),
                    s.expected.to_string(),
                    s.received.to_string(),
                    s.count.to_string(),
                    s.percentage.to_string(),
                ])?;
                count += 1;
            }
        }
        ReportPayload::NetWorth(report) => {
            csv_writer.write_record(["account", "type", "side", "balance"])?;
            let sides = [("asset", &report.assets), ("liability", &report.liabilities)];
            for (side, accounts) in sides {
                for a in accounts {
                    csv_writer.write_record([
                        a.name.clone(),
                        a.account_type.to_string(),
                        side.to_string(),
                        a.balance.to_string(),
                    ])?;
                    count += 1;
                }
            }
        }
        ReportPayload::SavingsRate(report) => {
            csv_writer.write_record(["period", "start", "end", "income", "expenses", "savings", "savings_rate"])?;
            for p in &report.periods {
                csv_writer.write_record([
                    p.label.clone(),
                    p.start.to_string(),
                    p.end.to_string(),
                    p.income.to_string(),
                    p.expenses.to_string(),
                    p.savings.to_string(),
                    p.savings_rate.to_string(),
                ])?;
                count += 1;
            }
        }
    }

    csv_writer.flush()?;
    Ok(count)
}

fn write_cash_flow<W: Write>(csv_writer: &mut csv::Writer<W>, report: &CashFlowReport) -> Result<usize> {
    csv_writer.write_record(["period", "start", "end", "income", "expenses", "net"])?;
    for p in &report.periods {
        csv_writer.write_record([
            p.label.clone(),
            p.start.to_string(),
            p.end.to_string(),
            p.income.to_string(),
            p.expenses.to_string(),
            p.net.to_string(),
        ])?;
    }
    Ok(report.periods.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{AccountBalance, NetWorthReport};
    use crate::domain::AccountType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_net_worth_csv() {
        let report = NetWorthReport {
            as_of: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            total_assets: dec!(100),
            total_liabilities: dec!(40),
            net_worth: dec!(60),
            assets: vec![AccountBalance {
                name: "Checking".into(),
                account_type: AccountType::Checking,
                balance: dec!(100),
            }],
            liabilities: vec![AccountBalance {
                name: "Visa".into(),
                account_type: AccountType::Credit,
                balance: dec!(40),
            }],
        };

        let mut out = Vec::new();
        let rows = write_report_csv(&ReportPayload::NetWorth(report), &mut out).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "account,type,side,balance");
        assert_eq!(lines[2], "Visa,credit,liability,40");
    }
}
