use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{
    ExecutorConfig, HouseholdService, NewSchedule, OutboxDelivery, ReportPayload,
    DEFAULT_MATCH_WINDOW_DAYS,
};
use crate::domain::{
    first_of_month, format_amount, parse_amount, AccountType, DateRange, FamilyId, Frequency,
    Granularity, PaymentType, ReportParameters, ReportType, ScheduleFrequency,
};
use crate::io::export::write_report_csv;

/// Hearth - household finance planning
#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Plan household income and bills, earmark income for payments, and schedule reports")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "HEARTH_DATABASE", default_value = "hearth.db")]
    pub database: String,

    /// Family the command applies to
    #[arg(short, long, global = true, env = "HEARTH_FAMILY")]
    pub family: Option<String>,

    /// Directory scheduled reports are delivered into
    #[arg(long, global = true, env = "HEARTH_OUTBOX", default_value = "outbox")]
    pub outbox: String,

    /// Minutes after which a claim on a running schedule is considered stale
    #[arg(long, global = true, env = "HEARTH_CLAIM_TIMEOUT_MINUTES", default_value = "30")]
    pub claim_timeout_minutes: i64,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Family management commands
    #[command(subcommand)]
    Family(FamilyCommands),

    /// Expected and received income
    #[command(subcommand)]
    Income(IncomeCommands),

    /// Bills and other payments
    #[command(subcommand)]
    Payment(PaymentCommands),

    /// Earmark income for payments
    #[command(subcommand)]
    Attribute(AttributeCommands),

    /// Record spending
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Category budgets
    #[command(subcommand)]
    Budget(BudgetCommands),

    /// Account balances
    #[command(subcommand)]
    Account(AccountCommands),

    /// Generate a report on demand
    Report {
        /// Report kind: cash-flow, spending-analysis, budget-performance,
        /// income-analysis, net-worth, savings-rate, monthly-summary, annual-summary
        kind: String,

        /// Start date (YYYY-MM-DD, defaults to start of current month)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,

        /// Bucket size: day, week, month, quarter, year
        #[arg(long)]
        granularity: Option<String>,

        /// Number of top categories to show
        #[arg(long)]
        top: Option<usize>,

        /// Comma-separated list of categories to include
        #[arg(long)]
        categories: Option<String>,

        /// Output format: json, csv
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Scheduled report commands
    #[command(subcommand)]
    Schedule(ScheduleCommands),
}

#[derive(Subcommand)]
pub enum FamilyCommands {
    /// Create a family and print its ID
    Create {
        /// Family name
        name: String,
    },

    /// Delete a family and all of its data
    Delete {
        /// Family ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum IncomeCommands {
    /// Add an expected income
    Add {
        /// Where the money comes from (e.g., "Salary")
        source: String,

        /// Expected amount (e.g., "3000" or "3000.00")
        amount: String,

        /// Scheduled date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Frequency: one-time, weekly, biweekly, monthly, quarterly, annual
        #[arg(long, default_value = "one-time")]
        frequency: String,
    },

    /// Mark an income as received
    Receive {
        /// Income event ID
        id: String,

        /// Date received (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Amount received (defaults to the expected amount)
        #[arg(long)]
        amount: Option<String>,
    },

    /// Cancel an expected income
    Cancel {
        /// Income event ID
        id: String,
    },

    /// List income events
    List,
}

#[derive(Subcommand)]
pub enum PaymentCommands {
    /// Add a payment
    Add {
        /// Who gets paid
        payee: String,

        /// Amount due
        amount: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: String,

        /// Payment type: once, recurring, variable
        #[arg(short = 't', long = "type", default_value = "once")]
        payment_type: String,

        /// Frequency for recurring payments
        #[arg(long, default_value = "monthly")]
        frequency: String,

        /// Spending category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Mark a payment as paid
    Pay {
        /// Payment ID
        id: String,

        /// Date paid (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Amount paid (defaults to the amount due)
        #[arg(long)]
        amount: Option<String>,
    },

    /// Show a payment with its attributions
    Show {
        /// Payment ID
        id: String,
    },

    /// List payments
    List,
}

#[derive(Subcommand)]
pub enum AttributeCommands {
    /// Earmark part of an income for a payment
    Add {
        /// Payment ID
        payment: String,

        /// Income event ID
        income: String,

        /// Amount to earmark
        amount: String,
    },

    /// Remove an attribution
    Remove {
        /// Attribution ID
        id: String,
    },

    /// Spread an income over several payments by weight
    Split {
        /// Income event ID
        income: String,

        /// Payment and weight as PAYMENT_ID:WEIGHT (repeatable)
        #[arg(short, long = "to", required = true)]
        targets: Vec<String>,

        /// Amount to spread (defaults to what the income has left)
        #[arg(short, long)]
        amount: Option<String>,
    },

    /// Fund a payment from the best matching received income
    Auto {
        /// Payment ID
        payment: String,

        /// Maximum days between due date and income date
        #[arg(long, default_value_t = DEFAULT_MATCH_WINDOW_DAYS)]
        window: i64,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense
    Add {
        /// Amount spent
        amount: String,

        /// Spending category
        #[arg(short, long)]
        category: String,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Merchant
        #[arg(short, long)]
        merchant: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Budget an amount for a category over a period
    Add {
        /// Category to track
        category: String,

        /// Budget amount (e.g., "400" or "400.00")
        amount: String,

        /// First day of the period (YYYY-MM-DD, defaults to start of current month)
        #[arg(long)]
        from: Option<String>,

        /// Last day of the period (YYYY-MM-DD, defaults to end of that month)
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Set an account's current balance, creating the account if needed
    Set {
        /// Account name
        name: String,

        /// Current balance
        balance: String,

        /// Account type: checking, savings, credit, loan
        #[arg(short = 't', long = "type", default_value = "checking")]
        account_type: String,
    },
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Create a scheduled report
    Create {
        /// Schedule name (unique per family)
        name: String,

        /// Report kind (see `hearth report --help`)
        #[arg(short = 't', long = "type")]
        report_type: String,

        /// Frequency: weekly, monthly, quarterly, annual
        #[arg(long, default_value = "monthly")]
        frequency: String,

        /// Weekday (0 = Sunday) for weekly schedules, day of month otherwise
        #[arg(long)]
        day: Option<u32>,

        /// Local hour of delivery (0-23)
        #[arg(long, default_value = "9")]
        hour: u32,

        /// IANA timezone name
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Recipient address (repeatable)
        #[arg(short, long = "recipient")]
        recipients: Vec<String>,

        /// Bucket size for time-series reports
        #[arg(long)]
        granularity: Option<String>,
    },

    /// List the family's scheduled reports
    List,

    /// Show a scheduled report and its last run
    Show {
        /// Schedule ID
        id: String,
    },

    /// Pause a scheduled report
    Pause {
        /// Schedule ID
        id: String,
    },

    /// Reactivate a paused or failed scheduled report
    Resume {
        /// Schedule ID
        id: String,
    },

    /// Delete a scheduled report
    Delete {
        /// Schedule ID
        id: String,
    },

    /// Run one scheduled report now
    Run {
        /// Schedule ID
        id: String,
    },

    /// Run every scheduled report that is due
    RunDue,

    /// Show past executions
    History {
        /// Schedule ID
        id: String,

        /// Maximum number of executions to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
}

impl Cli {
    fn family_id(&self) -> Result<FamilyId> {
        let raw = self
            .family
            .as_deref()
            .context("No family selected. Pass --family or set HEARTH_FAMILY")?;
        parse_id(raw)
    }

    fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            claim_timeout: Duration::minutes(self.claim_timeout_minutes),
        }
    }

    pub async fn run(self) -> Result<()> {
        if matches!(self.command, Commands::Init) {
            HouseholdService::init(&self.database).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let service = HouseholdService::connect(&self.database).await?;
        match &self.command {
            Commands::Init => {}
            Commands::Family(cmd) => run_family_command(&service, cmd).await?,
            Commands::Income(cmd) => run_income_command(&service, self.family_id()?, cmd).await?,
            Commands::Payment(cmd) => run_payment_command(&service, self.family_id()?, cmd).await?,
            Commands::Attribute(cmd) => run_attribute_command(&service, cmd).await?,
            Commands::Expense(ExpenseCommands::Add {
                amount,
                category,
                date,
                merchant,
                description,
            }) => {
                let expense = service
                    .record_expense(
                        self.family_id()?,
                        parse_date_or_today(date.as_deref())?,
                        parse_money(amount)?,
                        category.clone(),
                        merchant.clone(),
                        description.clone(),
                    )
                    .await?;
                println!(
                    "Recorded expense: {} {} on {}",
                    format_amount(expense.amount),
                    expense.category,
                    expense.date
                );
            }
            Commands::Budget(BudgetCommands::Add {
                category,
                amount,
                from,
                to,
            }) => {
                let start = match from {
                    Some(d) => parse_date(d)?,
                    None => first_of_month(today()),
                };
                let end = match to {
                    Some(d) => parse_date(d)?,
                    None => end_of_month(start),
                };
                let budget = service
                    .set_budget(self.family_id()?, category.clone(), parse_money(amount)?, start, end)
                    .await?;
                println!(
                    "Budgeted {} for {} ({} to {})",
                    format_amount(budget.amount),
                    budget.category,
                    budget.period_start,
                    budget.period_end
                );
            }
            Commands::Account(AccountCommands::Set {
                name,
                balance,
                account_type,
            }) => {
                let account_type = AccountType::from_str(account_type).with_context(|| {
                    format!("Invalid account type '{}'. Use checking, savings, credit or loan", account_type)
                })?;
                let account = service
                    .set_account_balance(self.family_id()?, name.clone(), account_type, parse_money(balance)?)
                    .await?;
                println!(
                    "{} ({}): {}",
                    account.name,
                    account.account_type,
                    format_amount(account.balance)
                );
            }
            Commands::Report {
                kind,
                from,
                to,
                granularity,
                top,
                categories,
                format,
            } => {
                let report_type = parse_report_type(kind)?;
                let range = parse_date_range(from.as_deref(), to.as_deref())?;
                let parameters = ReportParameters {
                    granularity: granularity.as_deref().map(parse_granularity).transpose()?,
                    top_n: *top,
                    categories: categories.as_ref().map(|c| {
                        c.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    }),
                };
                let payload = service
                    .generate_report(report_type, self.family_id()?, range, &parameters)
                    .await?;
                print_report(&payload, format)?;
            }
            Commands::Schedule(cmd) => self.run_schedule_command(&service, cmd).await?,
        }

        Ok(())
    }

    async fn run_schedule_command(&self, service: &HouseholdService, cmd: &ScheduleCommands) -> Result<()> {
        let now = Utc::now();
        match cmd {
            ScheduleCommands::Create {
                name,
                report_type,
                frequency,
                day,
                hour,
                timezone,
                recipients,
                granularity,
            } => {
                let request = NewSchedule {
                    family_id: self.family_id()?,
                    name: name.clone(),
                    report_type: parse_report_type(report_type)?,
                    frequency: ScheduleFrequency::from_str(frequency).with_context(|| {
                        format!("Invalid frequency '{}'. Use weekly, monthly, quarterly or annual", frequency)
                    })?,
                    delivery_day: *day,
                    delivery_hour: *hour,
                    timezone: timezone.clone(),
                    recipients: recipients.clone(),
                    parameters: ReportParameters {
                        granularity: granularity.as_deref().map(parse_granularity).transpose()?,
                        ..Default::default()
                    },
                };
                let schedule = service.create_schedule(request, now).await?;
                println!("Created scheduled report: {} ({})", schedule.name, schedule.id);
                println!(
                    "  Next run: {} ({})",
                    schedule.next_execution.format("%Y-%m-%d %H:%M UTC"),
                    schedule.timezone
                );
            }

            ScheduleCommands::List => {
                let schedules = service.list_schedules(self.family_id()?).await?;
                if schedules.is_empty() {
                    println!("No scheduled reports found.");
                    return Ok(());
                }
                println!(
                    "{:<36} {:<20} {:<20} {:<10} {:<8} {:<17}",
                    "ID", "NAME", "TYPE", "FREQUENCY", "STATUS", "NEXT RUN (UTC)"
                );
                println!("{}", "-".repeat(116));
                for overview in &schedules {
                    let s = &overview.schedule;
                    println!(
                        "{:<36} {:<20} {:<20} {:<10} {:<8} {:<17}",
                        s.id,
                        truncate(&s.name, 20),
                        s.report_type,
                        s.frequency,
                        s.status,
                        s.next_execution.format("%Y-%m-%d %H:%M")
                    );
                    if let Some(error) = overview.last_error() {
                        println!("    last error: {}", error);
                    }
                }
            }

            ScheduleCommands::Show { id } => {
                let schedule = service.get_schedule(parse_id(id)?).await?;
                println!("Scheduled report: {}", schedule.name);
                println!("  ID:          {}", schedule.id);
                println!("  Type:        {}", schedule.report_type);
                println!("  Frequency:   {}", schedule.frequency);
                println!("  Status:      {}", schedule.status);
                println!("  Timezone:    {}", schedule.timezone);
                println!("  Recipients:  {}", schedule.recipients.join(", "));
                println!("  Next run:    {}", schedule.next_execution.format("%Y-%m-%d %H:%M UTC"));
                if let Some(last) = schedule.last_execution {
                    println!("  Last run:    {}", last.format("%Y-%m-%d %H:%M UTC"));
                }
                if let Some(run) = service.schedule_history(schedule.id, 1).await?.first() {
                    println!("  Last status: {} (delivery {})", run.status, run.delivery_status);
                    if let Some(error) = run.error.as_deref().or(run.delivery_error.as_deref()) {
                        println!("  Last error:  {}", error);
                    }
                }
            }

            ScheduleCommands::Pause { id } => {
                let schedule = service.pause_schedule(parse_id(id)?, now).await?;
                println!("Paused scheduled report: {}", schedule.name);
            }

            ScheduleCommands::Resume { id } => {
                let schedule = service.resume_schedule(parse_id(id)?, now).await?;
                println!(
                    "Resumed scheduled report: {} (next run {})",
                    schedule.name,
                    schedule.next_execution.format("%Y-%m-%d %H:%M UTC")
                );
            }

            ScheduleCommands::Delete { id } => {
                service.delete_schedule(parse_id(id)?).await?;
                println!("Deleted scheduled report: {}", id);
            }

            ScheduleCommands::Run { id } => {
                let executor = service.executor(
                    Arc::new(OutboxDelivery::new(&self.outbox)),
                    self.executor_config(),
                );
                match executor.run_now(parse_id(id)?, now).await? {
                    Some(outcome) => {
                        println!(
                            "{}: {} (delivery {})",
                            outcome.schedule_name, outcome.status, outcome.delivery_status
                        );
                        if let Some(error) = outcome.error {
                            println!("  error: {}", error);
                        }
                    }
                    None => println!("Scheduled report is busy or completed; nothing run."),
                }
            }

            ScheduleCommands::RunDue => {
                let executor = service.executor(
                    Arc::new(OutboxDelivery::new(&self.outbox)),
                    self.executor_config(),
                );
                let summary = executor.run_due(now).await?;
                if summary.executed.is_empty() {
                    println!("No scheduled reports due.");
                    return Ok(());
                }
                for outcome in &summary.executed {
                    println!(
                        "{}: {} (delivery {})",
                        outcome.schedule_name, outcome.status, outcome.delivery_status
                    );
                    if let Some(error) = &outcome.error {
                        println!("  error: {}", error);
                    }
                }
                println!(
                    "\n{} completed, {} failed, {} skipped",
                    summary.completed(),
                    summary.failed(),
                    summary.skipped
                );
            }

            ScheduleCommands::History { id, limit } => {
                let executions = service.schedule_history(parse_id(id)?, *limit).await?;
                if executions.is_empty() {
                    println!("No executions yet.");
                    return Ok(());
                }
                println!(
                    "{:<17} {:<23} {:<10} {:<8} {}",
                    "STARTED (UTC)", "PERIOD", "STATUS", "DELIVERY", "ERROR"
                );
                println!("{}", "-".repeat(80));
                for e in &executions {
                    println!(
                        "{:<17} {:<23} {:<10} {:<8} {}",
                        e.started_at.format("%Y-%m-%d %H:%M"),
                        format!("{}..{}", e.period_start, e.period_end),
                        e.status,
                        e.delivery_status,
                        e.error.as_deref().or(e.delivery_error.as_deref()).unwrap_or("")
                    );
                }
            }
        }
        Ok(())
    }
}

async fn run_family_command(service: &HouseholdService, cmd: &FamilyCommands) -> Result<()> {
    match cmd {
        FamilyCommands::Create { name } => {
            let family = service.create_family(name.clone()).await?;
            println!("Created family: {} ({})", family.name, family.id);
            println!("  export HEARTH_FAMILY={}", family.id);
        }
        FamilyCommands::Delete { id } => {
            service.delete_family(parse_id(id)?).await?;
            println!("Deleted family: {}", id);
        }
    }
    Ok(())
}

async fn run_income_command(
    service: &HouseholdService,
    family_id: FamilyId,
    cmd: &IncomeCommands,
) -> Result<()> {
    match cmd {
        IncomeCommands::Add {
            source,
            amount,
            date,
            frequency,
        } => {
            let event = service
                .add_income(
                    family_id,
                    source.clone(),
                    parse_money(amount)?,
                    parse_date(date)?,
                    parse_frequency(frequency)?,
                )
                .await?;
            println!("Added income: {} {} on {} ({})", event.source, format_amount(event.amount), event.scheduled_date, event.id);
        }

        IncomeCommands::Receive { id, date, amount } => {
            let id = parse_id(id)?;
            let expected = service.get_income(id).await?.amount;
            let amount = match amount {
                Some(a) => parse_money(a)?,
                None => expected,
            };
            let receipt = service
                .receive_income(id, parse_date_or_today(date.as_deref())?, amount)
                .await?;
            println!("Received {} from {}", format_amount(amount), receipt.event.source);
            if let Some(next) = receipt.next {
                println!("  Next expected on {} ({})", next.scheduled_date, next.id);
            }
        }

        IncomeCommands::Cancel { id } => {
            let event = service.cancel_income(parse_id(id)?).await?;
            println!("Cancelled income: {} on {}", event.source, event.scheduled_date);
        }

        IncomeCommands::List => {
            let events = service.list_income(family_id).await?;
            if events.is_empty() {
                println!("No income events found.");
                return Ok(());
            }
            println!(
                "{:<36} {:<20} {:>12} {:<10} {:<10} {:<10}",
                "ID", "SOURCE", "AMOUNT", "DATE", "FREQUENCY", "STATUS"
            );
            println!("{}", "-".repeat(103));
            for e in &events {
                println!(
                    "{:<36} {:<20} {:>12} {:<10} {:<10} {:<10}",
                    e.id,
                    truncate(&e.source, 20),
                    format_amount(e.actual_amount.unwrap_or(e.amount)),
                    e.effective_date(),
                    e.frequency,
                    e.status
                );
            }
        }
    }
    Ok(())
}

async fn run_payment_command(
    service: &HouseholdService,
    family_id: FamilyId,
    cmd: &PaymentCommands,
) -> Result<()> {
    match cmd {
        PaymentCommands::Add {
            payee,
            amount,
            due,
            payment_type,
            frequency,
            category,
        } => {
            let payment_type = PaymentType::from_str(payment_type).with_context(|| {
                format!("Invalid payment type '{}'. Use once, recurring or variable", payment_type)
            })?;
            let payment = service
                .add_payment(
                    family_id,
                    payee.clone(),
                    parse_money(amount)?,
                    parse_date(due)?,
                    payment_type,
                    parse_frequency(frequency)?,
                    category.clone(),
                )
                .await?;
            println!(
                "Added payment: {} {} due {} ({})",
                payment.payee,
                format_amount(payment.amount),
                payment.due_date,
                payment.id
            );
        }

        PaymentCommands::Pay { id, date, amount } => {
            let amount = amount.as_deref().map(parse_money).transpose()?;
            let receipt = service
                .pay_payment(parse_id(id)?, parse_date_or_today(date.as_deref())?, amount)
                .await?;
            println!(
                "Paid {} to {}",
                format_amount(receipt.payment.paid_amount.unwrap_or(receipt.payment.amount)),
                receipt.payment.payee
            );
            if let Some(next) = receipt.next {
                println!("  Next due on {} ({})", next.due_date, next.id);
            }
        }

        PaymentCommands::Show { id } => {
            let details = service.get_payment_details(parse_id(id)?, today()).await?;
            let p = &details.payment;
            println!("Payment: {}", p.payee);
            println!("  ID:          {}", p.id);
            println!("  Amount:      {}", format_amount(p.amount));
            println!("  Due:         {}", p.due_date);
            println!("  Type:        {} ({})", p.payment_type, p.frequency);
            println!("  Status:      {}", details.status);
            if let Some(category) = &p.category {
                println!("  Category:    {}", category);
            }
            println!("  Attributed:  {}", format_amount(details.attributed));
            println!("  Remaining:   {}", format_amount(details.remaining));
            for a in &details.attributions {
                println!(
                    "    {} {} from income {} ({})",
                    a.id,
                    format_amount(a.amount),
                    a.income_event_id,
                    a.attribution_type
                );
            }
        }

        PaymentCommands::List => {
            let payments = service.list_payments(family_id, today()).await?;
            if payments.is_empty() {
                println!("No payments found.");
                return Ok(());
            }
            println!(
                "{:<36} {:<20} {:>12} {:<10} {:<9} {:>12}",
                "ID", "PAYEE", "AMOUNT", "DUE", "STATUS", "REMAINING"
            );
            println!("{}", "-".repeat(104));
            for d in &payments {
                println!(
                    "{:<36} {:<20} {:>12} {:<10} {:<9} {:>12}",
                    d.payment.id,
                    truncate(&d.payment.payee, 20),
                    format_amount(d.payment.amount),
                    d.payment.due_date,
                    d.status,
                    format_amount(d.remaining)
                );
            }
        }
    }
    Ok(())
}

async fn run_attribute_command(service: &HouseholdService, cmd: &AttributeCommands) -> Result<()> {
    match cmd {
        AttributeCommands::Add {
            payment,
            income,
            amount,
        } => {
            let attribution = service
                .attribute(parse_id(payment)?, parse_id(income)?, parse_money(amount)?)
                .await?;
            println!("Attributed {} ({})", format_amount(attribution.amount), attribution.id);
        }

        AttributeCommands::Remove { id } => {
            let removal = service.remove_attribution(parse_id(id)?).await?;
            println!("Removed attribution of {}", format_amount(removal.attribution.amount));
            println!("  Payment remaining: {}", format_amount(removal.payment_totals.remaining));
            println!("  Income remaining:  {}", format_amount(removal.income_totals.remaining));
        }

        AttributeCommands::Split {
            income,
            targets,
            amount,
        } => {
            let targets = targets
                .iter()
                .map(|t| parse_split_target(t))
                .collect::<Result<Vec<_>>>()?;
            let amount = amount.as_deref().map(parse_money).transpose()?;
            let attributions = service
                .attribute_split(parse_id(income)?, amount, &targets)
                .await?;
            for attribution in &attributions {
                println!(
                    "Attributed {} to payment {} ({})",
                    format_amount(attribution.amount),
                    attribution.payment_id,
                    attribution.id
                );
            }
        }

        AttributeCommands::Auto { payment, window } => {
            match service.auto_attribute(parse_id(payment)?, *window).await? {
                Some(attribution) => println!(
                    "Attributed {} from income {} ({})",
                    format_amount(attribution.amount),
                    attribution.income_event_id,
                    attribution.id
                ),
                None => println!("No matching income found."),
            }
        }
    }
    Ok(())
}

fn print_report(payload: &ReportPayload, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(payload)?),
        "csv" => {
            write_report_csv(payload, std::io::stdout())?;
        }
        other => anyhow::bail!("Unknown format '{}'. Use json or csv", other),
    }
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn end_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(chrono::Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid ID '{}'", raw))
}

fn parse_money(raw: &str) -> Result<rust_decimal::Decimal> {
    parse_amount(raw).with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", raw))
}

/// Parse `PAYMENT_ID:WEIGHT`.
fn parse_split_target(raw: &str) -> Result<(Uuid, rust_decimal::Decimal)> {
    let (id, weight) = raw
        .split_once(':')
        .with_context(|| format!("Invalid split target '{}'. Use PAYMENT_ID:WEIGHT", raw))?;
    let weight = weight
        .trim()
        .parse()
        .with_context(|| format!("Invalid weight '{}'", weight))?;
    Ok((parse_id(id)?, weight))
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", date_str))
}

fn parse_date_or_today(date_str: Option<&str>) -> Result<NaiveDate> {
    date_str.map(parse_date).transpose().map(|d| d.unwrap_or_else(today))
}

fn parse_date_range(from: Option<&str>, to: Option<&str>) -> Result<DateRange> {
    let end = parse_date_or_today(to)?;
    let start = match from {
        Some(d) => parse_date(d)?,
        None => first_of_month(end),
    };
    Ok(DateRange::new(start, end))
}

fn parse_frequency(raw: &str) -> Result<Frequency> {
    Frequency::from_str(raw).with_context(|| {
        format!(
            "Invalid frequency '{}'. Use one-time, weekly, biweekly, monthly, quarterly or annual",
            raw
        )
    })
}

fn parse_granularity(raw: &str) -> Result<Granularity> {
    Granularity::from_str(raw)
        .with_context(|| format!("Invalid granularity '{}'. Use day, week, month, quarter or year", raw))
}

fn parse_report_type(raw: &str) -> Result<ReportType> {
    ReportType::from_str(raw).with_context(|| format!("Unknown report kind '{}'", raw))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
