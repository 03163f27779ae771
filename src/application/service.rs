use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::domain::{
    find_automatic_match, validate_recipients, split, Account, AccountType, Attribution, AttributionError,
    AttributionId, AttributionTotals, AttributionType, BudgetAllocation, DateRange,
    DeliverySchedule, Expense, Family, FamilyId, Frequency, IncomeEvent, IncomeEventId,
    IncomeStatus, Money, Payment, PaymentId, PaymentStatus, PaymentType, ReportParameters,
    ReportType, ScheduleFrequency, ScheduleStatus, ScheduledReport, ScheduledReportExecution,
    ScheduledReportId,
};
use crate::storage::Repository;

use super::delivery::ReportDelivery;
use super::reporting::ReportPayload;
use super::reports::ReportAggregator;
use super::scheduler::{ExecutorConfig, ScheduledReportExecutor};
use super::AppError;

/// Default distance between a payment's due date and an income for
/// automatic attribution.
pub const DEFAULT_MATCH_WINDOW_DAYS: i64 = 7;

/// Application service for a household's planning data.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
pub struct HouseholdService {
    repo: Repository,
    reports: ReportAggregator,
}

/// A received income and the instance scheduled after it
pub struct IncomeReceipt {
    pub event: IncomeEvent,
    pub next: Option<IncomeEvent>,
}

/// A paid payment and the instance scheduled after it
pub struct PaymentReceipt {
    pub payment: Payment,
    pub next: Option<Payment>,
}

/// Payment with its derived status and attribution totals
pub struct PaymentDetails {
    pub payment: Payment,
    pub status: PaymentStatus,
    pub attributed: Money,
    pub remaining: Money,
    pub attributions: Vec<Attribution>,
}

/// Income event with its attribution totals
pub struct IncomeDetails {
    pub event: IncomeEvent,
    pub totals: AttributionTotals,
    pub attributions: Vec<Attribution>,
}

/// A deleted attribution and both parents' recomputed totals
pub struct AttributionRemoval {
    pub attribution: Attribution,
    pub payment_totals: AttributionTotals,
    pub income_totals: AttributionTotals,
}

/// Input for creating a report schedule
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub family_id: FamilyId,
    pub name: String,
    pub report_type: ReportType,
    pub frequency: ScheduleFrequency,
    pub delivery_day: Option<u32>,
    pub delivery_hour: u32,
    pub timezone: String,
    pub recipients: Vec<String>,
    pub parameters: ReportParameters,
}

/// Changes to an existing schedule; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub recipients: Option<Vec<String>>,
    pub parameters: Option<ReportParameters>,
    pub frequency: Option<ScheduleFrequency>,
    pub delivery_day: Option<u32>,
    pub delivery_hour: Option<u32>,
    pub timezone: Option<String>,
}

/// A schedule with its most recent execution
pub struct ScheduleOverview {
    pub schedule: ScheduledReport,
    pub last_run: Option<ScheduledReportExecution>,
}

impl ScheduleOverview {
    /// Error of the most recent run, if it failed or could not be delivered.
    pub fn last_error(&self) -> Option<&str> {
        self.last_run
            .as_ref()
            .and_then(|e| e.error.as_deref().or(e.delivery_error.as_deref()))
    }
}

fn require_positive(amount: Money, what: &str) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(format!(
            "{} must be positive, got {}",
            what, amount
        )));
    }
    Ok(())
}

/// Surface a rule violation raised inside a storage transaction as its
/// domain error rather than a database failure.
fn rejected_attribution(err: anyhow::Error) -> AppError {
    match err.downcast::<AttributionError>() {
        Ok(rejected) => rejected.into(),
        Err(other) => AppError::Database(other),
    }
}

impl HouseholdService {
    /// Create a new household service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            reports: ReportAggregator::new(repo.clone()),
            repo,
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn reports(&self) -> &ReportAggregator {
        &self.reports
    }

    /// Build an executor for scheduled reports over the same store.
    pub fn executor(
        &self,
        delivery: Arc<dyn ReportDelivery>,
        config: ExecutorConfig,
    ) -> ScheduledReportExecutor {
        ScheduledReportExecutor::new(self.repo.clone(), delivery, config)
    }

    // ========================
    // Family operations
    // ========================

    pub async fn create_family(&self, name: String) -> Result<Family, AppError> {
        let family = Family::new(name);
        self.repo.save_family(&family).await?;
        info!(family_id = %family.id, "family created");
        Ok(family)
    }

    pub async fn get_family(&self, id: FamilyId) -> Result<Family, AppError> {
        self.repo
            .get_family(id)
            .await?
            .ok_or_else(|| AppError::FamilyNotFound(id.to_string()))
    }

    /// Delete a family together with everything it owns.
    pub async fn delete_family(&self, id: FamilyId) -> Result<(), AppError> {
        if !self.repo.delete_family(id).await? {
            return Err(AppError::FamilyNotFound(id.to_string()));
        }
        info!(family_id = %id, "family deleted");
        Ok(())
    }

    // ========================
    // Income operations
    // ========================

    pub async fn add_income(
        &self,
        family_id: FamilyId,
        source: String,
        amount: Money,
        scheduled_date: NaiveDate,
        frequency: Frequency,
    ) -> Result<IncomeEvent, AppError> {
        require_positive(amount, "income amount")?;
        self.get_family(family_id).await?;

        let event = IncomeEvent::new(family_id, source, amount, scheduled_date, frequency);
        self.repo.save_income_event(&event).await?;
        debug!(%family_id, income_id = %event.id, "income event added");
        Ok(event)
    }

    pub async fn get_income(&self, id: IncomeEventId) -> Result<IncomeEvent, AppError> {
        self.repo
            .get_income_event(id)
            .await?
            .ok_or_else(|| AppError::IncomeEventNotFound(id.to_string()))
    }

    pub async fn get_income_details(&self, id: IncomeEventId) -> Result<IncomeDetails, AppError> {
        let event = self.get_income(id).await?;
        let attributions = self.repo.list_attributions_for_income(id).await?;
        let totals = AttributionTotals::compute(event.attribution_cap(), &attributions);
        Ok(IncomeDetails {
            event,
            totals,
            attributions,
        })
    }

    /// Mark an income as received. The first receipt of a recurring income
    /// schedules the next instance.
    pub async fn receive_income(
        &self,
        id: IncomeEventId,
        actual_date: NaiveDate,
        actual_amount: Money,
    ) -> Result<IncomeReceipt, AppError> {
        if actual_amount < Decimal::ZERO {
            return Err(AppError::InvalidAmount(format!(
                "received amount cannot be negative, got {}",
                actual_amount
            )));
        }
        let mut event = self.get_income(id).await?;
        if event.status == IncomeStatus::Cancelled {
            return Err(AppError::RecordCancelled(format!("income event {}", id)));
        }

        let first_receipt = event.status == IncomeStatus::Scheduled;
        event.receive(actual_date, actual_amount);
        let next = if first_receipt {
            event.next_instance()
        } else {
            None
        };

        // earmarks already made against the expected amount must still fit
        self.repo
            .receive_income_checked(&event, next.as_ref())
            .await
            .map_err(rejected_attribution)?;

        info!(income_id = %id, amount = %actual_amount, "income received");
        Ok(IncomeReceipt { event, next })
    }

    pub async fn cancel_income(&self, id: IncomeEventId) -> Result<IncomeEvent, AppError> {
        let mut event = self.get_income(id).await?;
        event.cancel();
        self.repo.update_income_event(&event).await?;
        Ok(event)
    }

    pub async fn list_income(&self, family_id: FamilyId) -> Result<Vec<IncomeEvent>, AppError> {
        Ok(self.repo.list_income_events(family_id).await?)
    }

    // ========================
    // Payment operations
    // ========================

    #[allow(clippy::too_many_arguments)]
    pub async fn add_payment(
        &self,
        family_id: FamilyId,
        payee: String,
        amount: Money,
        due_date: NaiveDate,
        payment_type: PaymentType,
        frequency: Frequency,
        category: Option<String>,
    ) -> Result<Payment, AppError> {
        require_positive(amount, "payment amount")?;
        self.get_family(family_id).await?;

        let mut payment = Payment::new(family_id, payee, amount, due_date, payment_type, frequency);
        if let Some(category) = category {
            payment = payment.with_category(category);
        }
        self.repo.save_payment(&payment).await?;
        debug!(%family_id, payment_id = %payment.id, "payment added");
        Ok(payment)
    }

    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment, AppError> {
        self.repo
            .get_payment(id)
            .await?
            .ok_or_else(|| AppError::PaymentNotFound(id.to_string()))
    }

    /// Payment with attribution totals recomputed from its attribution rows.
    pub async fn get_payment_details(
        &self,
        id: PaymentId,
        today: NaiveDate,
    ) -> Result<PaymentDetails, AppError> {
        let payment = self.get_payment(id).await?;
        self.payment_details(payment, today).await
    }

    async fn payment_details(
        &self,
        payment: Payment,
        today: NaiveDate,
    ) -> Result<PaymentDetails, AppError> {
        let attributions = self.repo.list_attributions_for_payment(payment.id).await?;
        let totals = AttributionTotals::compute(payment.amount, &attributions);
        Ok(PaymentDetails {
            status: payment.status_on(today),
            attributed: totals.attributed,
            remaining: totals.remaining,
            payment,
            attributions,
        })
    }

    pub async fn list_payments(
        &self,
        family_id: FamilyId,
        today: NaiveDate,
    ) -> Result<Vec<PaymentDetails>, AppError> {
        let payments = self.repo.list_payments(family_id).await?;
        let mut details = Vec::with_capacity(payments.len());
        for payment in payments {
            details.push(self.payment_details(payment, today).await?);
        }
        Ok(details)
    }

    /// Mark a payment as paid, defaulting to the full amount. The first
    /// payment of a recurring bill schedules the next instance.
    pub async fn pay_payment(
        &self,
        id: PaymentId,
        paid_date: NaiveDate,
        paid_amount: Option<Money>,
    ) -> Result<PaymentReceipt, AppError> {
        let mut payment = self.get_payment(id).await?;
        if payment.is_cancelled() {
            return Err(AppError::RecordCancelled(format!("payment {}", id)));
        }
        let amount = paid_amount.unwrap_or(payment.amount);
        require_positive(amount, "paid amount")?;

        let first_payment = payment.state == PaymentStatus::Scheduled;
        payment.mark_paid(paid_date, amount);
        self.repo.update_payment(&payment).await?;

        let next = if first_payment {
            payment.next_instance()
        } else {
            None
        };
        if let Some(next) = &next {
            self.repo.save_payment(next).await?;
        }

        info!(payment_id = %id, amount = %amount, "payment paid");
        Ok(PaymentReceipt { payment, next })
    }

    pub async fn cancel_payment(&self, id: PaymentId) -> Result<Payment, AppError> {
        let mut payment = self.get_payment(id).await?;
        payment.cancel();
        self.repo.update_payment(&payment).await?;
        Ok(payment)
    }

    // ========================
    // Attribution operations
    // ========================

    /// Earmark `amount` of an income event for a payment.
    pub async fn attribute(
        &self,
        payment_id: PaymentId,
        income_event_id: IncomeEventId,
        amount: Money,
    ) -> Result<Attribution, AppError> {
        self.record_attribution(payment_id, income_event_id, amount, AttributionType::Manual)
            .await
    }

    async fn record_attribution(
        &self,
        payment_id: PaymentId,
        income_event_id: IncomeEventId,
        amount: Money,
        attribution_type: AttributionType,
    ) -> Result<Attribution, AppError> {
        if amount <= Decimal::ZERO {
            return Err(AttributionError::InvalidAmount(amount).into());
        }
        self.get_payment(payment_id).await?;
        self.get_income(income_event_id).await?;

        let attribution = Attribution::new(payment_id, income_event_id, amount, attribution_type);
        self.repo
            .save_attribution_checked(&attribution)
            .await
            .map_err(rejected_attribution)?;

        info!(
            attribution_id = %attribution.id,
            %payment_id,
            %income_event_id,
            amount = %amount,
            attribution_type = %attribution_type,
            "attribution recorded"
        );
        Ok(attribution)
    }

    /// Spread part of an income over several payments in proportion to
    /// `targets` weights.
    ///
    /// `total` defaults to the income's remaining capacity. Shares are sized
    /// with [`split`], so the recorded attributions sum to `total` exactly;
    /// zero shares are skipped. The batch is stored in one transaction and is
    /// rejected as a whole if any share breaks a cap.
    pub async fn attribute_split(
        &self,
        income_event_id: IncomeEventId,
        total: Option<Money>,
        targets: &[(PaymentId, Decimal)],
    ) -> Result<Vec<Attribution>, AppError> {
        if targets.is_empty() {
            return Err(AppError::InvalidAttribution(
                "at least one payment is required".to_string(),
            ));
        }
        if let Some((payment_id, weight)) = targets.iter().find(|(_, w)| *w < Decimal::ZERO) {
            return Err(AppError::InvalidAttribution(format!(
                "weight for payment {} cannot be negative, got {}",
                payment_id, weight
            )));
        }
        if targets.iter().all(|(_, w)| w.is_zero()) {
            return Err(AppError::InvalidAttribution(
                "at least one weight must be positive".to_string(),
            ));
        }

        let income = self.get_income(income_event_id).await?;
        for (payment_id, _) in targets {
            self.get_payment(*payment_id).await?;
        }
        let total = match total {
            Some(total) => total,
            None => {
                let rows = self.repo.list_attributions_for_income(income_event_id).await?;
                AttributionTotals::compute(income.attribution_cap(), &rows).remaining
            }
        };
        if total <= Decimal::ZERO {
            return Err(AttributionError::InvalidAmount(total).into());
        }

        let weights: Vec<Decimal> = targets.iter().map(|(_, w)| *w).collect();
        let attributions: Vec<Attribution> = targets
            .iter()
            .zip(split(total, &weights))
            .filter(|(_, amount)| !amount.is_zero())
            .map(|((payment_id, _), amount)| {
                Attribution::new(*payment_id, income_event_id, amount, AttributionType::Manual)
            })
            .collect();

        self.repo
            .save_attributions_checked(&attributions)
            .await
            .map_err(rejected_attribution)?;

        info!(
            %income_event_id,
            total = %total,
            payments = attributions.len(),
            "income split across payments"
        );
        Ok(attributions)
    }

    /// Delete an attribution and return both parents' recomputed totals.
    pub async fn remove_attribution(&self, id: AttributionId) -> Result<AttributionRemoval, AppError> {
        let attribution = self
            .repo
            .get_attribution(id)
            .await?
            .ok_or_else(|| AppError::AttributionNotFound(id.to_string()))?;
        if !self.repo.delete_attribution(id).await? {
            return Err(AppError::AttributionNotFound(id.to_string()));
        }

        let payment = self.get_payment(attribution.payment_id).await?;
        let income = self.get_income(attribution.income_event_id).await?;
        let payment_totals = AttributionTotals::compute(
            payment.amount,
            &self.repo.list_attributions_for_payment(payment.id).await?,
        );
        let income_totals = AttributionTotals::compute(
            income.attribution_cap(),
            &self.repo.list_attributions_for_income(income.id).await?,
        );

        info!(attribution_id = %id, "attribution removed");
        Ok(AttributionRemoval {
            attribution,
            payment_totals,
            income_totals,
        })
    }

    /// Fund the rest of a payment from the best matching received income.
    ///
    /// Returns `None` when the payment is settled, cancelled, or no income
    /// within `window_days` has capacity left.
    pub async fn auto_attribute(
        &self,
        payment_id: PaymentId,
        window_days: i64,
    ) -> Result<Option<Attribution>, AppError> {
        let payment = self.get_payment(payment_id).await?;
        if payment.is_cancelled() {
            return Ok(None);
        }
        let payment_totals = AttributionTotals::compute(
            payment.amount,
            &self.repo.list_attributions_for_payment(payment_id).await?,
        );

        let window = DateRange::new(
            payment.due_date - Duration::days(window_days),
            payment.due_date + Duration::days(window_days),
        );
        let mut candidates = Vec::new();
        for income in self
            .repo
            .list_income_in_range(payment.family_id, window)
            .await?
        {
            let rows = self.repo.list_attributions_for_income(income.id).await?;
            let totals = AttributionTotals::compute(income.attribution_cap(), &rows);
            candidates.push((income, totals));
        }

        let Some(candidate) = find_automatic_match(
            payment.due_date,
            payment_totals.remaining,
            &candidates,
            window_days,
        ) else {
            debug!(%payment_id, "no income available for automatic attribution");
            return Ok(None);
        };

        self.record_attribution(
            payment_id,
            candidate.income_event_id,
            candidate.amount,
            AttributionType::Automatic,
        )
        .await
        .map(Some)
    }

    // ========================
    // Expense, budget and account operations
    // ========================

    pub async fn record_expense(
        &self,
        family_id: FamilyId,
        date: NaiveDate,
        amount: Money,
        category: String,
        merchant: Option<String>,
        description: Option<String>,
    ) -> Result<Expense, AppError> {
        require_positive(amount, "expense amount")?;
        self.get_family(family_id).await?;

        let mut expense = Expense::new(family_id, date, amount, category);
        if let Some(merchant) = merchant {
            expense = expense.with_merchant(merchant);
        }
        if let Some(description) = description {
            expense = expense.with_description(description);
        }
        self.repo.save_expense(&expense).await?;
        Ok(expense)
    }

    pub async fn set_budget(
        &self,
        family_id: FamilyId,
        category: String,
        amount: Money,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<BudgetAllocation, AppError> {
        if amount < Decimal::ZERO {
            return Err(AppError::InvalidAmount(format!(
                "budget amount cannot be negative, got {}",
                amount
            )));
        }
        if period_end < period_start {
            return Err(AppError::InvalidAmount(format!(
                "budget period ends ({}) before it starts ({})",
                period_end, period_start
            )));
        }
        self.get_family(family_id).await?;

        let budget = BudgetAllocation::new(family_id, category, amount, period_start, period_end);
        self.repo.save_budget_allocation(&budget).await?;
        Ok(budget)
    }

    /// Record the current balance of an account, creating it on first use.
    pub async fn set_account_balance(
        &self,
        family_id: FamilyId,
        name: String,
        account_type: AccountType,
        balance: Money,
    ) -> Result<Account, AppError> {
        self.get_family(family_id).await?;

        let mut account = Account::new(family_id, name, account_type, balance);
        if let Some(existing) = self
            .repo
            .list_accounts(family_id)
            .await?
            .into_iter()
            .find(|a| a.name == account.name)
        {
            account.id = existing.id;
        }
        self.repo.upsert_account(&account).await?;
        Ok(account)
    }

    pub async fn list_accounts(&self, family_id: FamilyId) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts(family_id).await?)
    }

    // ========================
    // Report operations
    // ========================

    /// Generate a report on demand.
    pub async fn generate_report(
        &self,
        report_type: ReportType,
        family_id: FamilyId,
        range: DateRange,
        parameters: &ReportParameters,
    ) -> Result<ReportPayload, AppError> {
        self.get_family(family_id).await?;
        self.reports
            .generate(report_type, family_id, range, parameters)
            .await
    }

    // ========================
    // Scheduled report operations
    // ========================

    pub async fn create_schedule(
        &self,
        request: NewSchedule,
        now: DateTime<Utc>,
    ) -> Result<ScheduledReport, AppError> {
        self.get_family(request.family_id).await?;
        let recipients =
            validate_recipients(&request.recipients).map_err(AppError::InvalidRecipient)?;
        if self
            .repo
            .list_scheduled_reports(request.family_id)
            .await?
            .iter()
            .any(|s| s.name == request.name)
        {
            return Err(AppError::ScheduledReportAlreadyExists(request.name));
        }

        let report = ScheduledReport::new(
            request.family_id,
            request.name,
            request.report_type,
            request.frequency,
            request.delivery_day,
            request.delivery_hour,
            request.timezone,
            recipients,
            now,
        )?
        .with_parameters(request.parameters);

        self.repo.save_scheduled_report(&report).await?;
        info!(
            schedule_id = %report.id,
            family_id = %report.family_id,
            next_execution = %report.next_execution,
            "scheduled report created"
        );
        Ok(report)
    }

    pub async fn get_schedule(&self, id: ScheduledReportId) -> Result<ScheduledReport, AppError> {
        self.repo
            .get_scheduled_report(id)
            .await?
            .ok_or_else(|| AppError::ScheduledReportNotFound(id.to_string()))
    }

    /// Apply changes to a schedule. Timing changes recompute the next run
    /// from `now`.
    pub async fn update_schedule(
        &self,
        id: ScheduledReportId,
        update: ScheduleUpdate,
        now: DateTime<Utc>,
    ) -> Result<ScheduledReport, AppError> {
        let mut report = self.get_schedule(id).await?;

        if let Some(name) = update.name {
            report.name = name;
        }
        if let Some(recipients) = update.recipients {
            report.recipients = validate_recipients(&recipients).map_err(AppError::InvalidRecipient)?;
        }
        if let Some(parameters) = update.parameters {
            report.parameters = parameters;
        }

        let retimed = update.frequency.is_some()
            || update.delivery_day.is_some()
            || update.delivery_hour.is_some()
            || update.timezone.is_some();
        if retimed {
            if let Some(frequency) = update.frequency {
                report.frequency = frequency;
            }
            if update.delivery_day.is_some() {
                report.delivery_day = update.delivery_day;
            }
            if let Some(hour) = update.delivery_hour {
                report.delivery_hour = hour;
            }
            if let Some(timezone) = update.timezone {
                report.timezone = timezone;
            }
            report.next_execution = DeliverySchedule::new(
                report.frequency,
                report.delivery_day,
                report.delivery_hour,
                &report.timezone,
            )?
            .next_after(now)?;
        }

        report.updated_at = now;
        self.repo.update_scheduled_report(&report).await?;
        Ok(report)
    }

    pub async fn pause_schedule(
        &self,
        id: ScheduledReportId,
        now: DateTime<Utc>,
    ) -> Result<ScheduledReport, AppError> {
        if !self
            .repo
            .set_scheduled_report_status(id, ScheduleStatus::Paused, now)
            .await?
        {
            return Err(AppError::ScheduledReportNotFound(id.to_string()));
        }
        info!(schedule_id = %id, "scheduled report paused");
        self.get_schedule(id).await
    }

    /// Reactivate a paused or failed schedule. The next run is recomputed
    /// from `now` so missed slots are not replayed.
    pub async fn resume_schedule(
        &self,
        id: ScheduledReportId,
        now: DateTime<Utc>,
    ) -> Result<ScheduledReport, AppError> {
        let mut report = self.get_schedule(id).await?;
        report.next_execution = report.delivery_schedule()?.next_after(now)?;
        report.status = ScheduleStatus::Active;
        report.updated_at = now;
        self.repo.update_scheduled_report(&report).await?;
        info!(schedule_id = %id, next_execution = %report.next_execution, "scheduled report resumed");
        Ok(report)
    }

    pub async fn delete_schedule(&self, id: ScheduledReportId) -> Result<(), AppError> {
        if !self.repo.delete_scheduled_report(id).await? {
            return Err(AppError::ScheduledReportNotFound(id.to_string()));
        }
        Ok(())
    }

    /// A family's schedules, each with its latest execution.
    pub async fn list_schedules(&self, family_id: FamilyId) -> Result<Vec<ScheduleOverview>, AppError> {
        let schedules = self.repo.list_scheduled_reports(family_id).await?;
        let mut overview = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let last_run = self.repo.list_executions(schedule.id, 1).await?.into_iter().next();
            overview.push(ScheduleOverview { schedule, last_run });
        }
        Ok(overview)
    }

    /// Executions of a schedule, newest first.
    pub async fn schedule_history(
        &self,
        id: ScheduledReportId,
        limit: u32,
    ) -> Result<Vec<ScheduledReportExecution>, AppError> {
        self.get_schedule(id).await?;
        Ok(self.repo.list_executions(id, limit).await?)
    }
}
