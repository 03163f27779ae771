use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{
    first_of_month, DateRange, DeliverySchedule, FamilyId, Granularity, ScheduleError,
    ScheduleFrequency,
};

pub type ScheduledReportId = Uuid;
pub type ExecutionId = Uuid;

/// The eight report kinds the aggregator can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    CashFlow,
    SpendingAnalysis,
    BudgetPerformance,
    IncomeAnalysis,
    NetWorth,
    SavingsRate,
    MonthlySummary,
    AnnualSummary,
}

impl ReportType {
    pub const ALL: [ReportType; 8] = [
        ReportType::CashFlow,
        ReportType::SpendingAnalysis,
        ReportType::BudgetPerformance,
        ReportType::IncomeAnalysis,
        ReportType::NetWorth,
        ReportType::SavingsRate,
        ReportType::MonthlySummary,
        ReportType::AnnualSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::CashFlow => "cash_flow",
            ReportType::SpendingAnalysis => "spending_analysis",
            ReportType::BudgetPerformance => "budget_performance",
            ReportType::IncomeAnalysis => "income_analysis",
            ReportType::NetWorth => "net_worth",
            ReportType::SavingsRate => "savings_rate",
            ReportType::MonthlySummary => "monthly_summary",
            ReportType::AnnualSummary => "annual_summary",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Report-specific options stored with a schedule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportParameters {
    pub granularity: Option<Granularity>,
    pub top_n: Option<usize>,
    pub categories: Option<Vec<String>>,
}

impl ReportParameters {
    pub const DEFAULT_TOP_N: usize = 10;

    pub fn granularity_or(&self, default: Granularity) -> Granularity {
        self.granularity.unwrap_or(default)
    }

    pub fn top_n(&self) -> usize {
        self.top_n.unwrap_or(Self::DEFAULT_TOP_N)
    }

    /// True when `category` passes the optional category filter.
    pub fn includes_category(&self, category: &str) -> bool {
        match &self.categories {
            Some(categories) => categories.iter().any(|c| c.eq_ignore_ascii_case(category)),
            None => true,
        }
    }
}

/// Status of a report schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Active,
    Paused,
    /// The last execution failed; excluded from discovery until reactivated
    Error,
    Completed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Active => "active",
            ScheduleStatus::Paused => "paused",
            ScheduleStatus::Error => "error",
            ScheduleStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(ScheduleStatus::Active),
            "paused" => Some(ScheduleStatus::Paused),
            "error" => Some(ScheduleStatus::Error),
            "completed" => Some(ScheduleStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A report generated and delivered on a recurring schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledReport {
    pub id: ScheduledReportId,
    pub family_id: FamilyId,
    pub name: String,
    pub report_type: ReportType,
    pub frequency: ScheduleFrequency,
    pub recipients: Vec<String>,
    pub parameters: ReportParameters,
    pub delivery_day: Option<u32>,
    pub delivery_hour: u32,
    pub timezone: String,
    pub status: ScheduleStatus,
    pub next_execution: DateTime<Utc>,
    pub last_execution: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledReport {
    /// Create an active schedule whose first run follows `now`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        family_id: FamilyId,
        name: String,
        report_type: ReportType,
        frequency: ScheduleFrequency,
        delivery_day: Option<u32>,
        delivery_hour: u32,
        timezone: String,
        recipients: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        let schedule = DeliverySchedule::new(frequency, delivery_day, delivery_hour, &timezone)?;
        Ok(Self {
            id: Uuid::new_v4(),
            family_id,
            name,
            report_type,
            frequency,
            recipients,
            parameters: ReportParameters::default(),
            delivery_day,
            delivery_hour,
            timezone,
            status: ScheduleStatus::Active,
            next_execution: schedule.next_after(now)?,
            last_execution: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_parameters(mut self, parameters: ReportParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn delivery_schedule(&self) -> Result<DeliverySchedule, ScheduleError> {
        DeliverySchedule::new(
            self.frequency,
            self.delivery_day,
            self.delivery_hour,
            &self.timezone,
        )
    }

    pub fn tz(&self) -> Result<Tz, ScheduleError> {
        super::parse_timezone(&self.timezone)
    }

    /// Check if this schedule should run at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Active && self.next_execution <= now
    }

    /// Record a successful run at `executed_at` and move to the next slot.
    pub fn advance(&mut self, executed_at: DateTime<Utc>) -> Result<(), ScheduleError> {
        self.next_execution = self.delivery_schedule()?.next_after(executed_at)?;
        self.last_execution = Some(executed_at);
        self.updated_at = executed_at;
        Ok(())
    }

    /// Reporting window for a run at `now`, in the schedule's timezone.
    pub fn report_range(&self, now: DateTime<Utc>) -> Result<DateRange, ScheduleError> {
        Ok(report_range(self.frequency, now, self.tz()?))
    }
}

/// The period that ended yesterday (local time) for a run at `now`.
///
/// Weekly covers the seven days ending yesterday; monthly, quarterly and annual
/// start on the first day of the month, quarter or year containing yesterday.
pub fn report_range(frequency: ScheduleFrequency, now: DateTime<Utc>, tz: Tz) -> DateRange {
    let today = now.with_timezone(&tz).date_naive();
    let yesterday = today.pred_opt().unwrap_or(today);

    let start = match frequency {
        ScheduleFrequency::Weekly => yesterday - Duration::days(6),
        ScheduleFrequency::Monthly => first_of_month(yesterday),
        ScheduleFrequency::Quarterly => {
            let month = (yesterday.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(yesterday.year(), month, 1).unwrap_or(yesterday)
        }
        ScheduleFrequency::Annual => {
            NaiveDate::from_ymd_opt(yesterday.year(), 1, 1).unwrap_or(yesterday)
        }
    };

    DateRange::new(start, yesterday)
}

/// Normalize and check recipient addresses. Returns the first invalid one.
pub fn validate_recipients(recipients: &[String]) -> Result<Vec<String>, String> {
    let mut normalized = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let address = recipient.trim().to_lowercase();
        let valid = match address.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !address.contains(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            return Err(recipient.clone());
        }
        if !normalized.contains(&address) {
            normalized.push(address);
        }
    }
    Ok(normalized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ExecutionStatus::Pending),
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(DeliveryStatus::Pending),
            "sent" => Some(DeliveryStatus::Sent),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Execution cannot move from {from} to {to}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("Delivery can only be recorded for a completed execution (status {0})")]
    NotDeliverable(ExecutionStatus),
}

/// One firing of a scheduled report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledReportExecution {
    pub id: ExecutionId,
    pub scheduled_report_id: ScheduledReportId,
    pub status: ExecutionStatus,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Aggregated payload, only set once completed
    pub report_data: Option<serde_json::Value>,
    /// Only set once failed
    pub error: Option<String>,
    pub delivery_status: DeliveryStatus,
    pub delivery_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl ScheduledReportExecution {
    pub fn new(scheduled_report_id: ScheduledReportId, range: DateRange, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scheduled_report_id,
            status: ExecutionStatus::Pending,
            period_start: range.start,
            period_end: range.end,
            report_data: None,
            error: None,
            delivery_status: DeliveryStatus::Pending,
            delivery_error: None,
            started_at: now,
            completed_at: None,
            delivered_at: None,
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.period_start, self.period_end)
    }

    fn transition(&mut self, from: ExecutionStatus, to: ExecutionStatus) -> Result<(), ExecutionError> {
        if self.status != from {
            return Err(ExecutionError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), ExecutionError> {
        self.transition(ExecutionStatus::Pending, ExecutionStatus::Running)
    }

    pub fn complete(&mut self, report_data: serde_json::Value, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        self.transition(ExecutionStatus::Running, ExecutionStatus::Completed)?;
        self.report_data = Some(report_data);
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, error: String, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        self.transition(ExecutionStatus::Running, ExecutionStatus::Failed)?;
        self.error = Some(error);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Record the delivery outcome. Never touches the execution status.
    pub fn record_delivery(&mut self, outcome: Result<(), String>, now: DateTime<Utc>) -> Result<(), ExecutionError> {
        if self.status != ExecutionStatus::Completed {
            return Err(ExecutionError::NotDeliverable(self.status));
        }
        match outcome {
            Ok(()) => {
                self.delivery_status = DeliveryStatus::Sent;
                self.delivery_error = None;
                self.delivered_at = Some(now);
            }
            Err(error) => {
                self.delivery_status = DeliveryStatus::Failed;
                self.delivery_error = Some(error);
            }
        }
        Ok(())
    }
}
