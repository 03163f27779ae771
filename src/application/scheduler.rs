use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::domain::{
    DeliveryStatus, ExecutionId, ExecutionStatus, ScheduledReport,
    ScheduledReportExecution, ScheduledReportId,
};
use crate::storage::Repository;

use super::delivery::ReportDelivery;
use super::reports::ReportAggregator;
use super::AppError;

/// Executor settings
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Claims older than this are treated as abandoned by a crashed worker.
    pub claim_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            claim_timeout: Duration::minutes(30),
        }
    }
}

/// Outcome of one schedule firing
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub schedule_id: ScheduledReportId,
    pub schedule_name: String,
    pub execution_id: Option<ExecutionId>,
    pub status: ExecutionStatus,
    pub delivery_status: DeliveryStatus,
    pub error: Option<String>,
}

/// Result of a discovery pass
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub executed: Vec<ExecutionOutcome>,
    /// Due schedules another worker claimed first
    pub skipped: usize,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.executed
            .iter()
            .filter(|o| o.status == ExecutionStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.executed
            .iter()
            .filter(|o| o.status == ExecutionStatus::Failed)
            .count()
    }
}

/// Finds due report schedules, runs them and hands the results to delivery.
pub struct ScheduledReportExecutor {
    repo: Repository,
    aggregator: ReportAggregator,
    delivery: Arc<dyn ReportDelivery>,
    config: ExecutorConfig,
}

impl ScheduledReportExecutor {
    pub fn new(
        repo: Repository,
        delivery: Arc<dyn ReportDelivery>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            aggregator: ReportAggregator::new(repo.clone()),
            repo,
            delivery,
            config,
        }
    }

    fn stale_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.claim_timeout
    }

    /// Execute every schedule due at `now`.
    ///
    /// Each schedule is claimed before it runs; one that another pass already
    /// holds is skipped. A failing schedule does not stop the pass.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<RunSummary, AppError> {
        let stale_before = self.stale_before(now);
        let due = self.repo.list_due_scheduled_reports(now, stale_before).await?;
        debug!(count = due.len(), "due scheduled reports discovered");

        let mut summary = RunSummary::default();
        for report in due {
            if !self
                .repo
                .claim_due_scheduled_report(report.id, now, stale_before)
                .await?
            {
                debug!(schedule_id = %report.id, "schedule already claimed, skipping");
                summary.skipped += 1;
                continue;
            }
            match self.execute_claimed(report.id, now).await {
                Ok(outcome) => summary.executed.push(outcome),
                Err(AppError::ScheduledReportNotFound(_)) => {
                    debug!(schedule_id = %report.id, "schedule deleted after discovery, skipping");
                    summary.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        if !summary.executed.is_empty() {
            info!(
                completed = summary.completed(),
                failed = summary.failed(),
                skipped = summary.skipped,
                "scheduled report pass finished"
            );
        }
        Ok(summary)
    }

    /// Execute one schedule immediately, whatever its next slot.
    pub async fn run_now(
        &self,
        id: ScheduledReportId,
        now: DateTime<Utc>,
    ) -> Result<Option<ExecutionOutcome>, AppError> {
        if self.repo.get_scheduled_report(id).await?.is_none() {
            return Err(AppError::ScheduledReportNotFound(id.to_string()));
        }

        if !self
            .repo
            .claim_scheduled_report(id, now, self.stale_before(now))
            .await?
        {
            warn!(schedule_id = %id, "schedule is claimed by another run or completed");
            return Ok(None);
        }
        self.execute_claimed(id, now).await.map(Some)
    }

    /// Run a schedule the caller has already claimed, then release the claim
    /// whatever happens.
    ///
    /// The schedule is read after the claim so that edits made before it are
    /// honoured.
    pub async fn execute_claimed(
        &self,
        id: ScheduledReportId,
        now: DateTime<Utc>,
    ) -> Result<ExecutionOutcome, AppError> {
        let result = match self.repo.get_scheduled_report(id).await {
            Ok(Some(report)) => self.execute(report, now).await,
            Ok(None) => Err(AppError::ScheduledReportNotFound(id.to_string())),
            Err(err) => Err(err.into()),
        };
        self.repo.release_scheduled_report(id).await?;
        result
    }

    async fn execute(
        &self,
        report: ScheduledReport,
        now: DateTime<Utc>,
    ) -> Result<ExecutionOutcome, AppError> {
        let range = match report.report_range(now) {
            Ok(range) => range,
            Err(err) => {
                error!(schedule_id = %report.id, error = %err, "cannot compute report range");
                self.repo.mark_scheduled_report_error(report.id, now).await?;
                return Ok(ExecutionOutcome {
                    schedule_id: report.id,
                    schedule_name: report.name,
                    execution_id: None,
                    status: ExecutionStatus::Failed,
                    delivery_status: DeliveryStatus::Pending,
                    error: Some(err.to_string()),
                });
            }
        };

        let mut execution = ScheduledReportExecution::new(report.id, range, now);
        self.repo.save_execution(&execution).await?;
        execution.start()?;
        self.repo.update_execution(&execution).await?;
        info!(
            schedule_id = %report.id,
            execution_id = %execution.id,
            report_type = %report.report_type,
            start = %range.start,
            end = %range.end,
            "executing scheduled report"
        );

        let generated = self
            .aggregator
            .generate(report.report_type, report.family_id, range, &report.parameters)
            .await
            .and_then(|payload| {
                serde_json::to_value(&payload)
                    .map_err(|e| AppError::AggregationFailure(e.to_string()))
            });

        let data = match generated {
            Ok(data) => data,
            Err(err) => {
                let message = err.to_string();
                error!(schedule_id = %report.id, execution_id = %execution.id, error = %message, "scheduled report failed");
                execution.fail(message.clone(), now)?;
                self.repo.update_execution(&execution).await?;

                // next_execution stays put; the schedule waits for reactivation
                self.repo.mark_scheduled_report_error(report.id, now).await?;

                return Ok(ExecutionOutcome {
                    schedule_id: report.id,
                    schedule_name: report.name,
                    execution_id: Some(execution.id),
                    status: execution.status,
                    delivery_status: execution.delivery_status,
                    error: Some(message),
                });
            }
        };

        execution.complete(data, now)?;
        let report = self.repo.complete_scheduled_run(&execution, now).await?;
        debug!(schedule_id = %report.id, next_execution = %report.next_execution, "schedule advanced");

        let delivered = self
            .delivery
            .deliver(&execution, &report, &report.recipients)
            .await
            .map_err(|e| format!("{:#}", e));
        if let Err(message) = &delivered {
            warn!(
                schedule_id = %report.id,
                execution_id = %execution.id,
                error = %AppError::DeliveryFailure(message.clone()),
                "report delivery failed"
            );
        }
        execution.record_delivery(delivered, now)?;
        self.repo.update_execution(&execution).await?;

        Ok(ExecutionOutcome {
            schedule_id: report.id,
            schedule_name: report.name,
            execution_id: Some(execution.id),
            status: execution.status,
            delivery_status: execution.delivery_status,
            error: execution.delivery_error,
        })
    }
}
