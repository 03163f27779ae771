use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::domain::{
    ExecutionId, ReportType, ScheduledReport, ScheduledReportExecution, ScheduledReportId,
};

/// Outbound channel for completed scheduled reports (mail, files, webhooks, ...).
///
/// Called once per completed execution. An error is recorded on the execution
/// as a delivery failure and never undoes the execution itself.
#[async_trait]
pub trait ReportDelivery: Send + Sync {
    async fn deliver(
        &self,
        execution: &ScheduledReportExecution,
        schedule: &ScheduledReport,
        recipients: &[String],
    ) -> Result<()>;
}

/// Envelope written for each delivered execution
#[derive(Debug, Serialize)]
struct OutboxEnvelope<'a> {
    execution_id: ExecutionId,
    schedule_id: ScheduledReportId,
    schedule_name: &'a str,
    report_type: ReportType,
    recipients: &'a [String],
    period_start: NaiveDate,
    period_end: NaiveDate,
    generated_at: Option<DateTime<Utc>>,
    report: &'a serde_json::Value,
}

/// Writes one JSON file per execution into a directory, for a mailer or other
/// process to pick up.
pub struct OutboxDelivery {
    dir: PathBuf,
}

impl OutboxDelivery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, execution_id: ExecutionId) -> PathBuf {
        self.dir.join(format!("{}.json", execution_id))
    }
}

#[async_trait]
impl ReportDelivery for OutboxDelivery {
    async fn deliver(
        &self,
        execution: &ScheduledReportExecution,
        schedule: &ScheduledReport,
        recipients: &[String],
    ) -> Result<()> {
        let report = execution
            .report_data
            .as_ref()
            .context("Execution has no report data to deliver")?;

        let envelope = OutboxEnvelope {
            execution_id: execution.id,
            schedule_id: schedule.id,
            schedule_name: &schedule.name,
            report_type: schedule.report_type,
            recipients,
            period_start: execution.period_start,
            period_end: execution.period_end,
            generated_at: execution.completed_at,
            report,
        };
        let body = serde_json::to_vec_pretty(&envelope).context("Failed to encode report envelope")?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create outbox {}", self.dir.display()))?;
        let path = self.path_for(execution.id);
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(execution_id = %execution.id, path = %path.display(), "report written to outbox");
        Ok(())
    }
}
