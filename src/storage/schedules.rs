use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteExecutor};

use crate::domain::{
    DeliveryStatus, ExecutionId, ExecutionStatus, FamilyId, ReportParameters, ReportType,
    ScheduleFrequency, ScheduleStatus, ScheduledReport, ScheduledReportExecution,
    ScheduledReportId,
};

use super::repository::{day, parse_day, parse_opt, parse_ts, parse_uuid, ts};
use super::Repository;

const REPORT_COLUMNS: &str = "id, family_id, name, report_type, frequency, recipients, parameters, delivery_day, delivery_hour, timezone, status, next_execution, last_execution, created_at, updated_at";
const EXECUTION_COLUMNS: &str = "id, scheduled_report_id, status, period_start, period_end, report_data, error, delivery_status, delivery_error, started_at, completed_at, delivered_at";

impl Repository {
    // ========================
    // Scheduled report operations
    // ========================

    pub async fn save_scheduled_report(&self, report: &ScheduledReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_reports (id, family_id, name, report_type, frequency, recipients, parameters, delivery_day, delivery_hour, timezone, status, next_execution, last_execution, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.id.to_string())
        .bind(report.family_id.to_string())
        .bind(&report.name)
        .bind(report.report_type.as_str())
        .bind(report.frequency.as_str())
        .bind(serde_json::to_string(&report.recipients)?)
        .bind(serde_json::to_string(&report.parameters)?)
        .bind(report.delivery_day.map(i64::from))
        .bind(i64::from(report.delivery_hour))
        .bind(&report.timezone)
        .bind(report.status.as_str())
        .bind(ts(report.next_execution))
        .bind(report.last_execution.map(ts))
        .bind(ts(report.created_at))
        .bind(ts(report.updated_at))
        .execute(&self.pool)
        .await
        .context("Failed to save scheduled report")?;
        Ok(())
    }

    /// Persist a schedule's configuration, status and next slot. The claim and
    /// `last_execution` belong to the executor and are left untouched.
    pub async fn update_scheduled_report(&self, report: &ScheduledReport) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_reports
            SET name = ?, report_type = ?, frequency = ?, recipients = ?, parameters = ?,
                delivery_day = ?, delivery_hour = ?, timezone = ?, status = ?,
                next_execution = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&report.name)
        .bind(report.report_type.as_str())
        .bind(report.frequency.as_str())
        .bind(serde_json::to_string(&report.recipients)?)
        .bind(serde_json::to_string(&report.parameters)?)
        .bind(report.delivery_day.map(i64::from))
        .bind(i64::from(report.delivery_hour))
        .bind(&report.timezone)
        .bind(report.status.as_str())
        .bind(ts(report.next_execution))
        .bind(ts(report.updated_at))
        .bind(report.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update scheduled report")?;
        Ok(())
    }

    /// Change only a schedule's status. Returns false if it does not exist.
    pub async fn set_scheduled_report_status(
        &self,
        id: ScheduledReportId,
        status: ScheduleStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE scheduled_reports SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(ts(now))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update scheduled report status")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_scheduled_report(&self, id: ScheduledReportId) -> Result<Option<ScheduledReport>> {
        Self::fetch_scheduled_report(&self.pool, id).await
    }

    async fn fetch_scheduled_report<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: ScheduledReportId,
    ) -> Result<Option<ScheduledReport>> {
        let query = format!("SELECT {} FROM scheduled_reports WHERE id = ?", REPORT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(executor)
            .await
            .context("Failed to fetch scheduled report")?;

        row.as_ref().map(Self::row_to_scheduled_report).transpose()
    }

    /// Finish a successful run: store the completed execution and move the
    /// schedule to its next slot in one transaction.
    ///
    /// The next slot is computed from the schedule as stored now, and only
    /// `next_execution`, `last_execution` and `updated_at` are written, so
    /// edits made while the report was running are kept.
    pub async fn complete_scheduled_run(
        &self,
        execution: &ScheduledReportExecution,
        executed_at: DateTime<Utc>,
    ) -> Result<ScheduledReport> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin schedule completion transaction")?;

        Self::write_execution(&mut *tx, execution).await?;

        let mut report = Self::fetch_scheduled_report(&mut *tx, execution.scheduled_report_id)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!("Scheduled report not found: {}", execution.scheduled_report_id)
            })?;
        report.advance(executed_at)?;

        sqlx::query(
            r#"
            UPDATE scheduled_reports
            SET next_execution = ?, last_execution = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(ts(report.next_execution))
        .bind(report.last_execution.map(ts))
        .bind(ts(report.updated_at))
        .bind(report.id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to advance scheduled report")?;

        tx.commit()
            .await
            .context("Failed to commit schedule completion transaction")?;
        Ok(report)
    }

    /// Stop an active schedule after a failed run. A schedule paused or
    /// completed in the meantime keeps its status. Returns true if it changed.
    pub async fn mark_scheduled_report_error(
        &self,
        id: ScheduledReportId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_reports
            SET status = 'error', updated_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(ts(now))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to mark scheduled report as failed")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list_scheduled_reports(&self, family_id: FamilyId) -> Result<Vec<ScheduledReport>> {
        let query = format!(
            "SELECT {} FROM scheduled_reports WHERE family_id = ? ORDER BY next_execution",
            REPORT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(family_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list scheduled reports")?;

        rows.iter().map(Self::row_to_scheduled_report).collect()
    }

    pub async fn delete_scheduled_report(&self, id: ScheduledReportId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduled_reports WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete scheduled report")?;
        Ok(result.rows_affected() > 0)
    }

    /// Active schedules due at `now` that nobody holds a live claim on.
    ///
    /// Claims taken before `stale_before` are considered abandoned.
    pub async fn list_due_scheduled_reports(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<ScheduledReport>> {
        let query = format!(
            r#"
            SELECT {} FROM scheduled_reports
            WHERE status = 'active'
              AND next_execution <= ?
              AND (claimed_at IS NULL OR claimed_at < ?)
            ORDER BY next_execution
            "#,
            REPORT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(ts(now))
            .bind(ts(stale_before))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list due scheduled reports")?;

        rows.iter().map(Self::row_to_scheduled_report).collect()
    }

    /// Atomically take the right to execute a due schedule.
    ///
    /// Returns false when the schedule is no longer due or another worker
    /// holds a live claim. Only one caller can win for a given slot.
    pub async fn claim_due_scheduled_report(
        &self,
        id: ScheduledReportId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_reports
            SET claimed_at = ?
            WHERE id = ?
              AND status = 'active'
              AND next_execution <= ?
              AND (claimed_at IS NULL OR claimed_at < ?)
            "#,
        )
        .bind(ts(now))
        .bind(id.to_string())
        .bind(ts(now))
        .bind(ts(stale_before))
        .execute(&self.pool)
        .await
        .context("Failed to claim scheduled report")?;

        Ok(result.rows_affected() == 1)
    }

    /// Claim a schedule for an on-demand run, regardless of its next slot.
    pub async fn claim_scheduled_report(
        &self,
        id: ScheduledReportId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_reports
            SET claimed_at = ?
            WHERE id = ?
              AND status != 'completed'
              AND (claimed_at IS NULL OR claimed_at < ?)
            "#,
        )
        .bind(ts(now))
        .bind(id.to_string())
        .bind(ts(stale_before))
        .execute(&self.pool)
        .await
        .context("Failed to claim scheduled report")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn release_scheduled_report(&self, id: ScheduledReportId) -> Result<()> {
        sqlx::query("UPDATE scheduled_reports SET claimed_at = NULL WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to release scheduled report claim")?;
        Ok(())
    }

    fn row_to_scheduled_report(row: &sqlx::sqlite::SqliteRow) -> Result<ScheduledReport> {
        let report_type_str: String = row.get("report_type");
        let frequency_str: String = row.get("frequency");
        let status_str: String = row.get("status");
        let recipients: String = row.get("recipients");
        let parameters: String = row.get("parameters");

        Ok(ScheduledReport {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            family_id: parse_uuid(&row.get::<String, _>("family_id"))?,
            name: row.get("name"),
            report_type: ReportType::from_str(&report_type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid report type: {}", report_type_str))?,
            frequency: ScheduleFrequency::from_str(&frequency_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid schedule frequency: {}", frequency_str))?,
            recipients: serde_json::from_str(&recipients).context("Invalid recipients column")?,
            parameters: serde_json::from_str::<ReportParameters>(&parameters)
                .context("Invalid parameters column")?,
            delivery_day: row
                .get::<Option<i64>, _>("delivery_day")
                .map(u32::try_from)
                .transpose()
                .context("Invalid delivery day")?,
            delivery_hour: u32::try_from(row.get::<i64, _>("delivery_hour"))
                .context("Invalid delivery hour")?,
            timezone: row.get("timezone"),
            status: ScheduleStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid schedule status: {}", status_str))?,
            next_execution: parse_ts(&row.get::<String, _>("next_execution"))?,
            last_execution: parse_opt(row, "last_execution", parse_ts)?,
            created_at: parse_ts(&row.get::<String, _>("created_at"))?,
            updated_at: parse_ts(&row.get::<String, _>("updated_at"))?,
        })
    }

    // ========================
    // Execution operations
    // ========================

    pub async fn save_execution(&self, execution: &ScheduledReportExecution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_report_executions (id, scheduled_report_id, status, period_start, period_end, report_data, error, delivery_status, delivery_error, started_at, completed_at, delivered_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(execution.id.to_string())
        .bind(execution.scheduled_report_id.to_string())
        .bind(execution.status.as_str())
        .bind(day(execution.period_start))
        .bind(day(execution.period_end))
        .bind(execution.report_data.as_ref().map(|v| v.to_string()))
        .bind(&execution.error)
        .bind(execution.delivery_status.as_str())
        .bind(&execution.delivery_error)
        .bind(ts(execution.started_at))
        .bind(execution.completed_at.map(ts))
        .bind(execution.delivered_at.map(ts))
        .execute(&self.pool)
        .await
        .context("Failed to save execution")?;
        Ok(())
    }

    pub async fn update_execution(&self, execution: &ScheduledReportExecution) -> Result<()> {
        Self::write_execution(&self.pool, execution).await
    }

    async fn write_execution<'e, E: SqliteExecutor<'e>>(
        executor: E,
        execution: &ScheduledReportExecution,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_report_executions
            SET status = ?, report_data = ?, error = ?, delivery_status = ?, delivery_error = ?,
                completed_at = ?, delivered_at = ?
            WHERE id = ?
            "#,
        )
        .bind(execution.status.as_str())
        .bind(execution.report_data.as_ref().map(|v| v.to_string()))
        .bind(&execution.error)
        .bind(execution.delivery_status.as_str())
        .bind(&execution.delivery_error)
        .bind(execution.completed_at.map(ts))
        .bind(execution.delivered_at.map(ts))
        .bind(execution.id.to_string())
        .execute(executor)
        .await
        .context("Failed to update execution")?;
        Ok(())
    }

    pub async fn get_execution(&self, id: ExecutionId) -> Result<Option<ScheduledReportExecution>> {
        let query = format!(
            "SELECT {} FROM scheduled_report_executions WHERE id = ?",
            EXECUTION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch execution")?;

        row.as_ref().map(Self::row_to_execution).transpose()
    }

    /// Executions of a schedule, newest first.
    pub async fn list_executions(
        &self,
        scheduled_report_id: ScheduledReportId,
        limit: u32,
    ) -> Result<Vec<ScheduledReportExecution>> {
        let query = format!(
            "SELECT {} FROM scheduled_report_executions WHERE scheduled_report_id = ? ORDER BY started_at DESC LIMIT ?",
            EXECUTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(scheduled_report_id.to_string())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list executions")?;

        rows.iter().map(Self::row_to_execution).collect()
    }

    fn row_to_execution(row: &sqlx::sqlite::SqliteRow) -> Result<ScheduledReportExecution> {
        let status_str: String = row.get("status");
        let delivery_str: String = row.get("delivery_status");

        Ok(ScheduledReportExecution {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            scheduled_report_id: parse_uuid(&row.get::<String, _>("scheduled_report_id"))?,
            status: ExecutionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid execution status: {}", status_str))?,
            period_start: parse_day(&row.get::<String, _>("period_start"))?,
            period_end: parse_day(&row.get::<String, _>("period_end"))?,
            report_data: parse_opt(row, "report_data", |s| {
                serde_json::from_str(s).context("Invalid report data")
            })?,
            error: row.get("error"),
            delivery_status: DeliveryStatus::from_str(&delivery_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid delivery status: {}", delivery_str))?,
            delivery_error: row.get("delivery_error"),
            started_at: parse_ts(&row.get::<String, _>("started_at"))?,
            completed_at: parse_opt(row, "completed_at", parse_ts)?,
            delivered_at: parse_opt(row, "delivered_at", parse_ts)?,
        })
    }
}
