// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use hearth::application::{HouseholdService, NewSchedule, ReportDelivery};
use hearth::domain::{
    ExecutionId, FamilyId, ReportParameters, ReportType, ScheduleFrequency, ScheduledReport,
    ScheduledReportExecution,
};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(HouseholdService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = HouseholdService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into a NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Helper to build a UTC instant
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

/// Helper to parse an amount literal
pub fn money(amount: &str) -> Decimal {
    amount.parse().unwrap()
}

/// Test fixture: a family with nothing recorded yet
pub async fn create_family(service: &HouseholdService) -> Result<FamilyId> {
    Ok(service.create_family("Test Household".into()).await?.id)
}

/// Monthly schedule delivered on the 1st at 09:00 UTC
pub fn monthly_schedule(family_id: FamilyId, name: &str, report_type: ReportType) -> NewSchedule {
    NewSchedule {
        family_id,
        name: name.into(),
        report_type,
        frequency: ScheduleFrequency::Monthly,
        delivery_day: Some(1),
        delivery_hour: 9,
        timezone: "UTC".into(),
        recipients: vec!["parents@example.com".into()],
        parameters: ReportParameters::default(),
    }
}

/// Delivery that records what it was handed
#[derive(Default)]
pub struct RecordingDelivery {
    pub delivered: Mutex<Vec<(ExecutionId, Vec<String>)>>,
}

impl RecordingDelivery {
    pub fn count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl ReportDelivery for RecordingDelivery {
    async fn deliver(
        &self,
        execution: &ScheduledReportExecution,
        _schedule: &ScheduledReport,
        recipients: &[String],
    ) -> Result<()> {
        self.delivered
            .lock()
            .unwrap()
            .push((execution.id, recipients.to_vec()));
        Ok(())
    }
}

/// Delivery whose channel is always down
pub struct FailingDelivery;

#[async_trait]
impl ReportDelivery for FailingDelivery {
    async fn deliver(
        &self,
        _execution: &ScheduledReportExecution,
        _schedule: &ScheduledReport,
        _recipients: &[String],
    ) -> Result<()> {
        bail!("mail server unreachable")
    }
}
