mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{
    create_family, monthly_schedule, parse_date, test_service, utc, FailingDelivery,
    RecordingDelivery,
};
use hearth::application::{
    AppError, ExecutorConfig, OutboxDelivery, ScheduleUpdate,
};
use hearth::domain::{
    DeliveryStatus, ExecutionStatus, ReportType, ScheduleFrequency, ScheduleStatus,
};

#[tokio::test]
async fn test_monthly_schedule_execution_chain() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Monthly cash flow", ReportType::CashFlow),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;
    assert_eq!(schedule.status, ScheduleStatus::Active);
    assert_eq!(schedule.next_execution, utc(2024, 2, 1, 9, 0));

    let delivery = Arc::new(RecordingDelivery::default());
    let executor = service.executor(delivery.clone(), ExecutorConfig::default());

    // nothing is due yet
    let early = executor.run_due(utc(2024, 1, 31, 23, 0)).await?;
    assert!(early.executed.is_empty());

    let summary = executor.run_due(utc(2024, 2, 1, 9, 0)).await?;
    assert_eq!(summary.executed.len(), 1);
    assert_eq!(summary.completed(), 1);
    let outcome = &summary.executed[0];
    assert_eq!(outcome.schedule_id, schedule.id);
    assert_eq!(outcome.status, ExecutionStatus::Completed);
    assert_eq!(outcome.delivery_status, DeliveryStatus::Sent);

    let advanced = service.get_schedule(schedule.id).await?;
    assert_eq!(advanced.next_execution, utc(2024, 3, 1, 9, 0));
    assert_eq!(advanced.last_execution, Some(utc(2024, 2, 1, 9, 0)));
    assert_eq!(advanced.status, ScheduleStatus::Active);

    let history = service.schedule_history(schedule.id, 10).await?;
    assert_eq!(history.len(), 1);
    let execution = &history[0];
    assert_eq!(execution.period_start, parse_date("2024-01-01"));
    assert_eq!(execution.period_end, parse_date("2024-01-31"));
    assert_eq!(execution.status, ExecutionStatus::Completed);
    let data = execution.report_data.as_ref().expect("completed run keeps its data");
    assert_eq!(data["report_type"], "cash_flow");

    assert_eq!(delivery.count(), 1);
    let delivered = delivery.delivered.lock().unwrap();
    assert_eq!(delivered[0].0, execution.id);
    assert_eq!(delivered[0].1, vec!["parents@example.com".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_failed_aggregation_stops_schedule() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Broken", ReportType::CashFlow),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;

    sqlx::query("DROP TABLE expenses")
        .execute(service.repository().pool())
        .await?;

    let delivery = Arc::new(RecordingDelivery::default());
    let executor = service.executor(delivery.clone(), ExecutorConfig::default());
    let summary = executor.run_due(utc(2024, 2, 1, 9, 0)).await?;
    assert_eq!(summary.failed(), 1);
    assert!(summary.executed[0].error.is_some());

    let stopped = service.get_schedule(schedule.id).await?;
    assert_eq!(stopped.status, ScheduleStatus::Error);
    // a failed run never advances the schedule
    assert_eq!(stopped.next_execution, utc(2024, 2, 1, 9, 0));
    assert_eq!(stopped.last_execution, None);

    let history = service.schedule_history(schedule.id, 10).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Failed);
    assert!(history[0].report_data.is_none());
    assert!(history[0].error.as_deref().unwrap().contains("aggregation"));
    assert_eq!(delivery.count(), 0);

    // failed schedules are skipped until reactivated
    let later = executor.run_due(utc(2024, 2, 2, 9, 0)).await?;
    assert!(later.executed.is_empty());

    let overview = service.list_schedules(family).await?;
    assert!(overview[0].last_error().is_some());

    let resumed = service.resume_schedule(schedule.id, utc(2024, 2, 3, 0, 0)).await?;
    assert_eq!(resumed.status, ScheduleStatus::Active);
    assert_eq!(resumed.next_execution, utc(2024, 3, 1, 9, 0));

    Ok(())
}

#[tokio::test]
async fn test_delivery_failure_keeps_execution_completed() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Net worth", ReportType::NetWorth),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;

    let executor = service.executor(Arc::new(FailingDelivery), ExecutorConfig::default());
    let summary = executor.run_due(utc(2024, 2, 1, 9, 30)).await?;
    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.executed[0].delivery_status, DeliveryStatus::Failed);

    let history = service.schedule_history(schedule.id, 10).await?;
    assert_eq!(history[0].status, ExecutionStatus::Completed);
    assert_eq!(history[0].delivery_status, DeliveryStatus::Failed);
    assert!(history[0]
        .delivery_error
        .as_deref()
        .unwrap()
        .contains("mail server unreachable"));
    assert!(history[0].delivered_at.is_none());

    let advanced = service.get_schedule(schedule.id).await?;
    assert_eq!(advanced.status, ScheduleStatus::Active);
    assert_eq!(advanced.next_execution, utc(2024, 3, 1, 9, 0));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_passes_execute_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Spending", ReportType::SpendingAnalysis),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;

    let delivery = Arc::new(RecordingDelivery::default());
    let first = service.executor(delivery.clone(), ExecutorConfig::default());
    let second = service.executor(delivery.clone(), ExecutorConfig::default());

    let now = utc(2024, 2, 1, 9, 0);
    let (a, b) = tokio::join!(first.run_due(now), second.run_due(now));
    let (a, b) = (a?, b?);
    assert_eq!(a.executed.len() + b.executed.len(), 1);

    assert_eq!(service.schedule_history(schedule.id, 10).await?.len(), 1);
    assert_eq!(delivery.count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_live_claim_blocks_other_workers() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Budget", ReportType::BudgetPerformance),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;

    let now = utc(2024, 2, 1, 9, 0);
    let repo = service.repository();
    let stale_before = now - chrono::Duration::minutes(30);
    assert!(repo.claim_due_scheduled_report(schedule.id, now, stale_before).await?);
    assert!(!repo.claim_due_scheduled_report(schedule.id, now, stale_before).await?);

    let delivery = Arc::new(RecordingDelivery::default());
    let executor = service.executor(delivery.clone(), ExecutorConfig::default());
    let blocked = executor.run_due(now + chrono::Duration::minutes(5)).await?;
    assert!(blocked.executed.is_empty());

    // a claim older than the timeout is treated as abandoned
    let recovered = executor.run_due(now + chrono::Duration::hours(1)).await?;
    assert_eq!(recovered.completed(), 1);

    Ok(())
}

#[tokio::test]
async fn test_pause_and_resume() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Savings", ReportType::SavingsRate),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;

    let paused = service.pause_schedule(schedule.id, utc(2024, 1, 20, 0, 0)).await?;
    assert_eq!(paused.status, ScheduleStatus::Paused);

    let executor = service.executor(Arc::new(RecordingDelivery::default()), ExecutorConfig::default());
    let summary = executor.run_due(utc(2024, 2, 1, 9, 0)).await?;
    assert!(summary.executed.is_empty());

    // missed slots are not replayed
    let resumed = service.resume_schedule(schedule.id, utc(2024, 2, 15, 0, 0)).await?;
    assert_eq!(resumed.status, ScheduleStatus::Active);
    assert_eq!(resumed.next_execution, utc(2024, 3, 1, 9, 0));

    Ok(())
}

#[tokio::test]
async fn test_edits_during_a_run_are_kept() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Cash flow", ReportType::CashFlow),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;

    let now = utc(2024, 2, 1, 9, 0);
    let repo = service.repository();
    assert!(repo.claim_due_scheduled_report(schedule.id, now, now - chrono::Duration::minutes(30)).await?);

    // the household pauses and renames the schedule while it is claimed
    service.pause_schedule(schedule.id, now).await?;
    let update = ScheduleUpdate {
        name: Some("Monthly cash flow".into()),
        recipients: Some(vec!["grandma@example.com".into()]),
        ..Default::default()
    };
    service.update_schedule(schedule.id, update, now).await?;

    let delivery = Arc::new(RecordingDelivery::default());
    let executor = service.executor(delivery.clone(), ExecutorConfig::default());
    let outcome = executor.execute_claimed(schedule.id, now).await?;
    assert_eq!(outcome.status, ExecutionStatus::Completed);

    let after = service.get_schedule(schedule.id).await?;
    assert_eq!(after.status, ScheduleStatus::Paused);
    assert_eq!(after.name, "Monthly cash flow");
    assert_eq!(after.recipients, vec!["grandma@example.com".to_string()]);
    assert_eq!(after.next_execution, utc(2024, 3, 1, 9, 0));
    assert_eq!(after.last_execution, Some(now));

    let delivered = delivery.delivered.lock().unwrap();
    assert_eq!(delivered[0].1, vec!["grandma@example.com".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_failure_during_pause_keeps_pause() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Broken", ReportType::CashFlow),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;
    sqlx::query("DROP TABLE expenses")
        .execute(service.repository().pool())
        .await?;

    let now = utc(2024, 2, 1, 9, 0);
    let repo = service.repository();
    assert!(repo.claim_due_scheduled_report(schedule.id, now, now - chrono::Duration::minutes(30)).await?);
    service.pause_schedule(schedule.id, now).await?;

    let executor = service.executor(Arc::new(RecordingDelivery::default()), ExecutorConfig::default());
    let outcome = executor.execute_claimed(schedule.id, now).await?;
    assert_eq!(outcome.status, ExecutionStatus::Failed);

    let after = service.get_schedule(schedule.id).await?;
    assert_eq!(after.status, ScheduleStatus::Paused);
    assert_eq!(after.next_execution, utc(2024, 2, 1, 9, 0));

    Ok(())
}

#[tokio::test]
async fn test_completion_is_stored_with_the_advance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Savings", ReportType::SavingsRate),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;

    // an unusable delivery hour makes the advance fail after aggregation
    sqlx::query("UPDATE scheduled_reports SET delivery_hour = 99 WHERE id = ?")
        .bind(schedule.id.to_string())
        .execute(service.repository().pool())
        .await?;

    let delivery = Arc::new(RecordingDelivery::default());
    let executor = service.executor(delivery.clone(), ExecutorConfig::default());
    let now = utc(2024, 2, 1, 9, 0);
    assert!(executor.run_due(now).await.is_err());

    // the execution was not recorded as completed, so the period is not lost
    let history = service.schedule_history(schedule.id, 10).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Running);
    assert!(history[0].report_data.is_none());

    let after = service.get_schedule(schedule.id).await?;
    assert_eq!(after.next_execution, utc(2024, 2, 1, 9, 0));
    assert_eq!(after.last_execution, None);
    assert_eq!(delivery.count(), 0);

    // the claim was released
    let repo = service.repository();
    assert!(repo.claim_due_scheduled_report(schedule.id, now, now - chrono::Duration::minutes(30)).await?);

    Ok(())
}

#[tokio::test]
async fn test_run_now_writes_outbox_file() -> Result<()> {
    let (service, temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Summary", ReportType::MonthlySummary),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;

    let outbox = Arc::new(OutboxDelivery::new(temp.path().join("outbox")));
    let executor = service.executor(outbox.clone(), ExecutorConfig::default());
    let outcome = executor
        .run_now(schedule.id, utc(2024, 1, 10, 12, 0))
        .await?
        .expect("schedule should run");
    assert_eq!(outcome.status, ExecutionStatus::Completed);
    assert_eq!(outcome.delivery_status, DeliveryStatus::Sent);

    let path = outbox.path_for(outcome.execution_id.unwrap());
    let envelope: serde_json::Value = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert_eq!(envelope["schedule_name"], "Summary");
    assert_eq!(envelope["report"]["report_type"], "monthly_summary");
    assert_eq!(envelope["recipients"][0], "parents@example.com");
    assert_eq!(envelope["period_start"], "2024-01-01");
    assert_eq!(envelope["period_end"], "2024-01-09");

    Ok(())
}

#[tokio::test]
async fn test_weekly_schedule_in_local_timezone() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    let mut request = monthly_schedule(family, "Weekly spending", ReportType::SpendingAnalysis);
    request.frequency = ScheduleFrequency::Weekly;
    request.delivery_day = Some(1);
    request.delivery_hour = 8;
    request.timezone = "America/New_York".into();

    // Wednesday 2024-01-03
    let schedule = service.create_schedule(request, utc(2024, 1, 3, 12, 0)).await?;
    // Monday 08:00 EST
    assert_eq!(schedule.next_execution, utc(2024, 1, 8, 13, 0));

    let executor = service.executor(Arc::new(RecordingDelivery::default()), ExecutorConfig::default());
    executor.run_due(utc(2024, 1, 8, 13, 0)).await?;

    let history = service.schedule_history(schedule.id, 10).await?;
    assert_eq!(history[0].period_start, parse_date("2024-01-01"));
    assert_eq!(history[0].period_end, parse_date("2024-01-07"));
    assert_eq!(
        service.get_schedule(schedule.id).await?.next_execution,
        utc(2024, 1, 15, 13, 0)
    );

    Ok(())
}

#[tokio::test]
async fn test_schedule_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let now = utc(2024, 1, 5, 10, 0);

    let mut bad_recipient = monthly_schedule(family, "A", ReportType::CashFlow);
    bad_recipient.recipients = vec!["not-an-address".into()];
    assert!(matches!(
        service.create_schedule(bad_recipient, now).await,
        Err(AppError::InvalidRecipient(_))
    ));

    let mut bad_hour = monthly_schedule(family, "B", ReportType::CashFlow);
    bad_hour.delivery_hour = 24;
    assert!(matches!(
        service.create_schedule(bad_hour, now).await,
        Err(AppError::InvalidScheduleParameter(_))
    ));

    let mut bad_weekday = monthly_schedule(family, "C", ReportType::CashFlow);
    bad_weekday.frequency = ScheduleFrequency::Weekly;
    bad_weekday.delivery_day = Some(7);
    assert!(matches!(
        service.create_schedule(bad_weekday, now).await,
        Err(AppError::InvalidScheduleParameter(_))
    ));

    let mut bad_zone = monthly_schedule(family, "D", ReportType::CashFlow);
    bad_zone.timezone = "Mars/Olympus".into();
    assert!(matches!(
        service.create_schedule(bad_zone, now).await,
        Err(AppError::InvalidScheduleParameter(_))
    ));

    service
        .create_schedule(monthly_schedule(family, "E", ReportType::CashFlow), now)
        .await?;
    assert!(matches!(
        service
            .create_schedule(monthly_schedule(family, "E", ReportType::NetWorth), now)
            .await,
        Err(AppError::ScheduledReportAlreadyExists(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_schedule() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let schedule = service
        .create_schedule(
            monthly_schedule(family, "Income", ReportType::IncomeAnalysis),
            utc(2024, 1, 5, 10, 0),
        )
        .await?;

    let update = ScheduleUpdate {
        recipients: Some(vec![" Mum@Example.com ".into(), "mum@example.com".into()]),
        delivery_day: Some(15),
        ..Default::default()
    };
    let updated = service
        .update_schedule(schedule.id, update, utc(2024, 1, 6, 0, 0))
        .await?;
    assert_eq!(updated.recipients, vec!["mum@example.com".to_string()]);
    assert_eq!(updated.next_execution, utc(2024, 2, 15, 9, 0));

    let stored = service.get_schedule(schedule.id).await?;
    assert_eq!(stored.recipients, updated.recipients);
    assert_eq!(stored.delivery_day, Some(15));

    service.delete_schedule(schedule.id).await?;
    assert!(matches!(
        service.get_schedule(schedule.id).await,
        Err(AppError::ScheduledReportNotFound(_))
    ));
    assert!(matches!(
        service.delete_schedule(schedule.id).await,
        Err(AppError::ScheduledReportNotFound(_))
    ));

    Ok(())
}
