mod common;

use anyhow::Result;
use common::{create_family, money, parse_date, test_service};
use hearth::application::AppError;
use hearth::domain::{Frequency, IncomeStatus, PaymentStatus, PaymentType};
use uuid::Uuid;

#[tokio::test]
async fn test_receive_recurring_income_schedules_next() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    let salary = service
        .add_income(
            family,
            "Salary".into(),
            money("3000"),
            parse_date("2024-01-31"),
            Frequency::Monthly,
        )
        .await?;
    assert_eq!(salary.next_occurrence, Some(parse_date("2024-02-29")));

    let receipt = service
        .receive_income(salary.id, parse_date("2024-01-31"), money("2950"))
        .await?;
    assert_eq!(receipt.event.status, IncomeStatus::Received);
    assert_eq!(receipt.event.actual_amount, Some(money("2950")));

    let next = receipt.next.expect("monthly income should recur");
    assert_eq!(next.scheduled_date, parse_date("2024-02-29"));
    assert_eq!(next.amount, money("3000"));
    assert_eq!(next.status, IncomeStatus::Scheduled);
    // month end keeps returning to month end
    assert_eq!(next.next_occurrence, Some(parse_date("2024-03-31")));

    // correcting a receipt does not spawn a second instance
    let again = service
        .receive_income(salary.id, parse_date("2024-02-01"), money("3000"))
        .await?;
    assert!(again.next.is_none());
    assert_eq!(service.list_income(family).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_one_time_income_does_not_recur() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    let bonus = service
        .add_income(
            family,
            "Bonus".into(),
            money("500"),
            parse_date("2024-06-15"),
            Frequency::OneTime,
        )
        .await?;
    assert_eq!(bonus.next_occurrence, None);

    let receipt = service
        .receive_income(bonus.id, parse_date("2024-06-14"), money("500"))
        .await?;
    assert!(receipt.next.is_none());

    Ok(())
}

#[tokio::test]
async fn test_cancelled_income_cannot_be_received() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    let income = service
        .add_income(
            family,
            "Freelance".into(),
            money("800"),
            parse_date("2024-03-10"),
            Frequency::OneTime,
        )
        .await?;
    let cancelled = service.cancel_income(income.id).await?;
    assert_eq!(cancelled.status, IncomeStatus::Cancelled);

    let result = service
        .receive_income(income.id, parse_date("2024-03-10"), money("800"))
        .await;
    assert!(matches!(result, Err(AppError::RecordCancelled(_))));

    Ok(())
}

#[tokio::test]
async fn test_income_validation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    let zero = service
        .add_income(
            family,
            "Nothing".into(),
            money("0"),
            parse_date("2024-01-01"),
            Frequency::OneTime,
        )
        .await;
    assert!(matches!(zero, Err(AppError::InvalidAmount(_))));

    let unknown_family = service
        .add_income(
            Uuid::new_v4(),
            "Salary".into(),
            money("100"),
            parse_date("2024-01-01"),
            Frequency::OneTime,
        )
        .await;
    assert!(matches!(unknown_family, Err(AppError::FamilyNotFound(_))));

    let missing = service.get_income(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::IncomeEventNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_overdue_is_derived_from_due_date() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    let rent = service
        .add_payment(
            family,
            "Landlord".into(),
            money("1200"),
            parse_date("2024-03-01"),
            PaymentType::Once,
            Frequency::OneTime,
            Some("Housing".into()),
        )
        .await?;

    let before = service
        .get_payment_details(rent.id, parse_date("2024-03-01"))
        .await?;
    assert_eq!(before.status, PaymentStatus::Scheduled);

    let listed = service.list_payments(family, parse_date("2024-03-05")).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, PaymentStatus::Overdue);
    assert_eq!(listed[0].remaining, money("1200"));

    // the stored record never says overdue
    let stored = service.get_payment(rent.id).await?;
    assert_eq!(stored.state, PaymentStatus::Scheduled);

    service.pay_payment(rent.id, parse_date("2024-03-06"), None).await?;
    let after = service
        .get_payment_details(rent.id, parse_date("2024-03-10"))
        .await?;
    assert_eq!(after.status, PaymentStatus::Paid);
    assert_eq!(after.payment.paid_amount, Some(money("1200")));

    Ok(())
}

#[tokio::test]
async fn test_pay_recurring_payment_schedules_next() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    let insurance = service
        .add_payment(
            family,
            "Insurer".into(),
            money("90"),
            parse_date("2024-01-31"),
            PaymentType::Recurring,
            Frequency::Monthly,
            Some("Insurance".into()),
        )
        .await?;

    let receipt = service
        .pay_payment(insurance.id, parse_date("2024-01-30"), Some(money("92.50")))
        .await?;
    assert_eq!(receipt.payment.paid_amount, Some(money("92.50")));

    let next = receipt.next.expect("recurring payment should recur");
    assert_eq!(next.due_date, parse_date("2024-02-29"));
    assert_eq!(next.amount, money("90"));
    assert_eq!(next.category.as_deref(), Some("Insurance"));
    assert_eq!(next.next_due_date, Some(parse_date("2024-03-31")));

    let second = service
        .pay_payment(insurance.id, parse_date("2024-01-31"), None)
        .await?;
    assert!(second.next.is_none());
    assert_eq!(service.list_payments(family, parse_date("2024-02-01")).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_cancelled_payment_cannot_be_paid() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;

    let gym = service
        .add_payment(
            family,
            "Gym".into(),
            money("40"),
            parse_date("2024-04-01"),
            PaymentType::Recurring,
            Frequency::Monthly,
            None,
        )
        .await?;
    service.cancel_payment(gym.id).await?;

    let result = service.pay_payment(gym.id, parse_date("2024-04-01"), None).await;
    assert!(matches!(result, Err(AppError::RecordCancelled(_))));

    Ok(())
}

#[tokio::test]
async fn test_delete_family_removes_everything() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let family = create_family(&service).await?;
    let other = service.create_family("Neighbours".into()).await?.id;

    let income = service
        .add_income(
            family,
            "Salary".into(),
            money("2000"),
            parse_date("2024-05-01"),
            Frequency::Monthly,
        )
        .await?;
    let payment = service
        .add_payment(
            family,
            "Utility".into(),
            money("150"),
            parse_date("2024-05-10"),
            PaymentType::Once,
            Frequency::OneTime,
            None,
        )
        .await?;
    let attribution = service.attribute(payment.id, income.id, money("150")).await?;
    service
        .add_income(
            other,
            "Salary".into(),
            money("1000"),
            parse_date("2024-05-01"),
            Frequency::OneTime,
        )
        .await?;

    service.delete_family(family).await?;

    assert!(matches!(
        service.get_family(family).await,
        Err(AppError::FamilyNotFound(_))
    ));
    assert!(matches!(
        service.get_income(income.id).await,
        Err(AppError::IncomeEventNotFound(_))
    ));
    assert!(matches!(
        service.get_payment(payment.id).await,
        Err(AppError::PaymentNotFound(_))
    ));
    assert!(service.repository().get_attribution(attribution.id).await?.is_none());

    // other families are untouched
    assert_eq!(service.list_income(other).await?.len(), 1);

    let again = service.delete_family(family).await;
    assert!(matches!(again, Err(AppError::FamilyNotFound(_))));

    Ok(())
}
