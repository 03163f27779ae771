use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    validate_attribution, validate_receipt, Account, AccountType, Attribution, AttributionId, AttributionType,
    BudgetAllocation, DateRange, Expense, Family, FamilyId, Frequency, IncomeEvent, IncomeEventId,
    IncomeStatus, Money, Payment, PaymentId, PaymentStatus, PaymentType,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_SCHEDULED_REPORTS};

const INCOME_COLUMNS: &str = "id, family_id, source, amount, scheduled_date, actual_date, actual_amount, frequency, next_occurrence, status, created_at";
const PAYMENT_COLUMNS: &str = "id, family_id, payee, category, amount, due_date, paid_date, paid_amount, payment_type, frequency, next_due_date, state, created_at";
const ATTRIBUTION_COLUMNS: &str = "id, payment_id, income_event_id, amount, attribution_type, created_at";
const EXPENSE_COLUMNS: &str = "id, family_id, account_id, date, amount, category, merchant, description, created_at";
const BUDGET_COLUMNS: &str = "id, family_id, category, amount, period_start, period_end, created_at";
const ACCOUNT_COLUMNS: &str = "id, family_id, name, account_type, balance, updated_at";

/// Repository for persisting and querying household records.
///
/// Every report query is scoped to one family and bounded by a date range.
/// Cloning is cheap: clones share the same connection pool.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_SCHEDULED_REPORTS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Family operations
    // ========================

    pub async fn save_family(&self, family: &Family) -> Result<()> {
        sqlx::query("INSERT INTO families (id, name, created_at) VALUES (?, ?, ?)")
            .bind(family.id.to_string())
            .bind(&family.name)
            .bind(ts(family.created_at))
            .execute(&self.pool)
            .await
            .context("Failed to save family")?;
        Ok(())
    }

    pub async fn get_family(&self, id: FamilyId) -> Result<Option<Family>> {
        let row = sqlx::query("SELECT id, name, created_at FROM families WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch family")?;

        row.map(|row| {
            Ok(Family {
                id: parse_uuid(&row.get::<String, _>("id"))?,
                name: row.get("name"),
                created_at: parse_ts(&row.get::<String, _>("created_at"))?,
            })
        })
        .transpose()
    }

    /// Delete a family and, by cascade, everything it owns.
    pub async fn delete_family(&self, id: FamilyId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM families WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete family")?;
        Ok(result.rows_affected() > 0)
    }

    // ========================
    // Income operations
    // ========================

    pub async fn save_income_event(&self, event: &IncomeEvent) -> Result<()> {
        Self::insert_income_event(&self.pool, event).await
    }

    pub async fn update_income_event(&self, event: &IncomeEvent) -> Result<()> {
        Self::write_income_event(&self.pool, event).await
    }

    /// Store a receipt, and the next recurring instance if any, in one
    /// transaction. The received amount must still cover every attribution
    /// already made against the income.
    pub async fn receive_income_checked(
        &self,
        event: &IncomeEvent,
        next: Option<&IncomeEvent>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin income receipt transaction")?;

        let rows = Self::fetch_attributions(&mut *tx, "income_event_id", event.id).await?;
        validate_receipt(event.attribution_cap(), &rows)?;

        Self::write_income_event(&mut *tx, event).await?;
        if let Some(next) = next {
            Self::insert_income_event(&mut *tx, next).await?;
        }

        tx.commit()
            .await
            .context("Failed to commit income receipt transaction")?;
        Ok(())
    }

    async fn insert_income_event<'e, E: SqliteExecutor<'e>>(
        executor: E,
        event: &IncomeEvent,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO income_events (id, family_id, source, amount, scheduled_date, actual_date, actual_amount, frequency, next_occurrence, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.family_id.to_string())
        .bind(&event.source)
        .bind(event.amount.to_string())
        .bind(day(event.scheduled_date))
        .bind(event.actual_date.map(day))
        .bind(event.actual_amount.map(|a| a.to_string()))
        .bind(event.frequency.as_str())
        .bind(event.next_occurrence.map(day))
        .bind(event.status.as_str())
        .bind(ts(event.created_at))
        .execute(executor)
        .await
        .context("Failed to save income event")?;
        Ok(())
    }

    async fn write_income_event<'e, E: SqliteExecutor<'e>>(
        executor: E,
        event: &IncomeEvent,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE income_events
            SET source = ?, amount = ?, scheduled_date = ?, actual_date = ?, actual_amount = ?,
                frequency = ?, next_occurrence = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(&event.source)
        .bind(event.amount.to_string())
        .bind(day(event.scheduled_date))
        .bind(event.actual_date.map(day))
        .bind(event.actual_amount.map(|a| a.to_string()))
        .bind(event.frequency.as_str())
        .bind(event.next_occurrence.map(day))
        .bind(event.status.as_str())
        .bind(event.id.to_string())
        .execute(executor)
        .await
        .context("Failed to update income event")?;
        Ok(())
    }

    pub async fn get_income_event(&self, id: IncomeEventId) -> Result<Option<IncomeEvent>> {
        Self::fetch_income_event(&self.pool, id).await
    }

    async fn fetch_income_event<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: IncomeEventId,
    ) -> Result<Option<IncomeEvent>> {
        let query = format!("SELECT {} FROM income_events WHERE id = ?", INCOME_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(executor)
            .await
            .context("Failed to fetch income event")?;

        row.as_ref().map(Self::row_to_income_event).transpose()
    }

    /// List a family's income events, newest first.
    pub async fn list_income_events(&self, family_id: FamilyId) -> Result<Vec<IncomeEvent>> {
        let query = format!(
            "SELECT {} FROM income_events WHERE family_id = ? ORDER BY scheduled_date DESC",
            INCOME_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(family_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list income events")?;

        rows.iter().map(Self::row_to_income_event).collect()
    }

    /// Income events whose scheduled or actual date falls within `range`.
    pub async fn list_income_in_range(
        &self,
        family_id: FamilyId,
        range: DateRange,
    ) -> Result<Vec<IncomeEvent>> {
        let query = format!(
            r#"
            SELECT {} FROM income_events
            WHERE family_id = ?
              AND ((scheduled_date >= ? AND scheduled_date <= ?)
                OR (actual_date >= ? AND actual_date <= ?))
            ORDER BY scheduled_date
            "#,
            INCOME_COLUMNS
        );
        let (start, end) = (day(range.start), day(range.end));
        let rows = sqlx::query(&query)
            .bind(family_id.to_string())
            .bind(&start)
            .bind(&end)
            .bind(&start)
            .bind(&end)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list income in range")?;

        rows.iter().map(Self::row_to_income_event).collect()
    }

    fn row_to_income_event(row: &sqlx::sqlite::SqliteRow) -> Result<IncomeEvent> {
        let frequency_str: String = row.get("frequency");
        let status_str: String = row.get("status");

        Ok(IncomeEvent {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            family_id: parse_uuid(&row.get::<String, _>("family_id"))?,
            source: row.get("source"),
            amount: parse_money(&row.get::<String, _>("amount"))?,
            scheduled_date: parse_day(&row.get::<String, _>("scheduled_date"))?,
            actual_date: parse_opt(row, "actual_date", parse_day)?,
            actual_amount: parse_opt(row, "actual_amount", parse_money)?,
            frequency: Frequency::from_str(&frequency_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid frequency: {}", frequency_str))?,
            next_occurrence: parse_opt(row, "next_occurrence", parse_day)?,
            status: IncomeStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid income status: {}", status_str))?,
            created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        })
    }

    // ========================
    // Payment operations
    // ========================

    pub async fn save_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, family_id, payee, category, amount, due_date, paid_date, paid_amount, payment_type, frequency, next_due_date, state, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.family_id.to_string())
        .bind(&payment.payee)
        .bind(&payment.category)
        .bind(payment.amount.to_string())
        .bind(day(payment.due_date))
        .bind(payment.paid_date.map(day))
        .bind(payment.paid_amount.map(|a| a.to_string()))
        .bind(payment.payment_type.as_str())
        .bind(payment.frequency.as_str())
        .bind(payment.next_due_date.map(day))
        .bind(stored_state(payment.state))
        .bind(ts(payment.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to save payment")?;
        Ok(())
    }

    pub async fn update_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET payee = ?, category = ?, amount = ?, due_date = ?, paid_date = ?, paid_amount = ?,
                payment_type = ?, frequency = ?, next_due_date = ?, state = ?
            WHERE id = ?
            "#,
        )
        .bind(&payment.payee)
        .bind(&payment.category)
        .bind(payment.amount.to_string())
        .bind(day(payment.due_date))
        .bind(payment.paid_date.map(day))
        .bind(payment.paid_amount.map(|a| a.to_string()))
        .bind(payment.payment_type.as_str())
        .bind(payment.frequency.as_str())
        .bind(payment.next_due_date.map(day))
        .bind(stored_state(payment.state))
        .bind(payment.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update payment")?;
        Ok(())
    }

    pub async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Self::fetch_payment(&self.pool, id).await
    }

    async fn fetch_payment<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: PaymentId,
    ) -> Result<Option<Payment>> {
        let query = format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(executor)
            .await
            .context("Failed to fetch payment")?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    /// List a family's payments ordered by due date.
    pub async fn list_payments(&self, family_id: FamilyId) -> Result<Vec<Payment>> {
        let query = format!(
            "SELECT {} FROM payments WHERE family_id = ? ORDER BY due_date",
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(family_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list payments")?;

        rows.iter().map(Self::row_to_payment).collect()
    }

    /// Payments due within `range`.
    pub async fn list_payments_due_in_range(
        &self,
        family_id: FamilyId,
        range: DateRange,
    ) -> Result<Vec<Payment>> {
        let query = format!(
            "SELECT {} FROM payments WHERE family_id = ? AND due_date >= ? AND due_date <= ? ORDER BY due_date",
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(family_id.to_string())
            .bind(day(range.start))
            .bind(day(range.end))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list payments due in range")?;

        rows.iter().map(Self::row_to_payment).collect()
    }

    fn row_to_payment(row: &sqlx::sqlite::SqliteRow) -> Result<Payment> {
        let payment_type_str: String = row.get("payment_type");
        let frequency_str: String = row.get("frequency");
        let state_str: String = row.get("state");

        Ok(Payment {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            family_id: parse_uuid(&row.get::<String, _>("family_id"))?,
            payee: row.get("payee"),
            category: row.get("category"),
            amount: parse_money(&row.get::<String, _>("amount"))?,
            due_date: parse_day(&row.get::<String, _>("due_date"))?,
            paid_date: parse_opt(row, "paid_date", parse_day)?,
            paid_amount: parse_opt(row, "paid_amount", parse_money)?,
            payment_type: PaymentType::from_str(&payment_type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid payment type: {}", payment_type_str))?,
            frequency: Frequency::from_str(&frequency_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid frequency: {}", frequency_str))?,
            next_due_date: parse_opt(row, "next_due_date", parse_day)?,
            state: PaymentStatus::from_str(&state_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid payment state: {}", state_str))?,
            created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        })
    }

    // ========================
    // Attribution operations
    // ========================

    /// Insert an attribution after re-checking both caps inside one transaction.
    ///
    /// A violated invariant surfaces as an `AttributionError` wrapped in the
    /// returned error; nothing is written in that case.
    pub async fn save_attribution_checked(&self, attribution: &Attribution) -> Result<()> {
        self.save_attributions_checked(std::slice::from_ref(attribution)).await
    }

    /// Validate and insert a batch of attributions in one transaction. Each
    /// one is checked against the rows stored before it, so either the whole
    /// batch fits both caps or nothing is written.
    pub async fn save_attributions_checked(&self, attributions: &[Attribution]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin attribution transaction")?;

        for attribution in attributions {
            Self::insert_attribution_checked(&mut tx, attribution).await?;
        }

        tx.commit()
            .await
            .context("Failed to commit attribution transaction")?;
        Ok(())
    }

    async fn insert_attribution_checked(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        attribution: &Attribution,
    ) -> Result<()> {
        let payment = Self::fetch_payment(&mut **tx, attribution.payment_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Payment not found: {}", attribution.payment_id))?;
        let income = Self::fetch_income_event(&mut **tx, attribution.income_event_id)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!("Income event not found: {}", attribution.income_event_id)
            })?;
        let payment_rows = Self::fetch_attributions(&mut **tx, "payment_id", payment.id).await?;
        let income_rows = Self::fetch_attributions(&mut **tx, "income_event_id", income.id).await?;

        validate_attribution(
            &payment,
            &income,
            &payment_rows,
            &income_rows,
            attribution.amount,
        )?;

        sqlx::query(
            r#"
            INSERT INTO attributions (id, payment_id, income_event_id, amount, attribution_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(attribution.id.to_string())
        .bind(attribution.payment_id.to_string())
        .bind(attribution.income_event_id.to_string())
        .bind(attribution.amount.to_string())
        .bind(attribution.attribution_type.as_str())
        .bind(ts(attribution.created_at))
        .execute(&mut **tx)
        .await
        .context("Failed to save attribution")?;

        debug!(attribution_id = %attribution.id, amount = %attribution.amount, "attribution stored");
        Ok(())
    }

    pub async fn get_attribution(&self, id: AttributionId) -> Result<Option<Attribution>> {
        let query = format!("SELECT {} FROM attributions WHERE id = ?", ATTRIBUTION_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch attribution")?;

        row.as_ref().map(Self::row_to_attribution).transpose()
    }

    pub async fn list_attributions_for_payment(&self, payment_id: PaymentId) -> Result<Vec<Attribution>> {
        Self::fetch_attributions(&self.pool, "payment_id", payment_id).await
    }

    pub async fn list_attributions_for_income(
        &self,
        income_event_id: IncomeEventId,
    ) -> Result<Vec<Attribution>> {
        Self::fetch_attributions(&self.pool, "income_event_id", income_event_id).await
    }

    async fn fetch_attributions<'e, E: SqliteExecutor<'e>>(
        executor: E,
        parent_column: &'static str,
        parent_id: Uuid,
    ) -> Result<Vec<Attribution>> {
        let query = format!(
            "SELECT {} FROM attributions WHERE {} = ? ORDER BY created_at",
            ATTRIBUTION_COLUMNS, parent_column
        );
        let rows = sqlx::query(&query)
            .bind(parent_id.to_string())
            .fetch_all(executor)
            .await
            .context("Failed to list attributions")?;

        rows.iter().map(Self::row_to_attribution).collect()
    }

    /// Delete an attribution. Returns false if it did not exist.
    pub async fn delete_attribution(&self, id: AttributionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM attributions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete attribution")?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_attribution(row: &sqlx::sqlite::SqliteRow) -> Result<Attribution> {
        let type_str: String = row.get("attribution_type");

        Ok(Attribution {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            payment_id: parse_uuid(&row.get::<String, _>("payment_id"))?,
            income_event_id: parse_uuid(&row.get::<String, _>("income_event_id"))?,
            amount: parse_money(&row.get::<String, _>("amount"))?,
            attribution_type: AttributionType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid attribution type: {}", type_str))?,
            created_at: parse_ts(&row.get::<String, _>("created_at"))?,
        })
    }

    // ========================
    // Expense operations
    // ========================

    pub async fn save_expense(&self, expense: &Expense) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses (id, family_id, account_id, date, amount, category, merchant, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(expense.family_id.to_string())
        .bind(expense.account_id.map(|id| id.to_string()))
        .bind(day(expense.date))
        .bind(expense.amount.to_string())
        .bind(&expense.category)
        .bind(&expense.merchant)
        .bind(&expense.description)
        .bind(ts(expense.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to save expense")?;
        Ok(())
    }

    pub async fn list_expenses_in_range(
        &self,
        family_id: FamilyId,
        range: DateRange,
    ) -> Result<Vec<Expense>> {
        let query = format!(
            "SELECT {} FROM expenses WHERE family_id = ? AND date >= ? AND date <= ? ORDER BY date",
            EXPENSE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(family_id.to_string())
            .bind(day(range.start))
            .bind(day(range.end))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list expenses in range")?;

        rows.iter()
            .map(|row| {
                Ok(Expense {
                    id: parse_uuid(&row.get::<String, _>("id"))?,
                    family_id: parse_uuid(&row.get::<String, _>("family_id"))?,
                    account_id: parse_opt(row, "account_id", parse_uuid)?,
                    date: parse_day(&row.get::<String, _>("date"))?,
                    amount: parse_money(&row.get::<String, _>("amount"))?,
                    category: row.get("category"),
                    merchant: row.get("merchant"),
                    description: row.get("description"),
                    created_at: parse_ts(&row.get::<String, _>("created_at"))?,
                })
            })
            .collect()
    }

    // ========================
    // Budget operations
    // ========================

    pub async fn save_budget_allocation(&self, budget: &BudgetAllocation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO budget_allocations (id, family_id, category, amount, period_start, period_end, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(budget.id.to_string())
        .bind(budget.family_id.to_string())
        .bind(&budget.category)
        .bind(budget.amount.to_string())
        .bind(day(budget.period_start))
        .bind(day(budget.period_end))
        .bind(ts(budget.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to save budget allocation")?;
        Ok(())
    }

    /// Budget allocations whose period overlaps `range`.
    pub async fn list_budget_allocations_in_range(
        &self,
        family_id: FamilyId,
        range: DateRange,
    ) -> Result<Vec<BudgetAllocation>> {
        let query = format!(
            "SELECT {} FROM budget_allocations WHERE family_id = ? AND period_start <= ? AND period_end >= ? ORDER BY category, period_start",
            BUDGET_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(family_id.to_string())
            .bind(day(range.end))
            .bind(day(range.start))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list budget allocations")?;

        rows.iter()
            .map(|row| {
                Ok(BudgetAllocation {
                    id: parse_uuid(&row.get::<String, _>("id"))?,
                    family_id: parse_uuid(&row.get::<String, _>("family_id"))?,
                    category: row.get("category"),
                    amount: parse_money(&row.get::<String, _>("amount"))?,
                    period_start: parse_day(&row.get::<String, _>("period_start"))?,
                    period_end: parse_day(&row.get::<String, _>("period_end"))?,
                    created_at: parse_ts(&row.get::<String, _>("created_at"))?,
                })
            })
            .collect()
    }

    // ========================
    // Account operations
    // ========================

    /// Insert an account or update the balance of the family's account with the same name.
    pub async fn upsert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, family_id, name, account_type, balance, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (family_id, name) DO UPDATE
            SET account_type = excluded.account_type,
                balance = excluded.balance,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.family_id.to_string())
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.balance.to_string())
        .bind(ts(account.updated_at))
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    pub async fn list_accounts(&self, family_id: FamilyId) -> Result<Vec<Account>> {
        let query = format!(
            "SELECT {} FROM accounts WHERE family_id = ? ORDER BY name",
            ACCOUNT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(family_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter()
            .map(|row| {
                let type_str: String = row.get("account_type");
                Ok(Account {
                    id: parse_uuid(&row.get::<String, _>("id"))?,
                    family_id: parse_uuid(&row.get::<String, _>("family_id"))?,
                    name: row.get("name"),
                    account_type: AccountType::from_str(&type_str)
                        .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", type_str))?,
                    balance: parse_money(&row.get::<String, _>("balance"))?,
                    updated_at: parse_ts(&row.get::<String, _>("updated_at"))?,
                })
            })
            .collect()
    }
}

/// Overdue is derived at read time and never written.
fn stored_state(state: PaymentStatus) -> &'static str {
    match state {
        PaymentStatus::Overdue => PaymentStatus::Scheduled.as_str(),
        other => other.as_str(),
    }
}

/// Instants are stored as RFC 3339 UTC with a fixed precision so that text
/// comparison in SQL orders them correctly.
pub(super) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}

pub(super) fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(super) fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date: {}", s))
}

pub(super) fn parse_money(s: &str) -> Result<Money> {
    Decimal::from_str(s).with_context(|| format!("Invalid amount: {}", s))
}

pub(super) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("Invalid ID: {}", s))
}

pub(super) fn parse_opt<T>(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
    parse: fn(&str) -> Result<T>,
) -> Result<Option<T>> {
    row.get::<Option<String>, _>(column)
        .as_deref()
        .map(parse)
        .transpose()
}
