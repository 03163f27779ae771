mod repository;
mod schedules;

pub use repository::*;

/// SQL migration for families, income, payments, attributions, accounts, expenses and budgets
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for scheduled reports and their execution history
pub const MIGRATION_002_SCHEDULED_REPORTS: &str =
    include_str!("migrations/002_scheduled_reports.sql");
