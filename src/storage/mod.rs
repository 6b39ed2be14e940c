mod repository;

pub use repository::*;

/// SQL migration for the core ledger schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for the loan book
pub const MIGRATION_002_LOANS: &str = include_str!("migrations/002_loans.sql");

/// SQL migration for budgets and savings goals
pub const MIGRATION_003_BUDGETS: &str = include_str!("migrations/003_budgets.sql");
