// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use penny::application::{LedgerService, LoanService, PlannerService};
use penny::domain::{Account, Cents};
use tempfile::TempDir;

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to create all three services over the same database
pub async fn test_services() -> Result<(LedgerService, LoanService, PlannerService, TempDir)> {
    let (ledger, temp_dir) = test_service().await?;
    let loans = LoanService::new(ledger.repository());
    let planner = PlannerService::new(ledger.repository());
    Ok((ledger, loans, planner, temp_dir))
}

/// Open a checking account for `user` and deposit `amount` into it
pub async fn funded_account(
    service: &LedgerService,
    user: &str,
    amount: Cents,
) -> Result<Account> {
    let account = service.create_account(user, "checking").await?;
    service.deposit(user, account.id, amount).await?;
    Ok(account)
}
