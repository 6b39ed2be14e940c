use anyhow::Result;
use penny::application::{LedgerService, LoanService, PlannerService};
use penny::io::{Exporter, UserSnapshot};
use tempfile::TempDir;

/// Helper to create the full service stack over a temporary database
async fn test_services() -> Result<(LedgerService, LoanService, PlannerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let ledger = LedgerService::init(db_path.to_str().unwrap()).await?;
    let loans = LoanService::new(ledger.repository());
    let planner = PlannerService::new(ledger.repository());
    Ok((ledger, loans, planner, temp_dir))
}

#[tokio::test]
async fn test_full_banking_session() -> Result<()> {
    let (ledger, loans, planner, _temp) = test_services().await?;

    // Alice opens two accounts, Bob one
    let checking = ledger.create_account("alice", "checking").await?;
    let savings = ledger.create_account("alice", "savings").await?;
    let bobs = ledger.create_account("bob", "checking").await?;

    // Money comes in, goes out, and moves around
    ledger.deposit("alice", checking.id, 150_000).await?;
    ledger.withdraw("alice", checking.id, 20_000).await?;
    ledger
        .transfer_funds("alice", checking.id, savings.id, 50_000)
        .await?;
    ledger
        .transfer_funds("alice", checking.id, bobs.id, 10_000)
        .await?;

    assert_eq!(ledger.check_funds(checking.id).await?, 70_000);
    assert_eq!(ledger.check_funds(savings.id).await?, 50_000);
    assert_eq!(ledger.check_funds(bobs.id).await?, 10_000);

    // Alice takes a loan and starts repaying it
    let loan = loans
        .apply_for_loan("alice", 100_000, 1200, 12, "full", None)
        .await?;
    loans.approve_loan(loan.id).await?;
    let loan = loans.make_repayment(loan.id, loan.monthly_payment).await?;
    assert_eq!(loan.balance_remaining, 100_000 - loan.monthly_payment);

    // She plans next month and saves for a trip
    planner.set_overall_budget("alice", 200_000, 3, 2026).await?;
    planner
        .set_category_budget("alice", "rent", 90_000, 3, 2026)
        .await?;
    planner.add_savings_goal("alice", "vacation", 100_000).await?;
    planner
        .add_to_savings_goal("alice", "vacation", 25_000)
        .await?;

    let summary = planner.budget_summary("alice", 3, 2026).await?;
    assert_eq!(summary.remaining, 110_000);

    // Everything she did shows up in one snapshot
    let exporter = Exporter::new(&ledger, &loans, &planner);
    let mut buffer = Vec::new();
    let snapshot = exporter.export_full_json("alice", &mut buffer).await?;

    assert_eq!(snapshot.accounts.len(), 2);
    assert_eq!(snapshot.transactions.len(), 5);
    assert_eq!(snapshot.loans.len(), 1);
    assert_eq!(snapshot.repayments.len(), 1);
    assert_eq!(snapshot.budgets.len(), 1);
    assert_eq!(snapshot.overall_budgets.len(), 1);
    assert_eq!(snapshot.savings_goals.len(), 1);
    assert_eq!(snapshot.version, env!("CARGO_PKG_VERSION"));

    // The written JSON parses back to the same snapshot
    let parsed: UserSnapshot = serde_json::from_slice(&buffer)?;
    assert_eq!(parsed.user_id, "alice");
    assert_eq!(parsed.transactions.len(), snapshot.transactions.len());

    // And the books balance
    let stats = ledger.check_integrity().await?;
    assert!(stats.is_clean(), "integrity check failed: {stats:?}");
    assert_eq!(stats.account_count, 3);
    assert_eq!(stats.transaction_count, 6);

    Ok(())
}

#[tokio::test]
async fn test_statement_and_account_exports() -> Result<()> {
    let (ledger, loans, planner, _temp) = test_services().await?;

    let checking = ledger.create_account("alice", "checking").await?;
    ledger.create_account("alice", "savings").await?;
    ledger.deposit("alice", checking.id, 30_000).await?;
    ledger.withdraw("alice", checking.id, 12_500).await?;

    let exporter = Exporter::new(&ledger, &loans, &planner);

    let mut buffer = Vec::new();
    let count = exporter
        .export_statement_csv(checking.id, &mut buffer)
        .await?;
    assert_eq!(count, 2);

    let csv = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "sequence,timestamp,transaction_type,amount_cents,signed_cents"
    );
    // Newest first: the withdrawal leads, with a negative signed amount
    assert!(lines[1].contains("withdraw"));
    assert!(lines[1].ends_with(",12500,-12500"));

    let mut buffer = Vec::new();
    let count = exporter.export_accounts_csv("alice", &mut buffer).await?;
    assert_eq!(count, 2);

    let csv = String::from_utf8(buffer)?;
    assert!(csv.starts_with("account_id,account_type,balance_cents,active,created_at"));

    Ok(())
}

#[tokio::test]
async fn test_data_survives_reconnect() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("penny.db");
    let path = db_path.to_str().unwrap();

    let account_id = {
        let ledger = LedgerService::init(path).await?;
        let account = ledger.create_account("alice", "savings").await?;
        ledger.deposit("alice", account.id, 42_000).await?;
        account.id
    };

    // A fresh connection sees everything the first one wrote
    let ledger = LedgerService::connect(path).await?;
    assert_eq!(ledger.check_funds(account_id).await?, 42_000);

    let history = ledger.get_transaction_history(account_id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, 42_000);

    let accounts = ledger.get_accounts_by_user("alice").await?;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].balance, 42_000);

    Ok(())
}
