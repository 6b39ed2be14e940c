use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{LedgerService, LoanService, PlannerService};
use crate::domain::{Account, AccountId, Budget, Loan, OverallBudget, Repayment, SavingsGoal, Transaction};

/// Everything one user has in the store, for full export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub user_id: String,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    pub loans: Vec<Loan>,
    pub repayments: Vec<Repayment>,
    pub budgets: Vec<Budget>,
    pub overall_budgets: Vec<OverallBudget>,
    pub savings_goals: Vec<SavingsGoal>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    ledger: &'a LedgerService,
    loans: &'a LoanService,
    planner: &'a PlannerService,
}

impl<'a> Exporter<'a> {
    pub fn new(
        ledger: &'a LedgerService,
        loans: &'a LoanService,
        planner: &'a PlannerService,
    ) -> Self {
        Self {
            ledger,
            loans,
            planner,
        }
    }

    /// Export one account's statement to CSV, newest entry first.
    pub async fn export_statement_csv<W: Write>(
        &self,
        account_id: AccountId,
        writer: W,
    ) -> Result<usize> {
        let entries = self.ledger.get_transaction_history(account_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "sequence",
            "timestamp",
            "transaction_type",
            "amount_cents",
            "signed_cents",
        ])?;

        let mut count = 0;
        for entry in &entries {
            csv_writer.write_record(&[
                entry.sequence.to_string(),
                entry.timestamp.to_rfc3339(),
                entry.transaction_type.to_string(),
                entry.amount.to_string(),
                entry.signed_amount().to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export a user's accounts to CSV.
    pub async fn export_accounts_csv<W: Write>(&self, user_id: &str, writer: W) -> Result<usize> {
        let accounts = self.ledger.get_accounts_by_user(user_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["account_id", "account_type", "balance_cents", "active", "created_at"])?;

        let mut count = 0;
        for account in &accounts {
            csv_writer.write_record(&[
                account.id.to_string(),
                account.account_type.to_string(),
                account.balance.to_string(),
                account.active.to_string(),
                account.created_at.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export everything a user has as a JSON snapshot.
    pub async fn export_full_json<W: Write>(
        &self,
        user_id: &str,
        mut writer: W,
    ) -> Result<UserSnapshot> {
        let accounts = self.ledger.get_accounts_by_user(user_id).await?;

        let mut transactions = Vec::new();
        for account in &accounts {
            transactions.extend(self.ledger.get_transaction_history(account.id).await?);
        }

        let loans = self.loans.get_loans_by_user(user_id).await?;
        let mut repayments = Vec::new();
        for loan in &loans {
            repayments.extend(self.loans.get_repayments(loan.id).await?);
        }

        let budgets = self.planner.list_all_budgets(user_id).await?;
        let overall_budgets = self.planner.list_all_overall_budgets(user_id).await?;
        let savings_goals = self.planner.get_savings_goals(user_id).await?;

        let snapshot = UserSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            user_id: user_id.to_string(),
            accounts,
            transactions,
            loans,
            repayments,
            budgets,
            overall_budgets,
            savings_goals,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
