use thiserror::Error;

use crate::domain::{AccountId, Cents, LoanId, LoanStatus, Period};
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account is inactive: {0}")]
    InactiveAccount(AccountId),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Invalid account kind: {0} (expected savings or checking)")]
    InvalidAccountKind(String),

    #[error("Source and destination accounts must differ")]
    InvalidTransfer,

    #[error("User {user_id} does not own account {account_id}")]
    Unauthorized {
        user_id: String,
        account_id: AccountId,
    },

    #[error("Field not updatable: {0}")]
    InvalidField(String),

    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    #[error("Invalid loan kind: {0} (expected full, installment or collateral)")]
    InvalidLoanKind(String),

    #[error("Invalid loan terms: {0}")]
    InvalidLoanTerms(String),

    #[error("Loan {loan_id} is {status}, operation requires a {required} loan")]
    InvalidLoanStatus {
        loan_id: LoanId,
        status: LoanStatus,
        required: LoanStatus,
    },

    #[error("Repayment of {requested} exceeds remaining balance {remaining}")]
    RepaymentExceedsBalance { requested: Cents, remaining: Cents },

    #[error("No overall budget set for {0}")]
    OverallBudgetNotSet(Period),

    #[error("No budget for category {category} in {period}")]
    BudgetNotFound { category: String, period: Period },

    #[error("Savings goal already exists: {0}")]
    SavingsGoalExists(String),

    #[error("Savings goal not found: {0}")]
    SavingsGoalNotFound(String),

    #[error("Invalid period: month must be between 1 and 12")]
    InvalidPeriod,

    #[error("Storage unavailable: operation did not complete after retries")]
    StorageUnavailable,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable { .. } => AppError::StorageUnavailable,
            StorageError::Other(source) => AppError::Database(source),
            constraint @ StorageError::Constraint(_) => {
                AppError::Database(anyhow::Error::new(constraint))
            }
        }
    }
}
