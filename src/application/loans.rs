use chrono::Utc;
use log::debug;

use crate::domain::{Cents, Loan, LoanId, LoanKind, LoanStatus, Repayment};
use crate::storage::Repository;

use super::AppError;

/// Loan origination and repayment bookkeeping. A loan is its own small
/// ledger: the repayment log and the running totals on the loan row are
/// written together, atomically.
pub struct LoanService {
    repo: Repository,
}

impl LoanService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// File a loan application. The monthly payment is fixed at
    /// application time from the amortization formula; the loan starts
    /// `pending` with the full principal outstanding.
    pub async fn apply_for_loan(
        &self,
        user_id: &str,
        principal: Cents,
        interest_rate_bps: u32,
        term_months: u32,
        loan_type: &str,
        reason: Option<String>,
    ) -> Result<Loan, AppError> {
        if principal <= 0 {
            return Err(AppError::InvalidAmount);
        }
        if term_months == 0 {
            return Err(AppError::InvalidLoanTerms(
                "term must be at least one month".to_string(),
            ));
        }
        let kind = LoanKind::from_str(loan_type)
            .ok_or_else(|| AppError::InvalidLoanKind(loan_type.to_string()))?;

        let mut loan = Loan::new(user_id, principal, interest_rate_bps, term_months, kind);
        if let Some(reason) = reason {
            loan = loan.with_reason(reason);
        }

        self.repo.insert_loan(&loan).await?;
        debug!("loan {} ({}) filed by {}", loan.id, kind, user_id);
        Ok(loan)
    }

    /// Approve a pending loan, stamping the approval time.
    pub async fn approve_loan(&self, loan_id: LoanId) -> Result<Loan, AppError> {
        let mut loan = self.require_loan(loan_id).await?;
        self.require_status(&loan, LoanStatus::Pending)?;

        loan.status = LoanStatus::Approved;
        loan.approved_at = Some(Utc::now());
        self.repo.save_loan(&loan).await?;
        Ok(loan)
    }

    /// Reject a pending loan.
    pub async fn reject_loan(&self, loan_id: LoanId) -> Result<Loan, AppError> {
        let mut loan = self.require_loan(loan_id).await?;
        self.require_status(&loan, LoanStatus::Pending)?;

        loan.status = LoanStatus::Rejected;
        self.repo.save_loan(&loan).await?;
        Ok(loan)
    }

    /// Record a repayment against an approved loan. Paying the balance
    /// down to zero completes the loan. Returns the updated loan. Rejected
    /// when the amount exceeds the remaining balance; a concurrent
    /// repayment that invalidates the precheck between read and write
    /// trips the schema's non-negative constraint and is reported the
    /// same way.
    pub async fn make_repayment(&self, loan_id: LoanId, amount: Cents) -> Result<Loan, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }
        let loan = self.require_loan(loan_id).await?;
        self.require_status(&loan, LoanStatus::Approved)?;
        if amount > loan.balance_remaining {
            return Err(AppError::RepaymentExceedsBalance {
                requested: amount,
                remaining: loan.balance_remaining,
            });
        }

        let repayment = Repayment::new(loan_id, amount);
        match self.repo.record_repayment(&repayment).await {
            Ok(updated) => {
                debug!("repayment of {} against loan {}", amount, loan_id);
                Ok(updated)
            }
            Err(err) if err.is_check_violation() => Err(AppError::RepaymentExceedsBalance {
                requested: amount,
                remaining: loan.balance_remaining,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Get a loan by ID.
    pub async fn get_loan(&self, loan_id: LoanId) -> Result<Loan, AppError> {
        self.require_loan(loan_id).await
    }

    /// List a user's loans, most recent application first.
    pub async fn get_loans_by_user(&self, user_id: &str) -> Result<Vec<Loan>, AppError> {
        Ok(self.repo.find_loans_by_user(user_id).await?)
    }

    /// List a loan's repayments in the order they were made.
    pub async fn get_repayments(&self, loan_id: LoanId) -> Result<Vec<Repayment>, AppError> {
        self.require_loan(loan_id).await?;
        Ok(self.repo.find_repayments(loan_id).await?)
    }

    async fn require_loan(&self, loan_id: LoanId) -> Result<Loan, AppError> {
        self.repo
            .find_loan(loan_id)
            .await?
            .ok_or(AppError::LoanNotFound(loan_id))
    }

    fn require_status(&self, loan: &Loan, required: LoanStatus) -> Result<(), AppError> {
        if loan.status == required {
            Ok(())
        } else {
            Err(AppError::InvalidLoanStatus {
                loan_id: loan.id,
                status: loan.status,
                required,
            })
        }
    }
}
