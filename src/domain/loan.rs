use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Cents;

pub type LoanId = Uuid;
pub type RepaymentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanKind {
    /// Repaid in one payment at the end of the term.
    Full,
    /// Repaid in monthly installments.
    Installment,
    /// Backed by collateral, repaid in installments.
    Collateral,
}

impl LoanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanKind::Full => "full",
            LoanKind::Installment => "installment",
            LoanKind::Collateral => "collateral",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "full" => Some(LoanKind::Full),
            "installment" => Some(LoanKind::Installment),
            "collateral" => Some(LoanKind::Collateral),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(LoanStatus::Pending),
            "approved" => Some(LoanStatus::Approved),
            "rejected" => Some(LoanStatus::Rejected),
            "completed" => Some(LoanStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed monthly payment for `principal` cents over `term_months` at
/// `rate_bps` annual interest (basis points), rounded to the nearest cent.
/// Standard amortization: p * r * (1+r)^n / ((1+r)^n - 1) with the monthly
/// rate r. Interest-free loans just split the principal evenly.
pub fn monthly_payment(principal: Cents, rate_bps: u32, term_months: u32) -> Cents {
    assert!(term_months > 0, "loan term must be at least one month");
    let n = term_months as f64;
    if rate_bps == 0 {
        return (principal as f64 / n).round() as Cents;
    }
    let r = rate_bps as f64 / 10_000.0 / 12.0;
    let p = principal as f64;
    let growth = (1.0 + r).powf(n);
    (p * r * growth / (growth - 1.0)).round() as Cents
}

/// A loan tracked as its own small ledger: the application fixes the terms,
/// repayments move the running totals, and the status walks
/// pending -> approved -> completed (or pending -> rejected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub user_id: String,
    pub principal: Cents,
    pub interest_rate_bps: u32,
    pub term_months: u32,
    pub loan_type: LoanKind,
    pub status: LoanStatus,
    pub reason: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub monthly_payment: Cents,
    pub total_repaid: Cents,
    /// Starts at the principal; interest is informational only.
    pub balance_remaining: Cents,
}

impl Loan {
    pub fn new(
        user_id: impl Into<String>,
        principal: Cents,
        interest_rate_bps: u32,
        term_months: u32,
        loan_type: LoanKind,
    ) -> Self {
        assert!(principal > 0, "loan principal must be positive");
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            principal,
            interest_rate_bps,
            term_months,
            loan_type,
            status: LoanStatus::Pending,
            reason: None,
            applied_at: Utc::now(),
            approved_at: None,
            monthly_payment: monthly_payment(principal, interest_rate_bps, term_months),
            total_repaid: 0,
            balance_remaining: principal,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// One repayment against a loan, append-only like any ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repayment {
    pub id: RepaymentId,
    pub loan_id: LoanId,
    pub amount: Cents,
    pub paid_at: DateTime<Utc>,
}

impl Repayment {
    pub fn new(loan_id: LoanId, amount: Cents) -> Self {
        assert!(amount > 0, "repayments carry positive amounts");
        Self {
            id: Uuid::new_v4(),
            loan_id,
            amount,
            paid_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_kind_roundtrip() {
        for status in [
            LoanStatus::Pending,
            LoanStatus::Approved,
            LoanStatus::Rejected,
            LoanStatus::Completed,
        ] {
            assert_eq!(LoanStatus::from_str(status.as_str()), Some(status));
        }
        for kind in [LoanKind::Full, LoanKind::Installment, LoanKind::Collateral] {
            assert_eq!(LoanKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_interest_free_payment_splits_principal() {
        // 120.00 over 12 months -> 10.00 a month
        assert_eq!(monthly_payment(12_000, 0, 12), 1_000);
    }

    #[test]
    fn test_amortized_payment_textbook_value() {
        // 1000.00 at 12% annual (1% monthly) over 12 months -> 88.85
        assert_eq!(monthly_payment(100_000, 1_200, 12), 8_885);
    }

    #[test]
    fn test_new_loan_starts_pending_with_full_balance() {
        let loan = Loan::new("u1", 50_000, 500, 24, LoanKind::Installment).with_reason("car");
        assert_eq!(loan.status, LoanStatus::Pending);
        assert_eq!(loan.balance_remaining, 50_000);
        assert_eq!(loan.total_repaid, 0);
        assert_eq!(loan.reason.as_deref(), Some("car"));
        assert!(loan.approved_at.is_none());
    }
}
