use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    /// Debit leg of a transfer, written on the source account.
    TransferOut,
    /// Credit leg of a transfer, written on the destination account.
    TransferIn,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::TransferIn => "transfer_in",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(TransactionKind::Deposit),
            "withdraw" => Some(TransactionKind::Withdraw),
            "transfer_out" => Some(TransactionKind::TransferOut),
            "transfer_in" => Some(TransactionKind::TransferIn),
            _ => None,
        }
    }

    /// Credits increase the account balance, debits decrease it.
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionKind::Deposit | TransactionKind::TransferIn)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable ledger entry. Every balance change appends exactly one of
/// these per affected account; a transfer appends two (out on the source,
/// in on the destination). Entries are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Monotonically increasing sequence number for ordering.
    pub sequence: i64,
    pub account_id: AccountId,
    pub transaction_type: TransactionKind,
    /// Always positive; the kind carries the direction.
    pub amount: Cents,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Create a new entry. Sequence number must be assigned by the repository.
    pub fn new(account_id: AccountId, transaction_type: TransactionKind, amount: Cents) -> Self {
        assert!(amount > 0, "ledger entries carry positive amounts");
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // Will be set by repository
            account_id,
            transaction_type,
            amount,
            timestamp: Utc::now(),
        }
    }

    /// Signed effect on the balance: credits positive, debits negative.
    pub fn signed_amount(&self) -> Cents {
        if self.transaction_type.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}
