use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Cents;

pub type AccountId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Long-term holdings, the default for new users.
    Savings,
    /// Day-to-day spending.
    Checking,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Savings => "savings",
            AccountKind::Checking => "checking",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "savings" => Some(AccountKind::Savings),
            "checking" => Some(AccountKind::Checking),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single-owner money account. The balance is only ever changed through
/// the ledger service; everything else here is plain data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub user_id: String,
    pub account_type: AccountKind,
    pub balance: Cents,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(user_id: impl Into<String>, account_type: AccountKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            account_type,
            balance: 0,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn can_cover(&self, amount: Cents) -> bool {
        self.balance >= amount
    }
}
