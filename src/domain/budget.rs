use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type BudgetId = Uuid;
pub type SavingsGoalId = Uuid;

/// A calendar month. Budgets are keyed by (user, month, year), so the
/// period is explicit data rather than something derived from timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub month: u32,
    pub year: i32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { month, year })
        } else {
            None
        }
    }

    /// The month containing `now`.
    pub fn containing(now: DateTime<Utc>) -> Self {
        Self {
            month: now.month(),
            year: now.year(),
        }
    }

    pub fn current() -> Self {
        Self::containing(Utc::now())
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Spending cap for one category in one month. Setting the same
/// (user, category, period) again overwrites the amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub user_id: String,
    pub category: String,
    pub amount: Cents,
    pub period: Period,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(
        user_id: impl Into<String>,
        category: impl Into<String>,
        amount: Cents,
        period: Period,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            category: category.into(),
            amount,
            period,
            created_at: Utc::now(),
        }
    }
}

/// The month's total envelope; category budgets allocate slices of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallBudget {
    pub id: BudgetId,
    pub user_id: String,
    pub total: Cents,
    pub period: Period,
    pub created_at: DateTime<Utc>,
}

impl OverallBudget {
    pub fn new(user_id: impl Into<String>, total: Cents, period: Period) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            total,
            period,
            created_at: Utc::now(),
        }
    }
}

/// A named savings target. `saved` accumulates through relative updates
/// and may legitimately pass the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub id: SavingsGoalId,
    pub user_id: String,
    pub name: String,
    pub target: Cents,
    pub saved: Cents,
    pub created_at: DateTime<Utc>,
}

impl SavingsGoal {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, target: Cents) -> Self {
        assert!(target > 0, "savings targets must be positive");
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            target,
            saved: 0,
            created_at: Utc::now(),
        }
    }

    pub fn remaining(&self) -> Cents {
        (self.target - self.saved).max(0)
    }

    pub fn is_reached(&self) -> bool {
        self.saved >= self.target
    }

    /// Whole-percent progress toward the target, capped at 100.
    pub fn progress_percent(&self) -> u8 {
        let pct = self.saved.saturating_mul(100) / self.target;
        pct.clamp(0, 100) as u8
    }
}
