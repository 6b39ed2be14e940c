use crate::domain::{Budget, Cents, OverallBudget, Period, SavingsGoal};
use crate::storage::Repository;

use super::AppError;

/// Budget and savings planning: CRUD over monthly budget rows and named
/// savings goals. No ledger interaction; the planner only tracks intent.
pub struct PlannerService {
    repo: Repository,
}

/// How a month's overall budget is divided across category budgets.
#[derive(Debug)]
pub struct BudgetSummary {
    pub period: Period,
    pub total: Cents,
    pub allocated: Cents,
    pub remaining: Cents,
    pub budgets: Vec<Budget>,
}

impl PlannerService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Set (or overwrite) the overall budget for a month.
    pub async fn set_overall_budget(
        &self,
        user_id: &str,
        total: Cents,
        month: u32,
        year: i32,
    ) -> Result<OverallBudget, AppError> {
        if total <= 0 {
            return Err(AppError::InvalidAmount);
        }
        let period = Self::period(month, year)?;

        let budget = match self.repo.find_overall_budget(user_id, period).await? {
            Some(mut existing) => {
                existing.total = total;
                existing
            }
            None => OverallBudget::new(user_id, total, period),
        };
        self.repo.upsert_overall_budget(&budget).await?;
        Ok(budget)
    }

    /// Set (or overwrite) one category's budget for a month.
    pub async fn set_category_budget(
        &self,
        user_id: &str,
        category: &str,
        amount: Cents,
        month: u32,
        year: i32,
    ) -> Result<Budget, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }
        let period = Self::period(month, year)?;

        let budgets = self.repo.find_category_budgets(user_id, period).await?;
        let budget = match budgets.into_iter().find(|b| b.category == category) {
            Some(mut existing) => {
                existing.amount = amount;
                existing
            }
            None => Budget::new(user_id, category, amount, period),
        };
        self.repo.upsert_category_budget(&budget).await?;
        Ok(budget)
    }

    /// A month's category budgets, sorted by category.
    pub async fn get_budgets(
        &self,
        user_id: &str,
        month: u32,
        year: i32,
    ) -> Result<Vec<Budget>, AppError> {
        let period = Self::period(month, year)?;
        Ok(self.repo.find_category_budgets(user_id, period).await?)
    }

    /// How much of the month's overall budget is still unallocated.
    pub async fn budget_summary(
        &self,
        user_id: &str,
        month: u32,
        year: i32,
    ) -> Result<BudgetSummary, AppError> {
        let period = Self::period(month, year)?;

        let overall = self
            .repo
            .find_overall_budget(user_id, period)
            .await?
            .ok_or(AppError::OverallBudgetNotSet(period))?;
        let budgets = self.repo.find_category_budgets(user_id, period).await?;
        let allocated = self.repo.sum_category_budgets(user_id, period).await?;

        Ok(BudgetSummary {
            period,
            total: overall.total,
            allocated,
            remaining: overall.total - allocated,
            budgets,
        })
    }

    /// Remove one category's budget for a month.
    pub async fn delete_category_budget(
        &self,
        user_id: &str,
        category: &str,
        month: u32,
        year: i32,
    ) -> Result<(), AppError> {
        let period = Self::period(month, year)?;
        if self
            .repo
            .delete_category_budget(user_id, category, period)
            .await?
        {
            Ok(())
        } else {
            Err(AppError::BudgetNotFound {
                category: category.to_string(),
                period,
            })
        }
    }

    /// Every category budget the user has, across all months.
    pub async fn list_all_budgets(&self, user_id: &str) -> Result<Vec<Budget>, AppError> {
        Ok(self.repo.find_budgets_by_user(user_id).await?)
    }

    /// Every overall budget the user has, across all months.
    pub async fn list_all_overall_budgets(
        &self,
        user_id: &str,
    ) -> Result<Vec<OverallBudget>, AppError> {
        Ok(self.repo.find_overall_budgets_by_user(user_id).await?)
    }

    // ========================
    // Savings goals
    // ========================

    /// Create a named savings goal with a positive target.
    pub async fn add_savings_goal(
        &self,
        user_id: &str,
        name: &str,
        target: Cents,
    ) -> Result<SavingsGoal, AppError> {
        if target <= 0 {
            return Err(AppError::InvalidAmount);
        }

        let goal = SavingsGoal::new(user_id, name, target);
        match self.repo.insert_savings_goal(&goal).await {
            Ok(()) => Ok(goal),
            Err(err) if err.is_unique_violation() => {
                Err(AppError::SavingsGoalExists(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Add to a goal's saved amount. Returns the updated goal.
    pub async fn add_to_savings_goal(
        &self,
        user_id: &str,
        name: &str,
        amount: Cents,
    ) -> Result<SavingsGoal, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }
        self.repo
            .add_to_savings_goal(user_id, name, amount)
            .await?
            .ok_or_else(|| AppError::SavingsGoalNotFound(name.to_string()))
    }

    /// A user's savings goals, sorted by name.
    pub async fn get_savings_goals(&self, user_id: &str) -> Result<Vec<SavingsGoal>, AppError> {
        Ok(self.repo.find_savings_goals(user_id).await?)
    }

    /// Delete a savings goal by name.
    pub async fn delete_savings_goal(&self, user_id: &str, name: &str) -> Result<(), AppError> {
        if self.repo.delete_savings_goal(user_id, name).await? {
            Ok(())
        } else {
            Err(AppError::SavingsGoalNotFound(name.to_string()))
        }
    }

    fn period(month: u32, year: i32) -> Result<Period, AppError> {
        Period::new(month, year).ok_or(AppError::InvalidPeriod)
    }
}
