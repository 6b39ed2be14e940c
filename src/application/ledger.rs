use log::debug;

use crate::domain::{Account, AccountId, AccountKind, Cents, Transaction, TransactionKind};
use crate::storage::{IntegrityStats, Repository};

use super::AppError;

/// The account ledger: sole mutator of balances, sole authority on
/// authorization and on what constitutes a legal balance change. This is
/// the primary interface for any client (CLI, API, TUI, etc.).
///
/// Ownership is checked here against the caller-supplied user id on every
/// money operation; the storage layer has no concept of the calling user.
pub struct LedgerService {
    repo: Repository,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Clone of the underlying repository, for wiring sibling services to
    /// the same pool.
    pub fn repository(&self) -> Repository {
        self.repo.clone()
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account for a user: zero balance, active.
    pub async fn create_account(
        &self,
        owner_user_id: &str,
        account_type: &str,
    ) -> Result<Account, AppError> {
        let kind = AccountKind::from_str(account_type)
            .ok_or_else(|| AppError::InvalidAccountKind(account_type.to_string()))?;

        let account = Account::new(owner_user_id, kind);
        self.repo.insert_account(&account).await?;
        debug!("account {} ({}) opened for {}", account.id, kind, owner_user_id);
        Ok(account)
    }

    /// List the accounts owned by a user (possibly empty).
    pub async fn get_accounts_by_user(&self, owner_user_id: &str) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.find_accounts_by_owner(owner_user_id).await?)
    }

    /// Current balance of an account. Read-only, no ownership check.
    pub async fn check_funds(&self, account_id: AccountId) -> Result<Cents, AppError> {
        let account = self.require_account(account_id).await?;
        Ok(account.balance)
    }

    /// Full ledger history of an account, newest first.
    pub async fn get_transaction_history(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.require_account(account_id).await?;
        Ok(self.repo.find_transactions(account_id).await?)
    }

    /// Update the whitelisted mutable fields: `kind` (alias `account_type`)
    /// and `active`. Everything else is rejected with `InvalidField`.
    /// Administrative operation: unlike the money operations it carries no
    /// ownership check.
    pub async fn update_account(
        &self,
        account_id: AccountId,
        changes: &[(String, String)],
    ) -> Result<Account, AppError> {
        let mut account = self.require_account(account_id).await?;

        for (field, value) in changes {
            match field.as_str() {
                "kind" | "account_type" => {
                    account.account_type = AccountKind::from_str(value)
                        .ok_or_else(|| AppError::InvalidAccountKind(value.clone()))?;
                }
                "active" => {
                    account.active = value
                        .parse()
                        .map_err(|_| AppError::InvalidField(format!("active={value}")))?;
                }
                other => return Err(AppError::InvalidField(other.to_string())),
            }
        }

        self.repo.save_account(&account).await?;
        Ok(account)
    }

    // ========================
    // Money operations
    // ========================

    /// Deposit into an account owned by the caller. Returns the new
    /// balance. The balance update and the ledger entry commit atomically.
    pub async fn deposit(
        &self,
        caller_user_id: &str,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Cents, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }
        let account = self.require_account(account_id).await?;
        self.require_active(&account)?;
        self.require_owner(caller_user_id, &account)?;

        let mut entry = Transaction::new(account_id, TransactionKind::Deposit, amount);
        let balance = self.repo.record_entry(amount, &mut entry).await?;
        debug!("deposit #{} of {} to {}", entry.sequence, amount, account_id);
        Ok(balance)
    }

    /// Withdraw from an account owned by the caller. Returns the new
    /// balance. Rejected when the amount exceeds the current balance; a
    /// concurrent debit that invalidates the precheck between read and
    /// write trips the schema's non-negative constraint and is reported
    /// the same way.
    pub async fn withdraw(
        &self,
        caller_user_id: &str,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Cents, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }
        let account = self.require_account(account_id).await?;
        self.require_active(&account)?;
        self.require_owner(caller_user_id, &account)?;
        if !account.can_cover(amount) {
            return Err(AppError::InsufficientFunds {
                account_id,
                balance: account.balance,
                required: amount,
            });
        }

        let mut entry = Transaction::new(account_id, TransactionKind::Withdraw, amount);
        match self.repo.record_entry(-amount, &mut entry).await {
            Ok(balance) => {
                debug!("withdraw #{} of {} from {}", entry.sequence, amount, account_id);
                Ok(balance)
            }
            Err(err) if err.is_check_violation() => Err(AppError::InsufficientFunds {
                account_id,
                balance: account.balance,
                required: amount,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Move money between two accounts. The caller must own the source;
    /// the destination only needs to exist and be active, so transfers to
    /// other users' accounts are allowed. Both balance updates and both
    /// ledger entries commit as one unit, or nothing does. Returns the new
    /// (source, destination) balances.
    pub async fn transfer_funds(
        &self,
        caller_user_id: &str,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
    ) -> Result<(Cents, Cents), AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }
        // Self-transfers are rejected before any account is loaded.
        if from_account_id == to_account_id {
            return Err(AppError::InvalidTransfer);
        }

        let from_account = self.require_account(from_account_id).await?;
        self.require_active(&from_account)?;
        self.require_owner(caller_user_id, &from_account)?;

        let to_account = self.require_account(to_account_id).await?;
        self.require_active(&to_account)?;

        if !from_account.can_cover(amount) {
            return Err(AppError::InsufficientFunds {
                account_id: from_account_id,
                balance: from_account.balance,
                required: amount,
            });
        }

        let mut out_entry = Transaction::new(from_account_id, TransactionKind::TransferOut, amount);
        let mut in_entry = Transaction::new(to_account_id, TransactionKind::TransferIn, amount);

        match self
            .repo
            .record_transfer(amount, &mut out_entry, &mut in_entry)
            .await
        {
            Ok(balances) => {
                debug!(
                    "transfer #{}/#{} of {} from {} to {}",
                    out_entry.sequence, in_entry.sequence, amount, from_account_id, to_account_id
                );
                Ok(balances)
            }
            Err(err) if err.is_check_violation() => Err(AppError::InsufficientFunds {
                account_id: from_account_id,
                balance: from_account.balance,
                required: amount,
            }),
            Err(err) => Err(err.into()),
        }
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check ledger integrity and return the raw statistics.
    pub async fn check_integrity(&self) -> Result<IntegrityStats, AppError> {
        Ok(self.repo.integrity_stats().await?)
    }

    // ========================
    // Helpers
    // ========================

    async fn require_account(&self, account_id: AccountId) -> Result<Account, AppError> {
        self.repo
            .find_account(account_id)
            .await?
            .ok_or(AppError::AccountNotFound(account_id))
    }

    fn require_active(&self, account: &Account) -> Result<(), AppError> {
        if account.active {
            Ok(())
        } else {
            Err(AppError::InactiveAccount(account.id))
        }
    }

    fn require_owner(&self, caller_user_id: &str, account: &Account) -> Result<(), AppError> {
        if account.is_owned_by(caller_user_id) {
            Ok(())
        } else {
            Err(AppError::Unauthorized {
                user_id: caller_user_id.to_string(),
                account_id: account.id,
            })
        }
    }
}
