use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, AccountKind, Budget, Cents, Loan, LoanId, LoanKind, LoanStatus,
    OverallBudget, Period, Repayment, SavingsGoal, Transaction,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_LOANS, MIGRATION_003_BUDGETS};

/// How often a locked database is retried before giving up.
const RETRY_ATTEMPTS: u32 = 3;
/// Base backoff between retries; grows linearly with the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);
/// How long a single statement waits on a writer before reporting a lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage failures, split by how callers should react: `Unavailable` is
/// transient contention that survived the bounded retries, `Constraint` is
/// an integrity violation that must never be retried, `Other` is everything
/// else.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database still locked after {attempts} attempts")]
    Unavailable {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
    #[error("integrity constraint violated")]
    Constraint(#[source] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    pub fn is_check_violation(&self) -> bool {
        matches!(self.kind(), Some(sqlx::error::ErrorKind::CheckViolation))
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.kind(), Some(sqlx::error::ErrorKind::UniqueViolation))
    }

    fn kind(&self) -> Option<sqlx::error::ErrorKind> {
        match self {
            StorageError::Constraint(err) => err.as_database_error().map(|db| db.kind()),
            _ => None,
        }
    }
}

fn is_locked(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

fn is_constraint(err: &sqlx::Error) -> bool {
    use sqlx::error::ErrorKind;
    err.as_database_error().is_some_and(|db| {
        matches!(
            db.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        )
    })
}

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub transaction_count: i64,
    pub has_sequence_gaps: bool,
    pub dangling_account_refs: i64,
    pub nonpositive_amounts: i64,
    /// Accounts whose stored balance disagrees with the sum of their entries.
    pub balance_mismatches: i64,
}

impl IntegrityStats {
    pub fn is_clean(&self) -> bool {
        !self.has_sequence_gaps
            && self.dangling_account_refs == 0
            && self.nonpositive_amounts == 0
            && self.balance_mismatches == 0
    }
}

/// Repository for persisting and querying accounts, transactions, loans and
/// planner rows. Every operation runs under the bounded lock-retry policy;
/// multi-row mutations run inside one storage transaction.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL, creating the file if
    /// it doesn't exist. WAL journaling and a busy timeout keep concurrent
    /// writers waiting instead of failing outright.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to invoke repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_LOANS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        sqlx::query(MIGRATION_003_BUDGETS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 003")?;

        debug!("database migrated");
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Run `op` until it succeeds, retrying only lock contention and only a
    /// bounded number of times. Constraint violations surface immediately;
    /// retrying them cannot change the outcome. The closure re-executes the
    /// whole unit, so a retried transaction re-reads before re-writing.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_constraint(&err) => return Err(StorageError::Constraint(err)),
                Err(err) if is_locked(&err) => {
                    if attempt >= RETRY_ATTEMPTS {
                        return Err(StorageError::Unavailable {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    warn!("{what}: database locked, attempt {attempt}/{RETRY_ATTEMPTS}");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(StorageError::Other(
                        anyhow::Error::new(err).context(format!("Failed to {what}")),
                    ));
                }
            }
        }
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account to the database.
    pub async fn insert_account(&self, account: &Account) -> Result<(), StorageError> {
        self.with_retry("save account", || {
            let pool = &self.pool;
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO accounts (id, user_id, account_type, balance_cents, active, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(account.id.to_string())
                .bind(&account.user_id)
                .bind(account.account_type.as_str())
                .bind(account.balance)
                .bind(account.active)
                .bind(account.created_at.to_rfc3339())
                .execute(pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Get an account by ID.
    pub async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StorageError> {
        let row = self
            .with_retry("fetch account", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, account_type, balance_cents, active, created_at
                        FROM accounts
                        WHERE id = ?
                        "#,
                    )
                    .bind(id.to_string())
                    .fetch_optional(pool)
                    .await
                }
            })
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// List the accounts owned by a user, oldest first. Zero rows is an
    /// empty Vec, never an error.
    pub async fn find_accounts_by_owner(
        &self,
        user_id: &str,
    ) -> Result<Vec<Account>, StorageError> {
        let rows = self
            .with_retry("list accounts", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, account_type, balance_cents, active, created_at
                        FROM accounts
                        WHERE user_id = ?
                        ORDER BY created_at
                        "#,
                    )
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
                }
            })
            .await?;

        rows.iter()
            .map(|row| Self::row_to_account(row).map_err(StorageError::from))
            .collect()
    }

    /// Persist a full overwrite of an account's mutable fields (kind,
    /// balance, active) keyed by its identifier.
    pub async fn save_account(&self, account: &Account) -> Result<(), StorageError> {
        self.with_retry("save account", || {
            let pool = &self.pool;
            async move {
                sqlx::query(
                    r#"
                    UPDATE accounts
                    SET account_type = ?, balance_cents = ?, active = ?
                    WHERE id = ?
                    "#,
                )
                .bind(account.account_type.as_str())
                .bind(account.balance)
                .bind(account.active)
                .bind(account.id.to_string())
                .execute(pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let kind_str: String = row.get("account_type");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            user_id: row.get("user_id"),
            account_type: AccountKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", kind_str))?,
            balance: row.get("balance_cents"),
            active: row.get::<i32, _>("active") != 0,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Apply a balance delta and append the matching ledger entry in one
    /// storage transaction. Assigns the entry's sequence number and stamps
    /// its timestamp at recording time, so sequence order matches wall
    /// time. Returns the new balance.
    ///
    /// The schema's `balance_cents >= 0` constraint backstops debits here:
    /// a racing withdrawal that slipped past the service's precondition
    /// fails the whole transaction instead of committing a negative
    /// balance.
    pub async fn record_entry(
        &self,
        delta: Cents,
        entry: &mut Transaction,
    ) -> Result<Cents, StorageError> {
        let snapshot = entry.clone();
        let (sequence, timestamp, balance) = self
            .with_retry("record ledger entry", || {
                let pool = &self.pool;
                let entry = snapshot.clone();
                async move { Self::record_entry_once(pool, delta, &entry).await }
            })
            .await?;

        entry.sequence = sequence;
        entry.timestamp = timestamp;
        Ok(balance)
    }

    async fn record_entry_once(
        pool: &SqlitePool,
        delta: Cents,
        entry: &Transaction,
    ) -> Result<(i64, DateTime<Utc>, Cents), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let sequence = Self::next_sequence(&mut tx).await?;
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?
            WHERE id = ?
            RETURNING balance_cents
            "#,
        )
        .bind(delta)
        .bind(entry.account_id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        let balance: Cents = row.get("balance_cents");

        Self::insert_transaction_row(&mut tx, entry, sequence, &now.to_rfc3339()).await?;

        tx.commit().await?;
        Ok((sequence, now, balance))
    }

    /// Move money between two accounts: both balance updates and both
    /// ledger entries (debit leg first) commit as one storage transaction.
    /// Any failure partway rolls the whole unit back. Returns the new
    /// (source, destination) balances.
    pub async fn record_transfer(
        &self,
        amount: Cents,
        out_entry: &mut Transaction,
        in_entry: &mut Transaction,
    ) -> Result<(Cents, Cents), StorageError> {
        let out_snapshot = out_entry.clone();
        let in_snapshot = in_entry.clone();
        let (out_sequence, in_sequence, timestamp, from_balance, to_balance) = self
            .with_retry("record transfer", || {
                let pool = &self.pool;
                let out = out_snapshot.clone();
                let inn = in_snapshot.clone();
                async move { Self::record_transfer_once(pool, amount, &out, &inn).await }
            })
            .await?;

        out_entry.sequence = out_sequence;
        out_entry.timestamp = timestamp;
        in_entry.sequence = in_sequence;
        in_entry.timestamp = timestamp;
        Ok((from_balance, to_balance))
    }

    async fn record_transfer_once(
        pool: &SqlitePool,
        amount: Cents,
        out_entry: &Transaction,
        in_entry: &Transaction,
    ) -> Result<(i64, i64, DateTime<Utc>, Cents, Cents), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let out_sequence = Self::next_sequence(&mut tx).await?;
        let in_sequence = Self::next_sequence(&mut tx).await?;
        let now = Utc::now();
        let stamp = now.to_rfc3339();

        let from_row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents - ?
            WHERE id = ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount)
        .bind(out_entry.account_id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        let from_balance: Cents = from_row.get("balance_cents");

        let to_row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = balance_cents + ?
            WHERE id = ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount)
        .bind(in_entry.account_id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        let to_balance: Cents = to_row.get("balance_cents");

        Self::insert_transaction_row(&mut tx, out_entry, out_sequence, &stamp).await?;
        Self::insert_transaction_row(&mut tx, in_entry, in_sequence, &stamp).await?;

        tx.commit().await?;
        Ok((out_sequence, in_sequence, now, from_balance, to_balance))
    }

    /// Persist one immutable ledger entry on its own, assigning the next
    /// sequence number. Balance-changing paths go through `record_entry` /
    /// `record_transfer` instead, which write the entry and the balance in
    /// the same transaction.
    pub async fn insert_transaction(&self, entry: &mut Transaction) -> Result<(), StorageError> {
        let snapshot = entry.clone();
        let sequence = self
            .with_retry("save transaction", || {
                let pool = &self.pool;
                let entry = snapshot.clone();
                async move {
                    let mut tx = pool.begin().await?;
                    let sequence = Self::next_sequence(&mut tx).await?;
                    Self::insert_transaction_row(&mut tx, &entry, sequence, &entry.timestamp.to_rfc3339())
                        .await?;
                    tx.commit().await?;
                    Ok(sequence)
                }
            })
            .await?;

        entry.sequence = sequence;
        Ok(())
    }

    /// Get the next sequence number and increment the counter. Runs on the
    /// caller's transaction so the claimed number commits or rolls back
    /// with the rest of the unit.
    async fn next_sequence(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'ledger_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.get("value"))
    }

    async fn insert_transaction_row(
        conn: &mut SqliteConnection,
        entry: &Transaction,
        sequence: i64,
        timestamp: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, account_id, transaction_type, amount_cents, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(sequence)
        .bind(entry.account_id.to_string())
        .bind(entry.transaction_type.as_str())
        .bind(entry.amount)
        .bind(timestamp)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// List an account's ledger entries, newest first.
    pub async fn find_transactions(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StorageError> {
        let rows = self
            .with_retry("list transactions", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, sequence, account_id, transaction_type, amount_cents, timestamp
                        FROM transactions
                        WHERE account_id = ?
                        ORDER BY sequence DESC
                        "#,
                    )
                    .bind(account_id.to_string())
                    .fetch_all(pool)
                    .await
                }
            })
            .await?;

        rows.iter()
            .map(|row| Self::row_to_transaction(row).map_err(StorageError::from))
            .collect()
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let account_id_str: String = row.get("account_id");
        let kind_str: String = row.get("transaction_type");
        let timestamp_str: String = row.get("timestamp");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            transaction_type: crate::domain::TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", kind_str))?,
            amount: row.get("amount_cents"),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Loan operations
    // ========================

    /// Save a new loan to the database.
    pub async fn insert_loan(&self, loan: &Loan) -> Result<(), StorageError> {
        self.with_retry("save loan", || {
            let pool = &self.pool;
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO loans (id, user_id, principal_cents, interest_rate_bps, term_months,
                                       loan_type, status, reason, applied_at, approved_at,
                                       monthly_payment_cents, total_repaid_cents, balance_remaining_cents)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(loan.id.to_string())
                .bind(&loan.user_id)
                .bind(loan.principal)
                .bind(loan.interest_rate_bps as i64)
                .bind(loan.term_months as i64)
                .bind(loan.loan_type.as_str())
                .bind(loan.status.as_str())
                .bind(&loan.reason)
                .bind(loan.applied_at.to_rfc3339())
                .bind(loan.approved_at.map(|dt| dt.to_rfc3339()))
                .bind(loan.monthly_payment)
                .bind(loan.total_repaid)
                .bind(loan.balance_remaining)
                .execute(pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Get a loan by ID.
    pub async fn find_loan(&self, id: LoanId) -> Result<Option<Loan>, StorageError> {
        let row = self
            .with_retry("fetch loan", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, principal_cents, interest_rate_bps, term_months,
                               loan_type, status, reason, applied_at, approved_at,
                               monthly_payment_cents, total_repaid_cents, balance_remaining_cents
                        FROM loans
                        WHERE id = ?
                        "#,
                    )
                    .bind(id.to_string())
                    .fetch_optional(pool)
                    .await
                }
            })
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_loan(&row)?)),
            None => Ok(None),
        }
    }

    /// List a user's loans, most recent application first.
    pub async fn find_loans_by_user(&self, user_id: &str) -> Result<Vec<Loan>, StorageError> {
        let rows = self
            .with_retry("list loans", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, principal_cents, interest_rate_bps, term_months,
                               loan_type, status, reason, applied_at, approved_at,
                               monthly_payment_cents, total_repaid_cents, balance_remaining_cents
                        FROM loans
                        WHERE user_id = ?
                        ORDER BY applied_at DESC
                        "#,
                    )
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
                }
            })
            .await?;

        rows.iter()
            .map(|row| Self::row_to_loan(row).map_err(StorageError::from))
            .collect()
    }

    /// Persist a full overwrite of a loan's mutable fields (status,
    /// approval stamp, running totals).
    pub async fn save_loan(&self, loan: &Loan) -> Result<(), StorageError> {
        self.with_retry("save loan", || {
            let pool = &self.pool;
            async move {
                sqlx::query(
                    r#"
                    UPDATE loans
                    SET status = ?, approved_at = ?, total_repaid_cents = ?, balance_remaining_cents = ?
                    WHERE id = ?
                    "#,
                )
                .bind(loan.status.as_str())
                .bind(loan.approved_at.map(|dt| dt.to_rfc3339()))
                .bind(loan.total_repaid)
                .bind(loan.balance_remaining)
                .bind(loan.id.to_string())
                .execute(pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Append a repayment and fold it into the loan's running totals, both
    /// rows in one storage transaction. The totals arithmetic runs in SQL
    /// against the stored row, not the caller's copy, and a balance that
    /// reaches zero flips the loan to `completed` in the same statement.
    /// Returns the updated loan.
    ///
    /// The schema's `balance_remaining_cents >= 0` constraint backstops
    /// overpayment: a racing repayment that slipped past the service's
    /// precondition fails the whole transaction.
    pub async fn record_repayment(&self, repayment: &Repayment) -> Result<Loan, StorageError> {
        let snapshot = repayment.clone();
        let row = self
            .with_retry("record repayment", || {
                let pool = &self.pool;
                let repayment = snapshot.clone();
                async move {
                    let mut tx = pool.begin().await?;

                    let row = sqlx::query(
                        r#"
                        UPDATE loans
                        SET total_repaid_cents = total_repaid_cents + ?,
                            balance_remaining_cents = balance_remaining_cents - ?,
                            status = CASE WHEN balance_remaining_cents - ? = 0 THEN 'completed' ELSE status END
                        WHERE id = ?
                        RETURNING id, user_id, principal_cents, interest_rate_bps, term_months,
                                  loan_type, status, reason, applied_at, approved_at,
                                  monthly_payment_cents, total_repaid_cents, balance_remaining_cents
                        "#,
                    )
                    .bind(repayment.amount)
                    .bind(repayment.amount)
                    .bind(repayment.amount)
                    .bind(repayment.loan_id.to_string())
                    .fetch_one(&mut *tx)
                    .await?;

                    sqlx::query(
                        r#"
                        INSERT INTO loan_repayments (id, loan_id, amount_cents, paid_at)
                        VALUES (?, ?, ?, ?)
                        "#,
                    )
                    .bind(repayment.id.to_string())
                    .bind(repayment.loan_id.to_string())
                    .bind(repayment.amount)
                    .bind(repayment.paid_at.to_rfc3339())
                    .execute(&mut *tx)
                    .await?;

                    tx.commit().await?;
                    Ok(row)
                }
            })
            .await?;

        Ok(Self::row_to_loan(&row)?)
    }

    /// List a loan's repayments in the order they were made.
    pub async fn find_repayments(&self, loan_id: LoanId) -> Result<Vec<Repayment>, StorageError> {
        let rows = self
            .with_retry("list repayments", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, loan_id, amount_cents, paid_at
                        FROM loan_repayments
                        WHERE loan_id = ?
                        ORDER BY paid_at
                        "#,
                    )
                    .bind(loan_id.to_string())
                    .fetch_all(pool)
                    .await
                }
            })
            .await?;

        rows.iter()
            .map(|row| Self::row_to_repayment(row).map_err(StorageError::from))
            .collect()
    }

    fn row_to_loan(row: &SqliteRow) -> Result<Loan> {
        let id_str: String = row.get("id");
        let kind_str: String = row.get("loan_type");
        let status_str: String = row.get("status");
        let applied_at_str: String = row.get("applied_at");
        let approved_at_str: Option<String> = row.get("approved_at");

        Ok(Loan {
            id: Uuid::parse_str(&id_str).context("Invalid loan ID")?,
            user_id: row.get("user_id"),
            principal: row.get("principal_cents"),
            interest_rate_bps: u32::try_from(row.get::<i64, _>("interest_rate_bps"))
                .context("Invalid interest rate")?,
            term_months: u32::try_from(row.get::<i64, _>("term_months"))
                .context("Invalid loan term")?,
            loan_type: LoanKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid loan type: {}", kind_str))?,
            status: LoanStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid loan status: {}", status_str))?,
            reason: row.get("reason"),
            applied_at: DateTime::parse_from_rfc3339(&applied_at_str)
                .context("Invalid applied_at timestamp")?
                .with_timezone(&Utc),
            approved_at: approved_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid approved_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
            monthly_payment: row.get("monthly_payment_cents"),
            total_repaid: row.get("total_repaid_cents"),
            balance_remaining: row.get("balance_remaining_cents"),
        })
    }

    fn row_to_repayment(row: &SqliteRow) -> Result<Repayment> {
        let id_str: String = row.get("id");
        let loan_id_str: String = row.get("loan_id");
        let paid_at_str: String = row.get("paid_at");

        Ok(Repayment {
            id: Uuid::parse_str(&id_str).context("Invalid repayment ID")?,
            loan_id: Uuid::parse_str(&loan_id_str).context("Invalid loan ID")?,
            amount: row.get("amount_cents"),
            paid_at: DateTime::parse_from_rfc3339(&paid_at_str)
                .context("Invalid paid_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Budget operations
    // ========================

    /// Insert or overwrite the budget for (user, category, period).
    pub async fn upsert_category_budget(&self, budget: &Budget) -> Result<(), StorageError> {
        self.with_retry("save budget", || {
            let pool = &self.pool;
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO budgets (id, user_id, category, amount_cents, month, year, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT (user_id, category, month, year)
                    DO UPDATE SET amount_cents = excluded.amount_cents
                    "#,
                )
                .bind(budget.id.to_string())
                .bind(&budget.user_id)
                .bind(&budget.category)
                .bind(budget.amount)
                .bind(budget.period.month as i64)
                .bind(budget.period.year as i64)
                .bind(budget.created_at.to_rfc3339())
                .execute(pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// List a user's category budgets for one period, sorted by category.
    pub async fn find_category_budgets(
        &self,
        user_id: &str,
        period: Period,
    ) -> Result<Vec<Budget>, StorageError> {
        let rows = self
            .with_retry("list budgets", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, category, amount_cents, month, year, created_at
                        FROM budgets
                        WHERE user_id = ? AND month = ? AND year = ?
                        ORDER BY category
                        "#,
                    )
                    .bind(user_id)
                    .bind(period.month as i64)
                    .bind(period.year as i64)
                    .fetch_all(pool)
                    .await
                }
            })
            .await?;

        rows.iter()
            .map(|row| Self::row_to_budget(row).map_err(StorageError::from))
            .collect()
    }

    /// List every category budget a user has, all periods.
    pub async fn find_budgets_by_user(&self, user_id: &str) -> Result<Vec<Budget>, StorageError> {
        let rows = self
            .with_retry("list budgets", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, category, amount_cents, month, year, created_at
                        FROM budgets
                        WHERE user_id = ?
                        ORDER BY year, month, category
                        "#,
                    )
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
                }
            })
            .await?;

        rows.iter()
            .map(|row| Self::row_to_budget(row).map_err(StorageError::from))
            .collect()
    }

    /// Sum of a user's category budgets for one period.
    pub async fn sum_category_budgets(
        &self,
        user_id: &str,
        period: Period,
    ) -> Result<Cents, StorageError> {
        self.with_retry("sum budgets", || {
            let pool = &self.pool;
            async move {
                let row = sqlx::query(
                    r#"
                    SELECT COALESCE(SUM(amount_cents), 0) as total
                    FROM budgets
                    WHERE user_id = ? AND month = ? AND year = ?
                    "#,
                )
                .bind(user_id)
                .bind(period.month as i64)
                .bind(period.year as i64)
                .fetch_one(pool)
                .await?;
                Ok(row.get("total"))
            }
        })
        .await
    }

    /// Delete the budget for (user, category, period). Returns whether a
    /// row existed.
    pub async fn delete_category_budget(
        &self,
        user_id: &str,
        category: &str,
        period: Period,
    ) -> Result<bool, StorageError> {
        let result = self
            .with_retry("delete budget", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        "DELETE FROM budgets WHERE user_id = ? AND category = ? AND month = ? AND year = ?",
                    )
                    .bind(user_id)
                    .bind(category)
                    .bind(period.month as i64)
                    .bind(period.year as i64)
                    .execute(pool)
                    .await
                }
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or overwrite the overall budget for (user, period).
    pub async fn upsert_overall_budget(&self, budget: &OverallBudget) -> Result<(), StorageError> {
        self.with_retry("save overall budget", || {
            let pool = &self.pool;
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO overall_budgets (id, user_id, total_cents, month, year, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT (user_id, month, year)
                    DO UPDATE SET total_cents = excluded.total_cents
                    "#,
                )
                .bind(budget.id.to_string())
                .bind(&budget.user_id)
                .bind(budget.total)
                .bind(budget.period.month as i64)
                .bind(budget.period.year as i64)
                .bind(budget.created_at.to_rfc3339())
                .execute(pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Get the overall budget for (user, period), if one was set.
    pub async fn find_overall_budget(
        &self,
        user_id: &str,
        period: Period,
    ) -> Result<Option<OverallBudget>, StorageError> {
        let row = self
            .with_retry("fetch overall budget", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, total_cents, month, year, created_at
                        FROM overall_budgets
                        WHERE user_id = ? AND month = ? AND year = ?
                        "#,
                    )
                    .bind(user_id)
                    .bind(period.month as i64)
                    .bind(period.year as i64)
                    .fetch_optional(pool)
                    .await
                }
            })
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_overall_budget(&row)?)),
            None => Ok(None),
        }
    }

    /// List every overall budget a user has, all periods.
    pub async fn find_overall_budgets_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<OverallBudget>, StorageError> {
        let rows = self
            .with_retry("list overall budgets", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, total_cents, month, year, created_at
                        FROM overall_budgets
                        WHERE user_id = ?
                        ORDER BY year, month
                        "#,
                    )
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
                }
            })
            .await?;

        rows.iter()
            .map(|row| Self::row_to_overall_budget(row).map_err(StorageError::from))
            .collect()
    }

    fn row_to_budget(row: &SqliteRow) -> Result<Budget> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Budget {
            id: Uuid::parse_str(&id_str).context("Invalid budget ID")?,
            user_id: row.get("user_id"),
            category: row.get("category"),
            amount: row.get("amount_cents"),
            period: Self::row_to_period(row)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_overall_budget(row: &SqliteRow) -> Result<OverallBudget> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(OverallBudget {
            id: Uuid::parse_str(&id_str).context("Invalid budget ID")?,
            user_id: row.get("user_id"),
            total: row.get("total_cents"),
            period: Self::row_to_period(row)?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_period(row: &SqliteRow) -> Result<Period> {
        let month = u32::try_from(row.get::<i64, _>("month")).context("Invalid month")?;
        let year = i32::try_from(row.get::<i64, _>("year")).context("Invalid year")?;
        Period::new(month, year).ok_or_else(|| anyhow::anyhow!("Invalid period: {}/{}", month, year))
    }

    // ========================
    // Savings goal operations
    // ========================

    /// Save a new savings goal. The (user, name) unique index rejects
    /// duplicates as a constraint violation.
    pub async fn insert_savings_goal(&self, goal: &SavingsGoal) -> Result<(), StorageError> {
        self.with_retry("save savings goal", || {
            let pool = &self.pool;
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO savings_goals (id, user_id, name, target_cents, saved_cents, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(goal.id.to_string())
                .bind(&goal.user_id)
                .bind(&goal.name)
                .bind(goal.target)
                .bind(goal.saved)
                .bind(goal.created_at.to_rfc3339())
                .execute(pool)
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Get a savings goal by (user, name).
    pub async fn find_savings_goal(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<SavingsGoal>, StorageError> {
        let row = self
            .with_retry("fetch savings goal", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, name, target_cents, saved_cents, created_at
                        FROM savings_goals
                        WHERE user_id = ? AND name = ?
                        "#,
                    )
                    .bind(user_id)
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                }
            })
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_savings_goal(&row)?)),
            None => Ok(None),
        }
    }

    /// List a user's savings goals, sorted by name.
    pub async fn find_savings_goals(
        &self,
        user_id: &str,
    ) -> Result<Vec<SavingsGoal>, StorageError> {
        let rows = self
            .with_retry("list savings goals", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        SELECT id, user_id, name, target_cents, saved_cents, created_at
                        FROM savings_goals
                        WHERE user_id = ?
                        ORDER BY name
                        "#,
                    )
                    .bind(user_id)
                    .fetch_all(pool)
                    .await
                }
            })
            .await?;

        rows.iter()
            .map(|row| Self::row_to_savings_goal(row).map_err(StorageError::from))
            .collect()
    }

    /// Add to a goal's saved amount in place. Returns the updated goal, or
    /// None when no such goal exists.
    pub async fn add_to_savings_goal(
        &self,
        user_id: &str,
        name: &str,
        delta: Cents,
    ) -> Result<Option<SavingsGoal>, StorageError> {
        let row = self
            .with_retry("update savings goal", || {
                let pool = &self.pool;
                async move {
                    sqlx::query(
                        r#"
                        UPDATE savings_goals
                        SET saved_cents = saved_cents + ?
                        WHERE user_id = ? AND name = ?
                        RETURNING id, user_id, name, target_cents, saved_cents, created_at
                        "#,
                    )
                    .bind(delta)
                    .bind(user_id)
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                }
            })
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_savings_goal(&row)?)),
            None => Ok(None),
        }
    }

    /// Delete a savings goal. Returns whether a row existed.
    pub async fn delete_savings_goal(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<bool, StorageError> {
        let result = self
            .with_retry("delete savings goal", || {
                let pool = &self.pool;
                async move {
                    sqlx::query("DELETE FROM savings_goals WHERE user_id = ? AND name = ?")
                        .bind(user_id)
                        .bind(name)
                        .execute(pool)
                        .await
                }
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_savings_goal(row: &SqliteRow) -> Result<SavingsGoal> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(SavingsGoal {
            id: Uuid::parse_str(&id_str).context("Invalid savings goal ID")?,
            user_id: row.get("user_id"),
            name: row.get("name"),
            target: row.get("target_cents"),
            saved: row.get("saved_cents"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Integrity checks
    // ========================

    /// Get statistics for integrity checking.
    pub async fn integrity_stats(&self) -> Result<IntegrityStats, StorageError> {
        self.with_retry("collect integrity stats", || {
            let pool = &self.pool;
            async move {
                let account_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
                    .fetch_one(pool)
                    .await?
                    .get("count");

                let transaction_count: i64 =
                    sqlx::query("SELECT COUNT(*) as count FROM transactions")
                        .fetch_one(pool)
                        .await?
                        .get("count");

                let sequence_check = sqlx::query(
                    r#"
                    SELECT MIN(sequence) as min_seq, MAX(sequence) as max_seq, COUNT(*) as count
                    FROM transactions
                    "#,
                )
                .fetch_one(pool)
                .await?;

                let min_seq: Option<i64> = sequence_check.get("min_seq");
                let max_seq: Option<i64> = sequence_check.get("max_seq");
                let count: i64 = sequence_check.get("count");
                let has_sequence_gaps = match (min_seq, max_seq) {
                    (Some(min), Some(max)) => (max - min + 1) != count,
                    _ => false,
                };

                let dangling_account_refs: i64 = sqlx::query(
                    r#"
                    SELECT COUNT(*) as count
                    FROM transactions t
                    WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.account_id)
                    "#,
                )
                .fetch_one(pool)
                .await?
                .get("count");

                let nonpositive_amounts: i64 = sqlx::query(
                    "SELECT COUNT(*) as count FROM transactions WHERE amount_cents <= 0",
                )
                .fetch_one(pool)
                .await?
                .get("count");

                let balance_mismatches: i64 = sqlx::query(
                    r#"
                    SELECT COUNT(*) as count
                    FROM accounts a
                    WHERE a.balance_cents != (
                        SELECT COALESCE(SUM(
                            CASE WHEN t.transaction_type IN ('deposit', 'transfer_in')
                                 THEN t.amount_cents
                                 ELSE -t.amount_cents
                            END
                        ), 0)
                        FROM transactions t
                        WHERE t.account_id = a.id
                    )
                    "#,
                )
                .fetch_one(pool)
                .await?
                .get("count");

                Ok(IntegrityStats {
                    account_count,
                    transaction_count,
                    has_sequence_gaps,
                    dangling_account_refs,
                    nonpositive_amounts,
                    balance_mismatches,
                })
            }
        })
        .await
    }
}
