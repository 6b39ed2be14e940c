use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{LedgerService, LoanService, PlannerService};
use crate::domain::{format_cents, parse_cents, AccountId, Period};

/// Penny - Personal Banking Ledger
#[derive(Parser)]
#[command(name = "penny")]
#[command(about = "A local-first personal banking ledger with loans and budget planning")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "penny.db")]
    pub database: String,

    /// User the command acts as
    #[arg(short, long, global = true, default_value = "default")]
    pub user: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Deposit money into an account
    Deposit {
        /// Amount to deposit (e.g., "50.00" or "50")
        amount: String,

        /// Account ID
        #[arg(long)]
        account: String,
    },

    /// Withdraw money from an account
    Withdraw {
        /// Amount to withdraw (e.g., "50.00" or "50")
        amount: String,

        /// Account ID
        #[arg(long)]
        account: String,
    },

    /// Transfer money between accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: String,

        /// Destination account ID
        #[arg(long)]
        to: String,
    },

    /// Show the balance of an account
    Balance {
        /// Account ID
        account: String,
    },

    /// Show the transaction history of an account, newest first
    History {
        /// Account ID
        account: String,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Loan management commands
    #[command(subcommand)]
    Loan(LoanCommands),

    /// Budget management commands
    #[command(subcommand)]
    Budget(BudgetCommands),

    /// Savings goal commands
    #[command(subcommand)]
    Savings(SavingsCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: statement, accounts, full
        export_type: String,

        /// Account ID (required for statement export)
        #[arg(long)]
        account: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Create {
        /// Account type: savings, checking
        #[arg(short = 't', long = "type", default_value = "checking")]
        account_type: String,
    },

    /// List your accounts
    List,

    /// Show detailed account information
    Show {
        /// Account ID
        id: String,
    },

    /// Update account fields (kind, active)
    Update {
        /// Account ID
        id: String,

        /// Field updates in FIELD=VALUE form (e.g., "kind=savings", "active=false")
        #[arg(short, long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum LoanCommands {
    /// Apply for a loan
    Apply {
        /// Principal amount (e.g., "1000.00" or "1000")
        amount: String,

        /// Annual interest rate in percent (e.g., "12" or "12.5")
        #[arg(short, long)]
        rate: String,

        /// Term in months
        #[arg(long)]
        term: u32,

        /// Loan type: full, installment, collateral
        #[arg(short = 't', long = "type", default_value = "full")]
        loan_type: String,

        /// Reason for the loan
        #[arg(long)]
        reason: Option<String>,
    },

    /// List your loans
    List,

    /// Show detailed loan information
    Show {
        /// Loan ID
        id: String,
    },

    /// Approve a pending loan
    Approve {
        /// Loan ID
        id: String,
    },

    /// Reject a pending loan
    Reject {
        /// Loan ID
        id: String,
    },

    /// Make a repayment on an approved loan
    Repay {
        /// Loan ID
        id: String,

        /// Amount to repay (e.g., "100.00" or "100")
        amount: String,
    },
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Set the overall budget for a month
    SetOverall {
        /// Total budget amount (e.g., "2000" or "2000.00")
        amount: String,

        /// Month 1-12 (defaults to the current month)
        #[arg(short, long)]
        month: Option<u32>,

        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Set a category budget for a month
    Set {
        /// Category to cap (e.g., "groceries")
        category: String,

        /// Budget amount (e.g., "400" or "400.00")
        amount: String,

        /// Month 1-12 (defaults to the current month)
        #[arg(short, long)]
        month: Option<u32>,

        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// List category budgets for a month
    List {
        /// Month 1-12 (defaults to the current month)
        #[arg(short, long)]
        month: Option<u32>,

        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Show what remains of the overall budget after allocations
    Summary {
        /// Month 1-12 (defaults to the current month)
        #[arg(short, long)]
        month: Option<u32>,

        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Delete a category budget
    Delete {
        /// Category name
        category: String,

        /// Month 1-12 (defaults to the current month)
        #[arg(short, long)]
        month: Option<u32>,

        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,
    },
}

#[derive(Subcommand)]
pub enum SavingsCommands {
    /// Create a new savings goal
    Create {
        /// Goal name (must be unique per user)
        name: String,

        /// Target amount (e.g., "5000" or "5000.00")
        target: String,
    },

    /// Add money towards a goal
    Save {
        /// Goal name
        name: String,

        /// Amount to add (e.g., "100.00" or "100")
        amount: String,
    },

    /// List your savings goals
    List,

    /// Delete a savings goal
    Delete {
        /// Goal name
        name: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Account(account_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_account_command(&service, &self.user, account_cmd).await?;
            }

            Commands::Deposit { amount, account } => {
                let service = LedgerService::connect(&self.database).await?;
                let account_id = parse_id(&account)?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let balance = service.deposit(&self.user, account_id, amount_cents).await?;
                println!(
                    "Deposited {} into {} (balance: {})",
                    format_cents(amount_cents),
                    account_id,
                    format_cents(balance)
                );
            }

            Commands::Withdraw { amount, account } => {
                let service = LedgerService::connect(&self.database).await?;
                let account_id = parse_id(&account)?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let balance = service
                    .withdraw(&self.user, account_id, amount_cents)
                    .await?;
                println!(
                    "Withdrew {} from {} (balance: {})",
                    format_cents(amount_cents),
                    account_id,
                    format_cents(balance)
                );
            }

            Commands::Transfer { amount, from, to } => {
                let service = LedgerService::connect(&self.database).await?;
                let from_id = parse_id(&from)?;
                let to_id = parse_id(&to)?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let (from_balance, to_balance) = service
                    .transfer_funds(&self.user, from_id, to_id, amount_cents)
                    .await?;
                println!(
                    "Transferred {} from {} to {}",
                    format_cents(amount_cents),
                    from_id,
                    to_id
                );
                println!("  Source balance:      {}", format_cents(from_balance));
                println!("  Destination balance: {}", format_cents(to_balance));
            }

            Commands::Balance { account } => {
                let service = LedgerService::connect(&self.database).await?;
                let account_id = parse_id(&account)?;
                let balance = service.check_funds(account_id).await?;
                println!("{}: {}", account_id, format_cents(balance));
            }

            Commands::History { account, limit } => {
                let service = LedgerService::connect(&self.database).await?;
                let account_id = parse_id(&account)?;
                run_history_command(&service, account_id, limit).await?;
            }

            Commands::Loan(loan_cmd) => {
                let ledger = LedgerService::connect(&self.database).await?;
                let service = LoanService::new(ledger.repository());
                run_loan_command(&service, &self.user, loan_cmd).await?;
            }

            Commands::Budget(budget_cmd) => {
                let ledger = LedgerService::connect(&self.database).await?;
                let service = PlannerService::new(ledger.repository());
                run_budget_command(&service, &self.user, budget_cmd).await?;
            }

            Commands::Savings(savings_cmd) => {
                let ledger = LedgerService::connect(&self.database).await?;
                let service = PlannerService::new(ledger.repository());
                run_savings_command(&service, &self.user, savings_cmd).await?;
            }

            Commands::Export {
                export_type,
                account,
                output,
            } => {
                let ledger = LedgerService::connect(&self.database).await?;
                let loans = LoanService::new(ledger.repository());
                let planner = PlannerService::new(ledger.repository());
                run_export_command(
                    &ledger,
                    &loans,
                    &planner,
                    &self.user,
                    &export_type,
                    account.as_deref(),
                    output.as_deref(),
                )
                .await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(
    service: &LedgerService,
    user: &str,
    cmd: AccountCommands,
) -> Result<()> {
    match cmd {
        AccountCommands::Create { account_type } => {
            let account = service.create_account(user, &account_type).await?;
            println!("Created {} account: {}", account.account_type, account.id);
        }

        AccountCommands::List => {
            let accounts = service.get_accounts_by_user(user).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<36} {:<10} {:>12} {:<8}",
                    "ID", "TYPE", "BALANCE", "ACTIVE"
                );
                println!("{}", "-".repeat(70));
                for account in accounts {
                    println!(
                        "{:<36} {:<10} {:>12} {:<8}",
                        account.id,
                        account.account_type,
                        format_cents(account.balance),
                        if account.active { "yes" } else { "no" }
                    );
                }
            }
        }

        AccountCommands::Show { id } => {
            let account_id = parse_id(&id)?;
            let accounts = service.get_accounts_by_user(user).await?;
            let account = accounts
                .iter()
                .find(|a| a.id == account_id)
                .with_context(|| format!("No account {} owned by {}", account_id, user))?;

            println!("Account: {}", account.id);
            println!("  Owner:    {}", account.user_id);
            println!("  Type:     {}", account.account_type);
            println!("  Balance:  {}", format_cents(account.balance));
            println!("  Active:   {}", if account.active { "yes" } else { "no" });
            println!(
                "  Created:  {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        AccountCommands::Update { id, set } => {
            let account_id = parse_id(&id)?;
            let changes = parse_field_updates(&set)?;
            let account = service.update_account(account_id, &changes).await?;
            println!(
                "Updated account {}: type={}, active={}",
                account.id, account.account_type, account.active
            );
        }
    }
    Ok(())
}

async fn run_history_command(
    service: &LedgerService,
    account_id: AccountId,
    limit: Option<usize>,
) -> Result<()> {
    let entries = service.get_transaction_history(account_id).await?;

    if entries.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:>6} {:<20} {:<13} {:>12}",
        "SEQ", "DATE", "TYPE", "AMOUNT"
    );
    println!("{}", "-".repeat(54));

    let shown = limit.unwrap_or(entries.len());
    for entry in entries.iter().take(shown) {
        println!(
            "{:>6} {:<20} {:<13} {:>12}",
            entry.sequence,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.transaction_type.to_string(),
            format_cents(entry.signed_amount())
        );
    }

    if entries.len() > shown {
        println!("... and {} more", entries.len() - shown);
    }
    Ok(())
}

async fn run_loan_command(service: &LoanService, user: &str, cmd: LoanCommands) -> Result<()> {
    match cmd {
        LoanCommands::Apply {
            amount,
            rate,
            term,
            loan_type,
            reason,
        } => {
            let principal =
                parse_cents(&amount).context("Invalid amount format. Use '1000.00' or '1000'")?;
            let rate_bps = parse_rate_bps(&rate)?;

            let loan = service
                .apply_for_loan(user, principal, rate_bps, term, &loan_type, reason)
                .await?;
            println!("Loan application filed: {}", loan.id);
            println!("  Principal:       {}", format_cents(loan.principal));
            println!("  Rate:            {}% annual", format_cents(loan.interest_rate_bps as i64));
            println!("  Term:            {} months", loan.term_months);
            println!("  Monthly payment: {}", format_cents(loan.monthly_payment));
        }

        LoanCommands::List => {
            let loans = service.get_loans_by_user(user).await?;
            if loans.is_empty() {
                println!("No loans found.");
            } else {
                println!(
                    "{:<36} {:<12} {:<10} {:>12} {:>12}",
                    "ID", "TYPE", "STATUS", "PRINCIPAL", "REMAINING"
                );
                println!("{}", "-".repeat(88));
                for loan in loans {
                    println!(
                        "{:<36} {:<12} {:<10} {:>12} {:>12}",
                        loan.id,
                        loan.loan_type,
                        loan.status,
                        format_cents(loan.principal),
                        format_cents(loan.balance_remaining)
                    );
                }
            }
        }

        LoanCommands::Show { id } => {
            let loan_id = parse_id(&id)?;
            let loan = service.get_loan(loan_id).await?;

            println!("Loan: {}", loan.id);
            println!("  Borrower:        {}", loan.user_id);
            println!("  Type:            {}", loan.loan_type);
            println!("  Status:          {}", loan.status);
            println!("  Principal:       {}", format_cents(loan.principal));
            println!("  Rate:            {}% annual", format_cents(loan.interest_rate_bps as i64));
            println!("  Term:            {} months", loan.term_months);
            println!("  Monthly payment: {}", format_cents(loan.monthly_payment));
            if let Some(reason) = &loan.reason {
                println!("  Reason:          {}", reason);
            }
            println!(
                "  Applied:         {}",
                loan.applied_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(approved_at) = loan.approved_at {
                println!(
                    "  Approved:        {}",
                    approved_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            println!("  Repaid:          {}", format_cents(loan.total_repaid));
            println!("  Remaining:       {}", format_cents(loan.balance_remaining));

            let repayments = service.get_repayments(loan_id).await?;
            if !repayments.is_empty() {
                println!();
                println!("  Repayments:");
                for repayment in &repayments {
                    println!(
                        "    - {} on {}",
                        format_cents(repayment.amount),
                        repayment.paid_at.format("%Y-%m-%d")
                    );
                }
            }
        }

        LoanCommands::Approve { id } => {
            let loan = service.approve_loan(parse_id(&id)?).await?;
            println!("Approved loan: {}", loan.id);
        }

        LoanCommands::Reject { id } => {
            let loan = service.reject_loan(parse_id(&id)?).await?;
            println!("Rejected loan: {}", loan.id);
        }

        LoanCommands::Repay { id, amount } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '100.00' or '100'")?;
            let loan = service.make_repayment(parse_id(&id)?, amount_cents).await?;
            println!(
                "Repaid {} on loan {} (remaining: {})",
                format_cents(amount_cents),
                loan.id,
                format_cents(loan.balance_remaining)
            );
            if loan.balance_remaining == 0 {
                println!("Loan fully repaid.");
            }
        }
    }
    Ok(())
}

async fn run_budget_command(
    service: &PlannerService,
    user: &str,
    cmd: BudgetCommands,
) -> Result<()> {
    match cmd {
        BudgetCommands::SetOverall {
            amount,
            month,
            year,
        } => {
            let total =
                parse_cents(&amount).context("Invalid amount format. Use '2000' or '2000.00'")?;
            let (month, year) = resolve_period(month, year);

            let overall = service.set_overall_budget(user, total, month, year).await?;
            println!(
                "Overall budget for {}: {}",
                overall.period,
                format_cents(overall.total)
            );
        }

        BudgetCommands::Set {
            category,
            amount,
            month,
            year,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '400' or '400.00'")?;
            let (month, year) = resolve_period(month, year);

            let budget = service
                .set_category_budget(user, &category, amount_cents, month, year)
                .await?;
            println!(
                "Budget for {} in {}: {}",
                budget.category,
                budget.period,
                format_cents(budget.amount)
            );
        }

        BudgetCommands::List { month, year } => {
            let (month, year) = resolve_period(month, year);
            let budgets = service.get_budgets(user, month, year).await?;
            if budgets.is_empty() {
                println!("No budgets found.");
            } else {
                println!("{:<20} {:>12}", "CATEGORY", "AMOUNT");
                println!("{}", "-".repeat(33));
                for budget in budgets {
                    println!(
                        "{:<20} {:>12}",
                        truncate(&budget.category, 20),
                        format_cents(budget.amount)
                    );
                }
            }
        }

        BudgetCommands::Summary { month, year } => {
            let (month, year) = resolve_period(month, year);
            let summary = service.budget_summary(user, month, year).await?;

            println!("Budget summary for {}", summary.period);
            println!("  Overall:    {:>12}", format_cents(summary.total));
            println!("  Allocated:  {:>12}", format_cents(summary.allocated));
            println!("  Remaining:  {:>12}", format_cents(summary.remaining));

            if !summary.budgets.is_empty() {
                println!();
                println!("  {:<20} {:>12}", "CATEGORY", "AMOUNT");
                for budget in &summary.budgets {
                    println!(
                        "  {:<20} {:>12}",
                        truncate(&budget.category, 20),
                        format_cents(budget.amount)
                    );
                }
            }
        }

        BudgetCommands::Delete {
            category,
            month,
            year,
        } => {
            let (month, year) = resolve_period(month, year);
            service
                .delete_category_budget(user, &category, month, year)
                .await?;
            println!("Deleted budget: {}", category);
        }
    }
    Ok(())
}

async fn run_savings_command(
    service: &PlannerService,
    user: &str,
    cmd: SavingsCommands,
) -> Result<()> {
    match cmd {
        SavingsCommands::Create { name, target } => {
            let target_cents =
                parse_cents(&target).context("Invalid amount format. Use '5000' or '5000.00'")?;
            let goal = service.add_savings_goal(user, &name, target_cents).await?;
            println!(
                "Created savings goal: {} (target {})",
                goal.name,
                format_cents(goal.target)
            );
        }

        SavingsCommands::Save { name, amount } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '100.00' or '100'")?;
            let goal = service.add_to_savings_goal(user, &name, amount_cents).await?;
            println!(
                "Saved {} towards {} ({} of {}, {}%)",
                format_cents(amount_cents),
                goal.name,
                format_cents(goal.saved),
                format_cents(goal.target),
                goal.progress_percent()
            );
            if goal.is_reached() {
                println!("Goal reached!");
            }
        }

        SavingsCommands::List => {
            let goals = service.get_savings_goals(user).await?;
            if goals.is_empty() {
                println!("No savings goals found.");
            } else {
                println!(
                    "{:<20} {:>12} {:>12} {:>9}",
                    "NAME", "SAVED", "TARGET", "PROGRESS"
                );
                println!("{}", "-".repeat(56));
                for goal in goals {
                    println!(
                        "{:<20} {:>12} {:>12} {:>8}%",
                        truncate(&goal.name, 20),
                        format_cents(goal.saved),
                        format_cents(goal.target),
                        goal.progress_percent()
                    );
                }
            }
        }

        SavingsCommands::Delete { name } => {
            service.delete_savings_goal(user, &name).await?;
            println!("Deleted savings goal: {}", name);
        }
    }
    Ok(())
}

async fn run_export_command(
    ledger: &LedgerService,
    loans: &LoanService,
    planner: &PlannerService,
    user: &str,
    export_type: &str,
    account: Option<&str>,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(ledger, loans, planner);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "statement" => {
            let account_id = account
                .context("Statement export requires --account")
                .and_then(parse_id)?;
            let count = exporter.export_statement_csv(account_id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "accounts" => {
            let count = exporter.export_accounts_csv(user, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} accounts", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(user, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full snapshot: {} accounts, {} transactions, {} loans, {} budgets, {} savings goals",
                    snapshot.accounts.len(),
                    snapshot.transactions.len(),
                    snapshot.loans.len(),
                    snapshot.budgets.len(),
                    snapshot.savings_goals.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: statement, accounts, full",
                export_type
            );
        }
    }

    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let stats = service.check_integrity().await?;

    println!("Accounts:     {}", stats.account_count);
    println!("Transactions: {}", stats.transaction_count);
    println!();

    if stats.is_clean() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        if stats.has_sequence_gaps {
            println!("  - gaps in the transaction sequence");
        }
        if stats.dangling_account_refs > 0 {
            println!(
                "  - {} transaction(s) referencing missing accounts",
                stats.dangling_account_refs
            );
        }
        if stats.nonpositive_amounts > 0 {
            println!(
                "  - {} transaction(s) with non-positive amounts",
                stats.nonpositive_amounts
            );
        }
        if stats.balance_mismatches > 0 {
            println!(
                "  - {} account balance(s) disagreeing with their history",
                stats.balance_mismatches
            );
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

fn parse_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).context("Invalid ID format (expected UUID)")
}

fn parse_field_updates(set: &[String]) -> Result<Vec<(String, String)>> {
    set.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(field, value)| (field.to_string(), value.to_string()))
                .with_context(|| format!("Invalid update '{}'. Use FIELD=VALUE", pair))
        })
        .collect()
}

// Annual percent to basis points: "12.5" -> 1250. Rates and amounts share
// the same two-decimal scaling, so the cents parser does the work.
fn parse_rate_bps(rate: &str) -> Result<u32> {
    let bps = parse_cents(rate).context("Invalid rate format. Use '12' or '12.5'")?;
    u32::try_from(bps).context("Rate out of range")
}

fn resolve_period(month: Option<u32>, year: Option<i32>) -> (u32, i32) {
    let current = Period::current();
    (month.unwrap_or(current.month), year.unwrap_or(current.year))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    // The cut must land on a char boundary; names are not always ASCII.
    let mut end = max_len.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate_bps() {
        assert_eq!(parse_rate_bps("12").unwrap(), 1_200);
        assert_eq!(parse_rate_bps("12.5").unwrap(), 1_250);
        assert_eq!(parse_rate_bps("0").unwrap(), 0);
        assert!(parse_rate_bps("-1").is_err());
        assert!(parse_rate_bps("twelve").is_err());
    }

    #[test]
    fn test_truncate_plain_names() {
        assert_eq!(truncate("groceries", 20), "groceries");
        assert_eq!(truncate("a very long category name", 20), "a very long categ...");
    }

    #[test]
    fn test_truncate_never_splits_a_character() {
        let name = "ü".repeat(11);
        assert_eq!(truncate(&name, 20), format!("{}...", "ü".repeat(8)));

        let name = "救急費用のための貯金";
        assert_eq!(truncate(name, 20), "救急費用の...");
    }
}
