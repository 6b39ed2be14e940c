mod common;

use anyhow::Result;
use common::{funded_account, test_service, ALICE, BOB};
use penny::application::{AppError, LedgerService, LoanService};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_deposits_all_land() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = service.create_account(ALICE, "checking").await?;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let repo = service.repository();
        let account_id = account.id;
        handles.push(tokio::spawn(async move {
            let service = LedgerService::new(repo);
            for _ in 0..5 {
                service.deposit(ALICE, account_id, 100).await?;
            }
            anyhow::Ok(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(service.check_funds(account.id).await?, 2000);

    let history = service.get_transaction_history(account.id).await?;
    assert_eq!(history.len(), 20);

    // Newest first, and commit order agrees with sequence order
    for pair in history.windows(2) {
        assert!(pair[0].sequence > pair[1].sequence);
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }

    let stats = service.check_integrity().await?;
    assert!(stats.is_clean(), "integrity check failed: {stats:?}");

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_conserve_money() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = funded_account(&service, ALICE, 10000).await?;
    let b = funded_account(&service, BOB, 10000).await?;

    let forward = {
        let repo = service.repository();
        let (from, to) = (a.id, b.id);
        tokio::spawn(async move {
            let service = LedgerService::new(repo);
            let mut done = 0;
            for _ in 0..10 {
                if service.transfer_funds(ALICE, from, to, 300).await.is_ok() {
                    done += 1;
                }
            }
            done
        })
    };
    let backward = {
        let repo = service.repository();
        let (from, to) = (b.id, a.id);
        tokio::spawn(async move {
            let service = LedgerService::new(repo);
            let mut done = 0;
            for _ in 0..10 {
                if service.transfer_funds(BOB, from, to, 300).await.is_ok() {
                    done += 1;
                }
            }
            done
        })
    };

    let (forward_done, backward_done) = (forward.await?, backward.await?);
    assert!(forward_done > 0 && backward_done > 0);

    // Whatever interleaving happened, no money appeared or vanished
    let total = service.check_funds(a.id).await? + service.check_funds(b.id).await?;
    assert_eq!(total, 20000);

    assert!(service.check_funds(a.id).await? >= 0);
    assert!(service.check_funds(b.id).await? >= 0);

    let stats = service.check_integrity().await?;
    assert!(stats.is_clean(), "integrity check failed: {stats:?}");

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_repayments_never_overpay_a_loan() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let loans = LoanService::new(service.repository());

    let loan = loans.apply_for_loan(ALICE, 10_000, 0, 10, "full", None).await?;
    loans.approve_loan(loan.id).await?;

    // Two repayments of 7000 against a 10000 balance: whichever order they
    // land in, only one can fit
    let mut handles = Vec::new();
    for _ in 0..2 {
        let loans = LoanService::new(service.repository());
        let loan_id = loan.id;
        handles.push(tokio::spawn(
            async move { loans.make_repayment(loan_id, 7_000).await },
        ));
    }

    let mut repaid = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => repaid += 1,
            Err(AppError::RepaymentExceedsBalance { .. }) => rejected += 1,
            Err(err) => panic!("unexpected repayment outcome: {err}"),
        }
    }
    assert_eq!(repaid, 1);
    assert_eq!(rejected, 1);

    let loan = loans.get_loan(loan.id).await?;
    assert_eq!(loan.balance_remaining, 3_000);
    assert_eq!(loan.total_repaid, 7_000);

    // The repayment log agrees with the loan's totals
    let repayments = loans.get_repayments(loan.id).await?;
    assert_eq!(repayments.len(), 1);
    assert_eq!(repayments[0].amount, 7_000);

    Ok(())
}
