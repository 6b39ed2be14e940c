mod common;

use anyhow::Result;
use common::{funded_account, test_service, ALICE, BOB};
use penny::application::AppError;
use uuid::Uuid;

#[tokio::test]
async fn test_create_account_starts_empty_and_active() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let account = service.create_account(ALICE, "savings").await?;

    assert_eq!(account.user_id, ALICE);
    assert_eq!(account.balance, 0);
    assert!(account.active);
    assert_eq!(account.account_type.to_string(), "savings");

    // The account is immediately visible in the owner's listing
    let accounts = service.get_accounts_by_user(ALICE).await?;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, account.id);

    Ok(())
}

#[tokio::test]
async fn test_create_account_rejects_unknown_type() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service.create_account(ALICE, "offshore").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAccountKind(_)));

    Ok(())
}

#[tokio::test]
async fn test_accounts_are_scoped_to_their_owner() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service.create_account(ALICE, "checking").await?;
    service.create_account(ALICE, "savings").await?;
    service.create_account(BOB, "checking").await?;

    assert_eq!(service.get_accounts_by_user(ALICE).await?.len(), 2);
    assert_eq!(service.get_accounts_by_user(BOB).await?.len(), 1);
    assert!(service.get_accounts_by_user("carol").await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_deposit_increases_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = service.create_account(ALICE, "checking").await?;

    let balance = service.deposit(ALICE, account.id, 5000).await?;
    assert_eq!(balance, 5000);

    let balance = service.deposit(ALICE, account.id, 2550).await?;
    assert_eq!(balance, 7550);

    assert_eq!(service.check_funds(account.id).await?, 7550);

    Ok(())
}

#[tokio::test]
async fn test_deposit_rejects_nonpositive_amounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = service.create_account(ALICE, "checking").await?;

    let err = service.deposit(ALICE, account.id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount));

    let err = service.deposit(ALICE, account.id, -100).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount));

    // Nothing was recorded
    assert_eq!(service.check_funds(account.id).await?, 0);
    assert!(service.get_transaction_history(account.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_deposit_requires_ownership() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, ALICE, 10000).await?;

    let err = service.deposit(BOB, account.id, 5000).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized { .. }));

    // Balance unchanged
    assert_eq!(service.check_funds(account.id).await?, 10000);

    Ok(())
}

#[tokio::test]
async fn test_deposit_into_missing_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service.deposit(ALICE, Uuid::new_v4(), 100).await.unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_withdraw_decreases_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, ALICE, 10000).await?;

    let balance = service.withdraw(ALICE, account.id, 3000).await?;
    assert_eq!(balance, 7000);

    // Withdrawing the exact remaining balance empties the account
    let balance = service.withdraw(ALICE, account.id, 7000).await?;
    assert_eq!(balance, 0);

    Ok(())
}

#[tokio::test]
async fn test_withdraw_rejects_overdraft() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, ALICE, 5000).await?;

    let err = service.withdraw(ALICE, account.id, 5001).await.unwrap_err();
    match err {
        AppError::InsufficientFunds {
            balance, required, ..
        } => {
            assert_eq!(balance, 5000);
            assert_eq!(required, 5001);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    // The failed withdrawal left no trace
    assert_eq!(service.check_funds(account.id).await?, 5000);
    assert_eq!(service.get_transaction_history(account.id).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_withdraw_requires_ownership() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, ALICE, 10000).await?;

    let err = service.withdraw(BOB, account.id, 100).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized { .. }));
    assert_eq!(service.check_funds(account.id).await?, 10000);

    Ok(())
}

#[tokio::test]
async fn test_inactive_account_refuses_money_operations() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, ALICE, 10000).await?;

    service
        .update_account(
            account.id,
            &[("active".to_string(), "false".to_string())],
        )
        .await?;

    let err = service.deposit(ALICE, account.id, 100).await.unwrap_err();
    assert!(matches!(err, AppError::InactiveAccount(_)));

    let err = service.withdraw(ALICE, account.id, 100).await.unwrap_err();
    assert!(matches!(err, AppError::InactiveAccount(_)));

    // Reads still work
    assert_eq!(service.check_funds(account.id).await?, 10000);
    assert_eq!(service.get_transaction_history(account.id).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_reactivated_account_accepts_deposits_again() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, ALICE, 1000).await?;

    service
        .update_account(
            account.id,
            &[("active".to_string(), "false".to_string())],
        )
        .await?;
    service
        .update_account(
            account.id,
            &[("active".to_string(), "true".to_string())],
        )
        .await?;

    let balance = service.deposit(ALICE, account.id, 500).await?;
    assert_eq!(balance, 1500);

    Ok(())
}

#[tokio::test]
async fn test_update_account_changes_kind() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = service.create_account(ALICE, "checking").await?;

    let updated = service
        .update_account(
            account.id,
            &[("kind".to_string(), "savings".to_string())],
        )
        .await?;
    assert_eq!(updated.account_type.to_string(), "savings");

    // "account_type" is accepted as an alias for "kind"
    let updated = service
        .update_account(
            account.id,
            &[("account_type".to_string(), "checking".to_string())],
        )
        .await?;
    assert_eq!(updated.account_type.to_string(), "checking");

    Ok(())
}

#[tokio::test]
async fn test_update_account_rejects_unknown_fields_and_values() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = funded_account(&service, ALICE, 10000).await?;

    // Balance is not directly writable
    let err = service
        .update_account(
            account.id,
            &[("balance".to_string(), "0".to_string())],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidField(_)));

    let err = service
        .update_account(
            account.id,
            &[("kind".to_string(), "offshore".to_string())],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAccountKind(_)));

    let err = service
        .update_account(
            account.id,
            &[("active".to_string(), "maybe".to_string())],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidField(_)));

    // The rejected updates changed nothing
    assert_eq!(service.check_funds(account.id).await?, 10000);

    Ok(())
}

#[tokio::test]
async fn test_update_account_on_missing_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .update_account(
            Uuid::new_v4(),
            &[("active".to_string(), "false".to_string())],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_history_of_missing_account() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .get_transaction_history(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(_)));

    let err = service.check_funds(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_history_is_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = service.create_account(ALICE, "checking").await?;

    service.deposit(ALICE, account.id, 1000).await?;
    service.deposit(ALICE, account.id, 2000).await?;
    service.withdraw(ALICE, account.id, 500).await?;

    let history = service.get_transaction_history(account.id).await?;
    assert_eq!(history.len(), 3);

    // Newest first: sequences strictly decreasing
    assert!(history[0].sequence > history[1].sequence);
    assert!(history[1].sequence > history[2].sequence);

    assert_eq!(history[0].transaction_type.to_string(), "withdraw");
    assert_eq!(history[0].amount, 500);
    assert_eq!(history[2].transaction_type.to_string(), "deposit");
    assert_eq!(history[2].amount, 1000);

    Ok(())
}
