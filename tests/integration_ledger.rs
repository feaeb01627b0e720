//! Ledger and transfer integration tests

use rust_decimal_macros::dec;

use lucky_envelope::domain::{AccountType, Balance, ChangeFlag, ChangeType, DomainError, TransferAmount};
use lucky_envelope::ledger::{Ledger, NewAccount};
use lucky_envelope::transfer::{TradeParticipant, TransferCommand, TransferCoordinator, TransferOutcome};

mod common;

fn participant(account: &lucky_envelope::ledger::Account) -> TradeParticipant {
    TradeParticipant::new(&account.account_no, &account.user_id, &account.username)
}

#[tokio::test]
async fn test_conditional_update_balance_scenario() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let ledger = Ledger::new(pool.clone());
    let account = common::open_account(&pool, "bal", dec!(1000.00)).await;

    let mut conn = pool.acquire().await.unwrap();
    let rows = ledger
        .update_balance(&mut conn, &account.account_no, dec!(-100.00))
        .await
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(common::balance_of(&pool, &account.account_no).await, dec!(900.00));

    let rows = ledger
        .update_balance(&mut conn, &account.account_no, dec!(-100000.00))
        .await
        .unwrap();
    assert_eq!(rows, 0, "overdraft must be rejected by the conditional write");
    assert_eq!(common::balance_of(&pool, &account.account_no).await, dec!(900.00));
}

#[tokio::test]
async fn test_create_account_writes_seed_entry_and_rejects_duplicate() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let ledger = Ledger::new(pool.clone());
    let user_id = common::unique("dup");

    let account = ledger
        .create_account(NewAccount::new(
            &user_id,
            "dup",
            AccountType::Envelope,
            Balance::new(dec!(50.00)).unwrap(),
        ))
        .await
        .unwrap();

    let logs = ledger.account_logs(&account.account_no).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].change_type, ChangeType::AccountCreated);
    assert_eq!(logs[0].change_flag, ChangeFlag::Created);
    assert_eq!(logs[0].balance, dec!(50.00));

    let second = ledger
        .create_account(NewAccount::new(&user_id, "dup", AccountType::Envelope, Balance::zero()))
        .await;
    assert!(matches!(second, Err(DomainError::DuplicateAccount { .. })));

    // Another type for the same user is fine
    ledger
        .create_account(NewAccount::new(&user_id, "dup", AccountType::Points, Balance::zero()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_transfer_outcomes_and_replay() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let ledger = Ledger::new(pool.clone());
    let transfer = TransferCoordinator::new(ledger.clone());
    let account = common::open_account(&pool, "tx", dec!(10.00)).await;
    let body = participant(&account);

    let debit = TransferCommand::new(
        common::unique("T"),
        body.clone(),
        common::system_participant(),
        TransferAmount::Debit("4.50".parse().unwrap()),
        ChangeType::EnvelopeOutgoing,
    );
    match transfer.transfer(debit).await {
        TransferOutcome::Success(entry) => {
            assert_eq!(entry.amount, dec!(-4.50));
            assert_eq!(entry.balance, dec!(5.50));
            assert_eq!(entry.change_flag, ChangeFlag::TransferOut);
            assert_eq!(entry.target_account_no, common::SYSTEM_ACCOUNT_NO);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let overdraft = TransferCommand::new(
        common::unique("T"),
        body.clone(),
        common::system_participant(),
        TransferAmount::Debit("6.00".parse().unwrap()),
        ChangeType::EnvelopeOutgoing,
    );
    assert_eq!(transfer.transfer(overdraft).await, TransferOutcome::InsufficientFunds);

    let deposit = transfer.store_value(body, "1.25".parse().unwrap()).await;
    assert!(deposit.is_success());

    assert_eq!(common::balance_of(&pool, &account.account_no).await, dec!(6.75));
    assert_eq!(ledger.replay_balance(&account.account_no).await.unwrap(), dec!(6.75));

    // The rejected debit left no audit entry behind
    assert_eq!(ledger.account_logs(&account.account_no).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_concurrent_debits_never_overdraw() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let ledger = Ledger::new(pool.clone());
    let transfer = TransferCoordinator::new(ledger.clone());
    let account = common::open_account(&pool, "race", dec!(10.00)).await;

    let tasks: Vec<_> = (0..25)
        .map(|_| {
            let transfer = transfer.clone();
            let command = TransferCommand::new(
                common::unique("T"),
                participant(&account),
                common::system_participant(),
                TransferAmount::Debit("1.00".parse().unwrap()),
                ChangeType::EnvelopeOutgoing,
            );
            tokio::spawn(async move { transfer.transfer(command).await })
        })
        .collect();

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            TransferOutcome::Success(_) => succeeded += 1,
            TransferOutcome::InsufficientFunds => {}
            TransferOutcome::Failure(e) => panic!("unexpected failure {}", e),
        }
    }

    assert_eq!(succeeded, 10);
    assert_eq!(common::balance_of(&pool, &account.account_no).await, dec!(0));
    assert_eq!(ledger.replay_balance(&account.account_no).await.unwrap(), dec!(0));
}

#[tokio::test]
async fn test_credit_to_unknown_account_is_failure() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let transfer = TransferCoordinator::new(Ledger::new(pool.clone()));

    let ghost = TradeParticipant::new(common::unique("ghost"), "ghost", "ghost");
    let outcome = transfer.store_value(ghost, "1.00".parse().unwrap()).await;

    assert!(matches!(
        outcome,
        TransferOutcome::Failure(DomainError::InvariantViolation(_))
    ));
}
