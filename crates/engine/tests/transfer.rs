use std::sync::Arc;

use engine::{
    DepositCmd, EngineError, Money, NotificationFilter, PageRequest, TransactionKind,
    TransferCmd, notifier,
};
use serde_json::json;
use tokio::task::JoinSet;

mod common;

use common::{
    BrokenNotifier, FixedReferences, RecordingNotifier, ScriptedReferences, count_rows,
    engine_from, engine_with_db, engine_with_file_db, funded_user, total_balance,
};

#[tokio::test]
async fn transfer_moves_money_and_conserves_total() {
    let (engine, db) = engine_with_db().await;
    let ada = funded_user(&engine, "ada", 10_000).await;
    let bola = funded_user(&engine, "bola", 500).await;
    let before = total_balance(&db).await;

    let receipt = engine
        .transfer(TransferCmd::new(ada.id, bola.id, Money::new(3_000)))
        .await
        .unwrap();

    assert_eq!(receipt.sender_balance, Money::new(7_000));
    assert_eq!(engine.balance(ada.id).await.unwrap(), Money::new(7_000));
    assert_eq!(engine.balance(bola.id).await.unwrap(), Money::new(3_500));
    assert_eq!(total_balance(&db).await, before);

    let out = &receipt.sender_transaction;
    assert_eq!(out.user_id, ada.id);
    assert_eq!(out.kind, TransactionKind::TransferOut);
    assert_eq!(out.description, "Transfer to bola");
    assert!(out.reference.starts_with("TRO"));
    assert_eq!(out.metadata["recipient_id"], json!(bola.id));
    assert_eq!(out.metadata["recipient_name"], json!("bola"));

    let incoming = &receipt.recipient_transaction;
    assert_eq!(incoming.user_id, bola.id);
    assert_eq!(incoming.kind, TransactionKind::TransferIn);
    assert_eq!(incoming.description, "Transfer from ada");
    assert!(incoming.reference.starts_with("TRI"));
    assert_eq!(incoming.metadata["sender_name"], json!("ada"));
    assert_ne!(out.reference, incoming.reference);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transfer_in_both_directions_keeps_balances_consistent() {
    let (engine, db, path) = engine_with_file_db(|builder| builder).await;
    let ada = funded_user(&engine, "ada", 10_000).await;
    let bola = funded_user(&engine, "bola", 10_000).await;

    let mut tasks = JoinSet::new();
    for _ in 0..3 {
        for (from, to, cents) in [(ada.id, bola.id, 1_000), (bola.id, ada.id, 500)] {
            let engine = Arc::clone(&engine);
            tasks.spawn(async move {
                engine
                    .transfer(TransferCmd::new(from, to, Money::new(cents)))
                    .await
            });
        }
    }
    while let Some(outcome) = tasks.join_next().await {
        outcome.unwrap().unwrap();
    }

    assert_eq!(engine.balance(ada.id).await.unwrap(), Money::new(8_500));
    assert_eq!(engine.balance(bola.id).await.unwrap(), Money::new(11_500));
    assert_eq!(total_balance(&db).await, 20_000);
    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transfers_between_unrelated_pairs_all_succeed() {
    let (engine, db, path) = engine_with_file_db(|builder| builder).await;
    let mut pairs = Vec::new();
    for n in 0..4 {
        let sender = funded_user(&engine, &format!("sender{n}"), 10_000).await;
        let recipient = funded_user(&engine, &format!("recipient{n}"), 10_000).await;
        pairs.push((sender.id, recipient.id));
    }
    let rows = count_rows(&db, "transactions").await;

    let mut tasks = JoinSet::new();
    for _ in 0..5 {
        for &(from, to) in &pairs {
            let engine = Arc::clone(&engine);
            tasks.spawn(async move {
                engine
                    .transfer(TransferCmd::new(from, to, Money::new(100)))
                    .await
            });
        }
    }
    let mut failures = Vec::new();
    while let Some(outcome) = tasks.join_next().await {
        if let Err(err) = outcome.unwrap() {
            failures.push(err);
        }
    }

    assert!(failures.is_empty(), "transfers failed: {failures:?}");
    for (from, to) in pairs {
        assert_eq!(engine.balance(from).await.unwrap(), Money::new(9_500));
        assert_eq!(engine.balance(to).await.unwrap(), Money::new(10_500));
    }
    assert_eq!(total_balance(&db).await, 80_000);
    assert_eq!(count_rows(&db, "transactions").await, rows + 40);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn self_transfer_is_rejected_without_side_effects() {
    let (engine, db) = engine_with_db().await;
    let ada = funded_user(&engine, "ada", 10_000).await;
    let rows = count_rows(&db, "transactions").await;

    let err = engine
        .transfer(TransferCmd::new(ada.id, ada.id, Money::new(100)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::SelfTransfer);
    assert_eq!(count_rows(&db, "transactions").await, rows);
    assert_eq!(engine.balance(ada.id).await.unwrap(), Money::new(10_000));
}

#[tokio::test]
async fn transfer_to_missing_recipient_is_rejected() {
    let (engine, db) = engine_with_db().await;
    let ada = funded_user(&engine, "ada", 10_000).await;
    let rows = count_rows(&db, "transactions").await;

    let err = engine
        .transfer(TransferCmd::new(ada.id, 999, Money::new(100)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::RecipientNotFound("user 999".to_string()));
    assert_eq!(count_rows(&db, "transactions").await, rows);
    assert_eq!(engine.balance(ada.id).await.unwrap(), Money::new(10_000));
}

#[tokio::test]
async fn insufficient_transfer_rolls_back_both_sides() {
    let (engine, db) = engine_with_db().await;
    // bola gets the lower id so the credit runs before the failing debit.
    let bola = funded_user(&engine, "bola", 0).await;
    let ada = funded_user(&engine, "ada", 1_000).await;
    let rows = count_rows(&db, "transactions").await;

    let err = engine
        .transfer(TransferCmd::new(ada.id, bola.id, Money::new(1_001)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(engine.balance(ada.id).await.unwrap(), Money::new(1_000));
    assert_eq!(engine.balance(bola.id).await.unwrap(), Money::ZERO);
    assert_eq!(count_rows(&db, "transactions").await, rows);
}

#[tokio::test]
async fn reference_collision_after_balance_update_rolls_back_everything() {
    let (engine, db) = engine_from(|builder| builder.references(Arc::new(FixedReferences))).await;
    let ada = funded_user(&engine, "ada", 10_000).await;
    let bola = funded_user(&engine, "bola", 0).await;

    engine
        .transfer(TransferCmd::new(ada.id, bola.id, Money::new(1_000)))
        .await
        .unwrap();
    let rows = count_rows(&db, "transactions").await;

    // Same references again: both balances move before the insert fails.
    let err = engine
        .transfer(TransferCmd::new(ada.id, bola.id, Money::new(1_000)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::DuplicateReference("TRO".to_string()));
    assert_eq!(engine.balance(ada.id).await.unwrap(), Money::new(9_000));
    assert_eq!(engine.balance(bola.id).await.unwrap(), Money::new(1_000));
    assert_eq!(count_rows(&db, "transactions").await, rows);
    assert_eq!(total_balance(&db).await, 10_000);
}

#[tokio::test]
async fn reference_collision_is_retried_with_a_fresh_reference() {
    let references = ScriptedReferences::new(["DEPAAAAAAAAAA"]);
    let (engine, _db) = engine_from({
        let references = Arc::clone(&references);
        move |builder| builder.references(references)
    })
    .await;
    let ada = engine.create_user("ada", "ada@example.com").await.unwrap();

    references.push("DEPAAAAAAAAAA");
    references.push("DEPBBBBBBBBBB");
    let change = engine
        .deposit(DepositCmd::new(ada.id, Money::new(100)))
        .await
        .unwrap();
    assert_eq!(change.transaction.reference, "DEPBBBBBBBBBB");
    assert_eq!(change.new_balance, Money::new(100));
}

#[tokio::test]
async fn retries_are_bounded_by_reference_attempts() {
    let references = ScriptedReferences::new(["DEPAAAAAAAAAA"]);
    let (engine, db) = engine_from({
        let references = Arc::clone(&references);
        move |builder| builder.references(references).reference_attempts(2)
    })
    .await;
    let ada = engine.create_user("ada", "ada@example.com").await.unwrap();
    engine
        .deposit(DepositCmd::new(ada.id, Money::new(100)))
        .await
        .unwrap();

    references.push("DEPAAAAAAAAAA");
    references.push("DEPAAAAAAAAAA");
    references.push("DEPCCCCCCCCCC");
    let err = engine
        .deposit(DepositCmd::new(ada.id, Money::new(100)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::DuplicateReference("DEP".to_string()));
    assert_eq!(engine.balance(ada.id).await.unwrap(), Money::new(100));
    assert_eq!(count_rows(&db, "transactions").await, 1);
}

#[tokio::test]
async fn transfer_notifies_both_parties() {
    let (engine, _db) = engine_with_db().await;
    let ada = funded_user(&engine, "ada", 10_000).await;
    let bola = funded_user(&engine, "bola", 0).await;

    engine
        .transfer(TransferCmd::new(ada.id, bola.id, Money::new(5_000)))
        .await
        .unwrap();

    let sent = engine
        .notifications(
            ada.id,
            NotificationFilter {
                kind: Some(notifier::TRANSFER_SENT.to_string()),
                is_read: None,
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(sent.total, 1);
    assert_eq!(sent.items[0].message, "You sent ₦50.00 to bola");

    let received = engine
        .notifications(bola.id, NotificationFilter::unread(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(received.total, 1);
    assert_eq!(received.items[0].kind, notifier::TRANSFER_RECEIVED);
    assert_eq!(received.items[0].message, "You received ₦50.00 from ada");
}

#[tokio::test]
async fn failing_notifier_does_not_affect_money() {
    let (engine, db) = engine_from(|builder| builder.notifier(Arc::new(BrokenNotifier))).await;
    let ada = funded_user(&engine, "ada", 10_000).await;
    let bola = funded_user(&engine, "bola", 0).await;

    engine
        .transfer(TransferCmd::new(ada.id, bola.id, Money::new(2_500)))
        .await
        .unwrap();

    assert_eq!(engine.balance(ada.id).await.unwrap(), Money::new(7_500));
    assert_eq!(engine.balance(bola.id).await.unwrap(), Money::new(2_500));
    assert_eq!(count_rows(&db, "notifications").await, 0);
}

#[tokio::test]
async fn notifications_use_the_configured_symbol() {
    let recorder = Arc::new(RecordingNotifier::default());
    let (engine, _db) = engine_from({
        let recorder = Arc::clone(&recorder);
        move |builder| builder.notifier(recorder).currency_symbol("$")
    })
    .await;
    let ada = funded_user(&engine, "ada", 1_234).await;

    let sent = recorder.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, ada.id);
    assert_eq!(sent[0].kind, notifier::DEPOSIT);
    assert_eq!(
        sent[0].message,
        "Your deposit of $12.34 was successful. New balance: $12.34"
    );
}
