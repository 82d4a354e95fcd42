use chrono::{Duration, Utc};
use engine::{
    DepositCmd, EngineError, Money, NotificationFilter, PageRequest, TransactionFilter,
    TransactionKind, TransactionStatus, TransferCmd, WithdrawCmd,
};

mod common;

use common::{engine_with_db, funded_user};

#[tokio::test]
async fn history_is_newest_first_and_repeatable() {
    let (engine, _db) = engine_with_db().await;
    let ada = funded_user(&engine, "ada", 0).await;
    for cents in [100, 200, 300] {
        engine
            .deposit(DepositCmd::new(ada.id, Money::new(cents)))
            .await
            .unwrap();
    }
    engine
        .withdraw(WithdrawCmd::new(ada.id, Money::new(50)))
        .await
        .unwrap();

    let first = engine
        .transaction_history(ada.id, TransactionFilter::default(), PageRequest::default())
        .await
        .unwrap();
    let second = engine
        .transaction_history(ada.id, TransactionFilter::default(), PageRequest::default())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.total, 4);
    assert_eq!(first.items[0].kind, TransactionKind::Withdrawal);
    let amounts: Vec<i64> = first.items.iter().map(|t| t.amount.cents()).collect();
    assert_eq!(amounts, vec![50, 300, 200, 100]);
}

#[tokio::test]
async fn history_filters_by_kind_status_and_range() {
    let (engine, _db) = engine_with_db().await;
    let ada = funded_user(&engine, "ada", 10_000).await;
    let bola = funded_user(&engine, "bola", 0).await;
    engine
        .transfer(TransferCmd::new(ada.id, bola.id, Money::new(1_000)))
        .await
        .unwrap();

    let deposits = engine
        .transaction_history(
            ada.id,
            TransactionFilter::default().kind(TransactionKind::Deposit),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(deposits.total, 1);

    let completed = engine
        .transaction_history(
            ada.id,
            TransactionFilter::default().status(TransactionStatus::Completed),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(completed.total, 2);

    let pending = engine
        .transaction_history(
            ada.id,
            TransactionFilter::default().status(TransactionStatus::Pending),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(pending.total, 0);

    let now = Utc::now();
    let in_range = engine
        .transaction_history(
            ada.id,
            TransactionFilter::default()
                .between(Some(now - Duration::hours(1)), Some(now + Duration::hours(1))),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(in_range.total, 2);

    let future = engine
        .transaction_history(
            ada.id,
            TransactionFilter::default().between(Some(now + Duration::hours(1)), None),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(future.total, 0);
    assert_eq!(future.last_page, 1);

    let reversed = engine
        .transaction_history(
            ada.id,
            TransactionFilter::default().between(Some(now), Some(now - Duration::hours(1))),
            PageRequest::default(),
        )
        .await;
    assert!(matches!(reversed, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn history_paginates() {
    let (engine, _db) = engine_with_db().await;
    let ada = funded_user(&engine, "ada", 0).await;
    for _ in 0..5 {
        engine
            .deposit(DepositCmd::new(ada.id, Money::new(100)))
            .await
            .unwrap();
    }

    let page_one = engine
        .transaction_history(ada.id, TransactionFilter::default(), PageRequest::new(1, 2))
        .await
        .unwrap();
    let page_three = engine
        .transaction_history(ada.id, TransactionFilter::default(), PageRequest::new(3, 2))
        .await
        .unwrap();

    assert_eq!(page_one.items.len(), 2);
    assert_eq!(page_one.total, 5);
    assert_eq!(page_one.last_page, 3);
    assert_eq!(page_three.items.len(), 1);
    assert!(page_one.items[0].id > page_three.items[0].id);

    let invalid = engine
        .transaction_history(ada.id, TransactionFilter::default(), PageRequest::new(0, 2))
        .await;
    assert!(matches!(invalid, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn history_only_shows_own_transactions() {
    let (engine, _db) = engine_with_db().await;
    let ada = funded_user(&engine, "ada", 1_000).await;
    let bola = funded_user(&engine, "bola", 0).await;

    let bola_history = engine
        .transaction_history(bola.id, TransactionFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(bola_history.total, 0);

    let ada_history = engine
        .transaction_history(ada.id, TransactionFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ada_history.total, 1);
    assert!(ada_history.items.iter().all(|t| t.user_id == ada.id));
}

#[tokio::test]
async fn notifications_can_be_marked_read() {
    let (engine, _db) = engine_with_db().await;
    let ada = funded_user(&engine, "ada", 1_000).await;
    let bola = funded_user(&engine, "bola", 0).await;
    engine
        .withdraw(WithdrawCmd::new(ada.id, Money::new(100)))
        .await
        .unwrap();

    let unread = engine
        .notifications(ada.id, NotificationFilter::unread(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(unread.total, 2);
    let newest = &unread.items[0];
    assert_eq!(newest.title, "Withdrawal Processed");

    let err = engine
        .mark_notification_read(bola.id, newest.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));

    let read = engine
        .mark_notification_read(ada.id, newest.id)
        .await
        .unwrap();
    assert!(read.is_read);

    assert_eq!(engine.mark_all_notifications_read(ada.id).await.unwrap(), 1);
    assert_eq!(engine.mark_all_notifications_read(ada.id).await.unwrap(), 0);

    let still_unread = engine
        .notifications(ada.id, NotificationFilter::unread(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(still_unread.total, 0);
}
