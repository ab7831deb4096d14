//! The withdrawal lifecycle: eligibility, claw-back, adjudication.

use std::sync::Arc;

use stardrop_common::{
    Config, EngineError, MemoryStore, MockVerifier, NewTask, NewUser, NotifyEvent,
    RecordingNotifier, Store, TaskKind, VerifierError, WithdrawalStatus,
};
use stardrop_engine::Engine;

struct Harness {
    engine: Engine,
    store: Arc<MemoryStore>,
    verifier: Arc<MockVerifier>,
    notifier: Arc<RecordingNotifier>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let verifier = Arc::new(MockVerifier::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Engine::new(
        Arc::clone(&store) as Arc<dyn Store>,
        verifier.clone(),
        notifier.clone(),
        &Config::default(),
    );
    Harness {
        engine,
        store,
        verifier,
        notifier,
    }
}

fn new_user(telegram_id: i64, username: Option<&str>) -> NewUser {
    NewUser {
        telegram_id,
        username: username.map(str::to_string),
        first_name: format!("User {}", telegram_id),
        last_name: None,
        avatar_url: None,
        referrer_id: None,
    }
}

fn channel_task(reward: i64, target: &str) -> NewTask {
    NewTask {
        kind: TaskKind::Channel,
        title: format!("Join @{}", target),
        description: None,
        reward,
        target: target.to_string(),
        avatar_url: None,
    }
}

/// A user with the given completed channel tasks, fully credited and still
/// subscribed to each.
async fn funded_user(h: &Harness, telegram_id: i64, rewards: &[(i64, &str)]) -> i64 {
    let user = h
        .store
        .create_user(new_user(telegram_id, Some("payee")))
        .await
        .unwrap();
    for (reward, target) in rewards {
        let task = h.store.create_task(channel_task(*reward, target)).await.unwrap();
        h.verifier.set_member(telegram_id, target, true);
        h.engine.verify_and_complete(user.id, task.id).await.unwrap();
    }
    user.id
}

#[tokio::test]
async fn below_minimum_is_rejected_at_the_boundary() {
    let h = harness();
    let user_id = funded_user(&h, 100, &[(200, "news")]).await;

    let err = h.engine.request_withdrawal(user_id, 99).await.unwrap_err();
    match err {
        EngineError::Validation(msg) => {
            assert_eq!(msg, "Minimum withdrawal amount is 100 stars")
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    // exactly the minimum is allowed
    h.engine.request_withdrawal(user_id, 100).await.unwrap();
}

#[tokio::test]
async fn insufficient_balance_is_rejected() {
    let h = harness();
    let user_id = funded_user(&h, 100, &[(120, "news")]).await;

    let err = h.engine.request_withdrawal(user_id, 150).await.unwrap_err();
    match err {
        EngineError::Validation(msg) => assert_eq!(msg, "Insufficient balance"),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_username_is_rejected() {
    let h = harness();
    let user = h.store.create_user(new_user(100, None)).await.unwrap();
    let task = h.store.create_task(channel_task(200, "news")).await.unwrap();
    h.verifier.set_member(100, "news", true);
    h.engine.verify_and_complete(user.id, task.id).await.unwrap();

    let err = h.engine.request_withdrawal(user.id, 100).await.unwrap_err();
    match err {
        EngineError::Validation(msg) => {
            assert!(msg.starts_with("Telegram username is required"), "{}", msg)
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn happy_path_creates_pending_row_without_debit() {
    let h = harness();
    let user_id = funded_user(&h, 100, &[(200, "news")]).await;
    h.notifier.take();

    let w = h.engine.request_withdrawal(user_id, 150).await.unwrap();
    assert_eq!(w.status, WithdrawalStatus::Pending);
    assert_eq!(w.amount, 150);
    assert!(w.processed_at.is_none());

    // no stars move until approval
    let user = h.store.user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, 200);

    let events = h.notifier.take();
    assert!(events.iter().any(|e| matches!(
        e,
        NotifyEvent::WithdrawalRequested { amount: 150, .. }
    )));
}

#[tokio::test]
async fn lapsed_subscription_is_clawed_back_and_request_rejected() {
    let h = harness();
    // task A (50) will lapse, task B (30) stays subscribed
    let user_id = funded_user(&h, 100, &[(50, "alpha"), (30, "beta")]).await;
    h.verifier.set_member(100, "alpha", false);

    let err = h.engine.request_withdrawal(user_id, 100).await.unwrap_err();
    match err {
        EngineError::SubscriptionsLapsed { lapsed, clawed_back } => {
            assert_eq!(lapsed, 1);
            assert_eq!(clawed_back, 50);
        }
        other => panic!("expected lapsed error, got {:?}", other),
    }

    let user = h.store.user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, 30);

    // the lapsed completion is gone, the other remains
    let completed = h.store.completed_task_ids(user_id).await.unwrap();
    assert_eq!(completed.len(), 1);

    // no withdrawal row was created
    assert!(h.store.withdrawals_for_user(user_id).await.unwrap().is_empty());

    // ledger stays consistent: 50 + 30 - 50 = 30
    let sum: i64 = h
        .store
        .transactions_for_user(user_id, None)
        .await
        .unwrap()
        .iter()
        .map(|tx| tx.amount)
        .sum();
    assert_eq!(sum, 30);
}

#[tokio::test]
async fn claw_back_is_clamped_when_balance_was_already_spent() {
    let h = harness();
    let user_id = funded_user(&h, 100, &[(150, "alpha"), (100, "beta")]).await;

    // spend part of the balance through an approved withdrawal
    let w = h.engine.request_withdrawal(user_id, 120).await.unwrap();
    h.engine.approve_withdrawal(w.id).await.unwrap();
    let user = h.store.user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, 130);

    // alpha (150) lapses; only 130 remain recoverable
    h.verifier.set_member(100, "alpha", false);
    let err = h.engine.request_withdrawal(user_id, 100).await.unwrap_err();
    match err {
        EngineError::SubscriptionsLapsed { clawed_back, .. } => assert_eq!(clawed_back, 130),
        other => panic!("expected lapsed error, got {:?}", other),
    }
    let user = h.store.user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, 0);
}

#[tokio::test]
async fn verifier_outage_during_reverification_counts_as_lapsed() {
    let h = harness();
    let user_id = funded_user(&h, 100, &[(200, "news")]).await;
    h.verifier.fail_next(VerifierError::Unavailable("bot backend down".into()));

    let err = h.engine.request_withdrawal(user_id, 100).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::SubscriptionsLapsed { lapsed: 1, clawed_back: 200 }
    ));
}

#[tokio::test]
async fn approve_debits_once_and_stamps_processed_at() {
    let h = harness();
    let user_id = funded_user(&h, 100, &[(200, "news")]).await;
    let w = h.engine.request_withdrawal(user_id, 150).await.unwrap();
    h.notifier.take();

    let approved = h.engine.approve_withdrawal(w.id).await.unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert!(approved.processed_at.is_some());

    let user = h.store.user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, 50);

    let events = h.notifier.take();
    assert!(events.iter().any(|e| matches!(
        e,
        NotifyEvent::WithdrawalApproved { amount: 150, .. }
    )));

    // second approval loses the compare-and-set and changes nothing
    let err = h.engine.approve_withdrawal(w.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotPending));
    let user = h.store.user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, 50);
}

#[tokio::test]
async fn reject_requires_reason_and_moves_no_stars() {
    let h = harness();
    let user_id = funded_user(&h, 100, &[(200, "news")]).await;
    let w = h.engine.request_withdrawal(user_id, 150).await.unwrap();
    h.notifier.take();

    let err = h.engine.reject_withdrawal(w.id, "  ").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let rejected = h
        .engine
        .reject_withdrawal(w.id, "suspicious activity")
        .await
        .unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("suspicious activity"));
    assert!(rejected.processed_at.is_some());

    let user = h.store.user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, 200);

    let events = h.notifier.take();
    assert!(events.iter().any(|e| matches!(
        e,
        NotifyEvent::WithdrawalRejected { amount: 150, .. }
    )));

    // terminal states never reopen
    let err = h.engine.approve_withdrawal(w.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotPending));
}

#[tokio::test]
async fn adjudicating_unknown_withdrawal_is_not_found() {
    let h = harness();
    let err = h.engine.approve_withdrawal(424242).await.unwrap_err();
    assert!(matches!(err, EngineError::WithdrawalNotFound));
}
