//! Task verification and reward issuance, end to end against the in-memory
//! store.

use std::sync::Arc;

use stardrop_common::{
    Config, EngineError, MemoryStore, MockVerifier, NewTask, NewUser, NotifyEvent,
    RecordingNotifier, Store, TaskKind, TransactionKind, VerifierError,
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

fn new_user(telegram_id: i64, referrer_id: Option<i64>) -> NewUser {
    NewUser {
        telegram_id,
        username: Some(format!("user{}", telegram_id)),
        first_name: format!("User {}", telegram_id),
        last_name: None,
        avatar_url: None,
        referrer_id,
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

#[tokio::test]
async fn completing_a_channel_task_credits_balance_and_ledger() {
    let h = harness();
    let user = h.store.create_user(new_user(100, None)).await.unwrap();
    let task = h.store.create_task(channel_task(50, "news")).await.unwrap();
    h.verifier.set_member(100, "news", true);

    let reward = h.engine.verify_and_complete(user.id, task.id).await.unwrap();
    assert_eq!(reward, 50);

    let user = h.store.user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(user.balance, 50);

    // balance equals the sum of the ledger
    let txs = h.store.transactions_for_user(user.id, None).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].kind, TransactionKind::Task);
    assert_eq!(txs[0].amount, 50);
    assert_eq!(txs[0].task_id, Some(task.id));
}

#[tokio::test]
async fn second_submit_is_already_completed_and_credits_once() {
    let h = harness();
    let user = h.store.create_user(new_user(100, None)).await.unwrap();
    let task = h.store.create_task(channel_task(50, "news")).await.unwrap();
    h.verifier.set_member(100, "news", true);

    h.engine.verify_and_complete(user.id, task.id).await.unwrap();
    let err = h.engine.verify_and_complete(user.id, task.id).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCompleted));

    let user = h.store.user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(user.balance, 50);
}

#[tokio::test]
async fn concurrent_double_submit_credits_exactly_once() {
    let h = harness();
    let user = h.store.create_user(new_user(100, None)).await.unwrap();
    let task = h.store.create_task(channel_task(50, "news")).await.unwrap();
    h.verifier.set_member(100, "news", true);

    let (a, b) = tokio::join!(
        h.engine.verify_and_complete(user.id, task.id),
        h.engine.verify_and_complete(user.id, task.id),
    );
    let oks = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(oks, 1, "exactly one submit wins: {:?} / {:?}", a, b);
    for r in [a, b] {
        if let Err(e) = r {
            assert!(matches!(e, EngineError::AlreadyCompleted));
        }
    }

    let user = h.store.user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(user.balance, 50);
    let txs = h.store.transactions_for_user(user.id, None).await.unwrap();
    assert_eq!(txs.len(), 1);
}

#[tokio::test]
async fn non_member_fails_verification_without_credit() {
    let h = harness();
    let user = h.store.create_user(new_user(100, None)).await.unwrap();
    let task = h.store.create_task(channel_task(50, "news")).await.unwrap();

    let err = h.engine.verify_and_complete(user.id, task.id).await.unwrap_err();
    assert!(matches!(err, EngineError::VerificationFailed));

    let user = h.store.user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(user.balance, 0);
    assert!(!h.store.has_completion(user.id, task.id).await.unwrap());
}

#[tokio::test]
async fn verifier_outage_fails_closed() {
    let h = harness();
    let user = h.store.create_user(new_user(100, None)).await.unwrap();
    let task = h.store.create_task(channel_task(50, "news")).await.unwrap();
    h.verifier.set_member(100, "news", true);
    h.verifier.fail_next(VerifierError::Timeout);

    let err = h.engine.verify_and_complete(user.id, task.id).await.unwrap_err();
    assert!(matches!(err, EngineError::VerificationFailed));
}

#[tokio::test]
async fn inactive_and_missing_tasks_are_distinct_errors() {
    let h = harness();
    let user = h.store.create_user(new_user(100, None)).await.unwrap();
    let task = h.store.create_task(channel_task(50, "news")).await.unwrap();
    h.engine.close_task(task.id).await.unwrap();

    let err = h.engine.verify_and_complete(user.id, task.id).await.unwrap_err();
    assert!(matches!(err, EngineError::TaskInactive));

    let err = h.engine.verify_and_complete(user.id, 9999).await.unwrap_err();
    assert!(matches!(err, EngineError::TaskNotFound));
}

#[tokio::test]
async fn bot_task_requires_a_recorded_activation() {
    let h = harness();
    let user = h.store.create_user(new_user(100, None)).await.unwrap();
    let task = h
        .store
        .create_task(NewTask {
            kind: TaskKind::Bot,
            title: "Try the helper bot".into(),
            description: None,
            reward: 30,
            target: "HelperBot".into(),
            avatar_url: None,
        })
        .await
        .unwrap();

    let err = h.engine.verify_and_complete(user.id, task.id).await.unwrap_err();
    assert!(matches!(err, EngineError::VerificationFailed));

    h.engine.record_activation(user.id, task.id).await.unwrap();
    // recording twice is fine
    h.engine.record_activation(user.id, task.id).await.unwrap();

    let reward = h.engine.verify_and_complete(user.id, task.id).await.unwrap();
    assert_eq!(reward, 30);
}

#[tokio::test]
async fn referral_bonus_is_floored_percentage_of_reward() {
    let h = harness();
    let referrer = h.store.create_user(new_user(1, None)).await.unwrap();
    let referred = h
        .store
        .create_user(new_user(2, Some(referrer.id)))
        .await
        .unwrap();
    // 5% of 99 floors to 4
    let task = h.store.create_task(channel_task(99, "news")).await.unwrap();
    h.verifier.set_member(2, "news", true);

    h.engine.verify_and_complete(referred.id, task.id).await.unwrap();

    let referrer = h.store.user_by_id(referrer.id).await.unwrap().unwrap();
    assert_eq!(referrer.balance, 4);
    let txs = h
        .store
        .transactions_for_user(referrer.id, Some(TransactionKind::Referral))
        .await
        .unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].amount, 4);
    assert_eq!(txs[0].referral_id, Some(referred.id));

    let events = h.notifier.take();
    assert!(events
        .iter()
        .any(|e| matches!(e, NotifyEvent::ReferralBonus { earnings: 4, .. })));
}

#[tokio::test]
async fn zero_bonus_rewards_skip_referral_credit() {
    let h = harness();
    let referrer = h.store.create_user(new_user(1, None)).await.unwrap();
    let referred = h
        .store
        .create_user(new_user(2, Some(referrer.id)))
        .await
        .unwrap();
    // 5% of 10 floors to 0
    let task = h.store.create_task(channel_task(10, "news")).await.unwrap();
    h.verifier.set_member(2, "news", true);

    h.engine.verify_and_complete(referred.id, task.id).await.unwrap();

    let referrer = h.store.user_by_id(referrer.id).await.unwrap().unwrap();
    assert_eq!(referrer.balance, 0);
    let txs = h.store.transactions_for_user(referrer.id, None).await.unwrap();
    assert!(txs.is_empty());
}

#[tokio::test]
async fn notifier_failure_never_fails_the_completion() {
    let h = harness();
    let referrer = h.store.create_user(new_user(1, None)).await.unwrap();
    let referred = h
        .store
        .create_user(new_user(2, Some(referrer.id)))
        .await
        .unwrap();
    let task = h.store.create_task(channel_task(100, "news")).await.unwrap();
    h.verifier.set_member(2, "news", true);
    h.notifier.set_failing(true);

    let reward = h
        .engine
        .verify_and_complete(referred.id, task.id)
        .await
        .unwrap();
    assert_eq!(reward, 100);

    // the bonus itself still lands, only the notification is lost
    let referrer = h.store.user_by_id(referrer.id).await.unwrap().unwrap();
    assert_eq!(referrer.balance, 5);
}

#[tokio::test]
async fn task_list_carries_completion_flags() {
    let h = harness();
    let user = h.store.create_user(new_user(100, None)).await.unwrap();
    let done = h.store.create_task(channel_task(50, "news")).await.unwrap();
    let open = h.store.create_task(channel_task(20, "deals")).await.unwrap();
    let closed = h.store.create_task(channel_task(10, "old")).await.unwrap();
    h.engine.close_task(closed.id).await.unwrap();
    h.verifier.set_member(100, "news", true);
    h.engine.verify_and_complete(user.id, done.id).await.unwrap();

    let list = h.engine.tasks_for_user(user.id).await.unwrap();
    assert_eq!(list.len(), 2, "closed tasks are not listed");
    let by_id = |id: i64| list.iter().find(|t| t.task.id == id).unwrap();
    assert!(by_id(done.id).completed);
    assert!(!by_id(open.id).completed);
}
