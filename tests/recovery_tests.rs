// Match creation against a store that drops or rejects match writes

mod common;

use common::{flaky_engine, seed_pair};
use swipe_engine::error::EngineError;
use swipe_engine::models::{SwipeAction, UserPair};
use swipe_engine::services::Store;

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let engine = flaky_engine(3);
    let (a, b) = seed_pair(&engine).await;
    engine.store.fail_create_match(2);

    let (created, is_new) = engine.matches.create_match(&a.user_id, &b.user_id).await.unwrap();

    assert!(is_new);
    assert!(created.is_active);
    assert_eq!(engine.store.create_match_calls(), 3);
    let pair = UserPair::new(&a.user_id, &b.user_id);
    assert_eq!(engine.store.inner.matches_for_pair(&pair).await.len(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_are_a_dependency_failure() {
    let engine = flaky_engine(3);
    let (a, b) = seed_pair(&engine).await;
    engine.store.fail_create_match(10);

    let err = engine
        .matches
        .create_match(&a.user_id, &b.user_id)
        .await
        .unwrap_err();

    match &err {
        EngineError::DependencyFailure(message) => assert!(message.contains("after 3 attempts"), "{}", message),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_retryable());
    assert_eq!(engine.store.create_match_calls(), 3);
    let pair = UserPair::new(&a.user_id, &b.user_id);
    assert!(engine.store.inner.matches_for_pair(&pair).await.is_empty());
}

#[tokio::test]
async fn test_conflict_with_vanished_winner_tries_again() {
    let engine = flaky_engine(3);
    let (a, b) = seed_pair(&engine).await;
    engine.store.conflict_create_match(1);

    let (created, is_new) = engine.matches.create_match(&a.user_id, &b.user_id).await.unwrap();

    assert!(is_new);
    assert!(created.is_active);
    assert_eq!(engine.store.create_match_calls(), 2);
}

#[tokio::test]
async fn test_repeated_conflicts_with_vanished_winner_give_up() {
    let engine = flaky_engine(2);
    let (a, b) = seed_pair(&engine).await;
    engine.store.conflict_create_match(2);

    let err = engine
        .matches
        .create_match(&a.user_id, &b.user_id)
        .await
        .unwrap_err();

    match err {
        EngineError::DependencyFailure(message) => assert!(message.contains("active match exists"), "{}", message),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(engine.store.create_match_calls(), 2);
}

#[tokio::test]
async fn test_failed_match_completes_when_like_is_repeated() {
    let engine = flaky_engine(2);
    let (a, b) = seed_pair(&engine).await;
    let pair = UserPair::new(&a.user_id, &b.user_id);

    engine
        .ledger
        .record_swipe(&a.user_id, &b.user_id, SwipeAction::Like)
        .await
        .unwrap();

    engine.store.fail_create_match(2);
    let failed = engine
        .ledger
        .record_swipe(&b.user_id, &a.user_id, SwipeAction::Like)
        .await;
    assert!(matches!(failed, Err(EngineError::DependencyFailure(_))));

    // Both likes are stored, the match is not
    let pending = engine.store.find_swipe(&b.user_id, &a.user_id).await.unwrap().unwrap();
    assert!(!pending.is_match);
    assert!(engine.store.inner.matches_for_pair(&pair).await.is_empty());

    let retried = engine
        .ledger
        .record_swipe(&b.user_id, &a.user_id, SwipeAction::Like)
        .await
        .unwrap();
    assert!(retried.is_match);
    assert!(retried.is_new_match);
    assert!(retried.swipe.is_match);
    assert_eq!(retried.swipe.id, pending.id);

    // The other side repeating its like attaches to the same match
    let repeated = engine
        .ledger
        .record_swipe(&a.user_id, &b.user_id, SwipeAction::Like)
        .await
        .unwrap();
    assert!(repeated.is_match);
    assert!(!repeated.is_new_match);
    assert_eq!(
        repeated.matched.map(|m| m.id),
        retried.matched.as_ref().map(|m| m.id)
    );

    let matches = engine.store.inner.matches_for_pair(&pair).await;
    assert_eq!(matches.len(), 1);
    for user_id in [&a.user_id, &b.user_id] {
        let profile = engine.store.get_profile(user_id).await.unwrap().unwrap();
        assert_eq!(profile.total_matches, 1);
    }
}

#[tokio::test]
async fn test_failed_match_completes_from_either_side() {
    let engine = flaky_engine(1);
    let (a, b) = seed_pair(&engine).await;

    engine
        .ledger
        .record_swipe(&a.user_id, &b.user_id, SwipeAction::Like)
        .await
        .unwrap();
    engine.store.fail_create_match(1);
    assert!(engine
        .ledger
        .record_swipe(&b.user_id, &a.user_id, SwipeAction::Superlike)
        .await
        .is_err());

    let outcome = engine
        .ledger
        .record_swipe(&a.user_id, &b.user_id, SwipeAction::Superlike)
        .await
        .unwrap();

    assert!(outcome.is_match);
    assert!(outcome.is_new_match);
    let reverse = engine.store.find_swipe(&b.user_id, &a.user_id).await.unwrap().unwrap();
    assert!(reverse.is_match);
    assert_eq!(engine.notifier.wait_for(2).await.len(), 2);
}
