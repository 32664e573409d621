// Races between two users liking each other at the same moment

mod common;

use common::{engine, seed_pair};
use swipe_engine::models::{SwipeAction, UserPair};
use swipe_engine::services::Store;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutual_likes_create_exactly_one_match() {
    for round in 0..50 {
        let engine = engine();
        let (a, b) = seed_pair(&engine).await;

        let left = engine.ledger.clone();
        let right = engine.ledger.clone();
        let (a_id, b_id) = (a.user_id.clone(), b.user_id.clone());

        let first = tokio::spawn(async move {
            left.record_swipe(&a_id, &b_id, SwipeAction::Like).await
        });
        let (a_id, b_id) = (a.user_id.clone(), b.user_id.clone());
        let second = tokio::spawn(async move {
            right.record_swipe(&b_id, &a_id, SwipeAction::Like).await
        });

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        let pair = UserPair::new(&a.user_id, &b.user_id);
        let matches = engine.store.matches_for_pair(&pair).await;
        assert_eq!(matches.len(), 1, "round {}: expected one match", round);
        assert_eq!(
            engine.store.conversations_for_pair(&pair).await.len(),
            1,
            "round {}: expected one conversation",
            round
        );

        // Exactly one caller created it; any caller that saw the match got the same one
        assert_eq!(
            [first.is_new_match, second.is_new_match].iter().filter(|n| **n).count(),
            1,
            "round {}",
            round
        );
        for outcome in [&first, &second] {
            if let Some(m) = &outcome.matched {
                assert_eq!(m.id, matches[0].id);
                assert!(outcome.swipe.is_match);
            }
        }

        for (from, to) in [(&a.user_id, &b.user_id), (&b.user_id, &a.user_id)] {
            let swipe = engine.store.find_swipe(from, to).await.unwrap().unwrap();
            assert!(swipe.is_match, "round {}: {} -> {} not flagged", round, from, to);
        }
        for user_id in [&a.user_id, &b.user_id] {
            let profile = engine.store.get_profile(user_id).await.unwrap().unwrap();
            assert_eq!(profile.total_matches, 1, "round {}", round);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_match_attaches_losers() {
    let engine = engine();
    let (a, b) = seed_pair(&engine).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let matches = engine.matches.clone();
        let (x, y) = if i % 2 == 0 {
            (a.user_id.clone(), b.user_id.clone())
        } else {
            (b.user_id.clone(), a.user_id.clone())
        };
        handles.push(tokio::spawn(async move { matches.create_match(&x, &y).await }));
    }

    let mut created = 0;
    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        let (m, is_new) = handle.await.unwrap().unwrap();
        ids.insert(m.id);
        if is_new {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(ids.len(), 1);
    assert_eq!(
        engine
            .store
            .matches_for_pair(&UserPair::new(&a.user_id, &b.user_id))
            .await
            .len(),
        1
    );
}
