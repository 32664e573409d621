// Unit tests for the scoring and ranking primitives

mod common;

use chrono::{Duration, Utc};

use common::{create_profile, north_of, LAGOS};
use swipe_engine::core::{
    calculate_bounding_box, calculate_compatibility, haversine_distance, is_within_bounding_box,
    paginate, rank_candidates, MAX_SCORE,
};
use swipe_engine::models::{DiscoveryFilters, LookingFor};

fn filters(max_distance_km: f64, page: u32, limit: u32) -> DiscoveryFilters {
    DiscoveryFilters {
        age_min: 18,
        age_max: 99,
        max_distance_km,
        page,
        limit,
        location: None,
    }
}

#[test]
fn test_haversine_distance_zero() {
    let (lat, lon) = LAGOS;
    assert!(haversine_distance(lat, lon, lat, lon) < 1e-9);
}

#[test]
fn test_haversine_distance_lagos_to_abuja() {
    // Roughly 525 km as the crow flies
    let distance = haversine_distance(6.5244, 3.3792, 9.0765, 7.3986);
    assert!((distance - 525.0).abs() < 15.0, "got {}", distance);
}

#[test]
fn test_bounding_box_contains_radius() {
    let (lat, lon) = LAGOS;
    let bbox = calculate_bounding_box(lat, lon, 10.0);

    let (n_lat, n_lon) = north_of(lat, lon, 9.9);
    assert!(is_within_bounding_box(n_lat, n_lon, &bbox));
    assert!(!is_within_bounding_box(lat + 1.0, lon, &bbox));
}

#[test]
fn test_bounding_box_near_pole_is_full_width() {
    let bbox = calculate_bounding_box(89.95, 10.0, 20.0);

    assert_eq!(bbox.max_lat, 90.0);
    assert_eq!(bbox.min_lon, -180.0);
    assert_eq!(bbox.max_lon, 180.0);
}

#[test]
fn test_score_stays_in_range() {
    let (lat, lon) = LAGOS;
    let intents = [
        LookingFor::Relationship,
        LookingFor::Casual,
        LookingFor::Friendship,
        LookingFor::Marriage,
    ];
    let hobbies = ["hiking", "jazz", "chess", "football"];

    for age in [18u8, 22, 30, 45, 70] {
        for km in [0.0, 0.5, 4.0, 30.0, 80.0, 400.0] {
            for (i, intent) in intents.iter().enumerate() {
                let mut a = create_profile("a", 25, "female", "male", lat, lon);
                let (b_lat, b_lon) = north_of(lat, lon, km);
                let mut b = create_profile("b", age, "male", "female", b_lat, b_lon);
                b.looking_for = *intent;
                a.interests.extend(hobbies.iter().take(i + 1).map(|h| h.to_string()));
                b.interests.extend(hobbies.iter().skip(i).map(|h| h.to_string()));

                let score = calculate_compatibility(&a, &b);
                assert!(score.total <= MAX_SCORE);
                assert_eq!(score.total as u32, score.breakdown.sum().min(100));
            }
        }
    }
}

#[test]
fn test_score_is_symmetric() {
    let (lat, lon) = LAGOS;
    let mut a = create_profile("a", 24, "female", "male", lat, lon);
    a.interests.extend(["hiking".to_string(), "jazz".to_string()]);
    let (b_lat, b_lon) = north_of(lat, lon, 3.0);
    let mut b = create_profile("b", 31, "male", "male", b_lat, b_lon);
    b.interests.insert("jazz".to_string());
    b.looking_for = LookingFor::Casual;

    let ab = calculate_compatibility(&a, &b);
    let ba = calculate_compatibility(&b, &a);

    assert_eq!(ab.total, ba.total);
    assert_eq!(ab.shared_interests, vec!["jazz".to_string()]);
}

#[test]
fn test_perfect_pair_scores_max() {
    let (lat, lon) = LAGOS;
    let mut a = create_profile("a", 25, "female", "male", lat, lon);
    let mut b = create_profile("b", 26, "male", "female", lat, lon);
    a.interests.insert("hiking".to_string());
    b.interests.insert("hiking".to_string());

    assert_eq!(calculate_compatibility(&a, &b).total, MAX_SCORE);
}

#[test]
fn test_rank_puts_boosted_first_then_score() {
    let (lat, lon) = LAGOS;
    let now = Utc::now();
    let requester = create_profile("me", 25, "female", "male", lat, lon);

    let near = create_profile("near", 25, "male", "female", lat, lon);
    let (f_lat, f_lon) = north_of(lat, lon, 40.0);
    let mut boosted = create_profile("boosted", 40, "male", "female", f_lat, f_lon);
    boosted.boost_expires_at = Some(now + Duration::minutes(30));
    let mut expired = create_profile("expired", 25, "male", "female", lat, lon);
    expired.boost_expires_at = Some(now - Duration::minutes(1));
    let (o_lat, o_lon) = north_of(lat, lon, 60.0);
    let outside = create_profile("outside", 25, "male", "female", o_lat, o_lon);

    let ranked = rank_candidates(
        &requester,
        vec![outside, expired, near, boosted],
        &filters(50.0, 1, 10),
        now,
    );
    let ids: Vec<&str> = ranked.iter().map(|c| c.profile.user_id.as_str()).collect();

    // Equal scores fall back to user id
    assert_eq!(ids, vec!["boosted", "expired", "near"]);
    assert!(ranked[0].is_boosted);
    assert!(!ranked[1].is_boosted);
}

#[test]
fn test_paginate_reports_has_more() {
    let (lat, lon) = LAGOS;
    let requester = create_profile("me", 25, "female", "male", lat, lon);
    let candidates = (0..5)
        .map(|i| create_profile(&format!("c{}", i), 25, "male", "female", lat, lon))
        .collect();

    let ranked = rank_candidates(&requester, candidates, &filters(10.0, 1, 2), Utc::now());
    let first = paginate(ranked.clone(), &filters(10.0, 1, 2));
    assert_eq!(first.profiles.len(), 2);
    assert_eq!(first.total, 5);
    assert!(first.stats.has_more);

    let last = paginate(ranked.clone(), &filters(10.0, 3, 2));
    assert_eq!(last.profiles.len(), 1);
    assert!(!last.stats.has_more);

    let past_end = paginate(ranked, &filters(10.0, 9, 2));
    assert!(past_end.profiles.is_empty());
    assert_eq!(past_end.total, 5);
}
