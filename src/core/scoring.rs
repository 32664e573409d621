use std::collections::BTreeSet;

use crate::core::distance::distance_km;
use crate::models::{CompatibilityScore, LookingFor, Profile, ScoreBreakdown};

/// Upper bound of a compatibility score
pub const MAX_SCORE: u8 = 100;

const MAX_INTEREST_POINTS: f64 = 30.0;

/// Calculate the compatibility score (0-100) of `candidate` for `requester`
///
/// Scoring table:
/// distance   up to 25  (<=1km 25, <=5km 20, <=25km 15, <=50km 10, <=100km 5)
/// age        up to 20  (|diff| <=2 20, <=5 16, <=10 12, <=15 8, else 5)
/// interests  up to 30  (Jaccard similarity of interest sets, rounded)
/// intent     up to 15  (same lookingFor 15, same bucket 10)
/// gender     10 when both preferences line up, 5 otherwise
///
/// Pure and deterministic: the same two profiles always produce the same score.
pub fn calculate_compatibility(requester: &Profile, candidate: &Profile) -> CompatibilityScore {
    let distance = match (&requester.location, &candidate.location) {
        (Some(a), Some(b)) => Some(distance_km(a, b)),
        _ => None,
    };

    let (interest_points, shared_interests) =
        interest_score(&requester.interests, &candidate.interests);

    let breakdown = ScoreBreakdown {
        distance: distance.map_or(0, distance_points),
        age: age_points(requester.age, candidate.age),
        interests: interest_points,
        intent: intent_points(requester.looking_for, candidate.looking_for),
        gender_preference: gender_points(requester, candidate),
    };

    let total = breakdown.sum().min(MAX_SCORE as u32) as u8;

    CompatibilityScore {
        total,
        distance_km: distance,
        breakdown,
        shared_interests,
    }
}

/// Step function over the great-circle distance
#[inline]
pub fn distance_points(distance_km: f64) -> u8 {
    match distance_km {
        d if d <= 1.0 => 25,
        d if d <= 5.0 => 20,
        d if d <= 25.0 => 15,
        d if d <= 50.0 => 10,
        d if d <= 100.0 => 5,
        _ => 0,
    }
}

/// Step function over the absolute age difference
#[inline]
pub fn age_points(a: u8, b: u8) -> u8 {
    match a.abs_diff(b) {
        0..=2 => 20,
        3..=5 => 16,
        6..=10 => 12,
        11..=15 => 8,
        _ => 5,
    }
}

/// Jaccard similarity of the two interest sets scaled to 30 points
///
/// Returns the points and the shared interests in sorted order.
pub fn interest_score(a: &BTreeSet<String>, b: &BTreeSet<String>) -> (u8, Vec<String>) {
    if a.is_empty() || b.is_empty() {
        return (0, Vec::new());
    }

    let shared: Vec<String> = a.intersection(b).cloned().collect();
    let union = a.union(b).count();
    let jaccard = shared.len() as f64 / union as f64;

    ((jaccard * MAX_INTEREST_POINTS).round() as u8, shared)
}

#[inline]
pub fn intent_points(a: LookingFor, b: LookingFor) -> u8 {
    if a == b {
        15
    } else if a.is_long_term() == b.is_long_term() {
        10
    } else {
        0
    }
}

/// 10 when each side is interested in the other's gender, else 5
///
/// Never zero, so near-misses still rank.
#[inline]
pub fn gender_points(a: &Profile, b: &Profile) -> u8 {
    if a.interested_in.contains(&b.gender) && b.interested_in.contains(&a.gender) {
        10
    } else {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use chrono::Utc;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn create_test_profile(id: &str, age: u8, gender: &str, interested_in: &[&str]) -> Profile {
        Profile {
            user_id: id.to_string(),
            display_name: format!("User {}", id),
            age,
            gender: gender.to_string(),
            interested_in: set(interested_in),
            looking_for: LookingFor::Relationship,
            bio: None,
            interests: set(&["hiking", "jazz"]),
            photos: vec![],
            location: Some(GeoPoint::new(3.3792, 6.5244)),
            is_searchable: true,
            is_active: true,
            blocked_users: BTreeSet::new(),
            total_matches: 0,
            total_swipes: 0,
            verification_score: 0,
            boost_expires_at: None,
            push_token: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_distance_points_steps() {
        assert_eq!(distance_points(0.0), 25);
        assert_eq!(distance_points(1.0), 25);
        assert_eq!(distance_points(1.01), 20);
        assert_eq!(distance_points(25.0), 15);
        assert_eq!(distance_points(50.0), 10);
        assert_eq!(distance_points(100.0), 5);
        assert_eq!(distance_points(100.5), 0);
    }

    #[test]
    fn test_age_points_steps() {
        assert_eq!(age_points(25, 27), 20);
        assert_eq!(age_points(27, 25), 20);
        assert_eq!(age_points(20, 25), 16);
        assert_eq!(age_points(20, 30), 12);
        assert_eq!(age_points(20, 35), 8);
        assert_eq!(age_points(20, 60), 5);
    }

    #[test]
    fn test_interest_jaccard() {
        let (points, shared) = interest_score(&set(&["hiking", "jazz"]), &set(&["hiking", "chess"]));
        // 1 shared out of 3 distinct -> 10 points
        assert_eq!(points, 10);
        assert_eq!(shared, vec!["hiking"]);

        let (points, _) = interest_score(&set(&["hiking"]), &set(&["hiking"]));
        assert_eq!(points, 30);

        let (points, shared) = interest_score(&BTreeSet::new(), &set(&["hiking"]));
        assert_eq!(points, 0);
        assert!(shared.is_empty());
    }

    #[test]
    fn test_intent_points() {
        assert_eq!(intent_points(LookingFor::Casual, LookingFor::Casual), 15);
        assert_eq!(intent_points(LookingFor::Relationship, LookingFor::Marriage), 10);
        assert_eq!(intent_points(LookingFor::Casual, LookingFor::Friendship), 10);
        assert_eq!(intent_points(LookingFor::Casual, LookingFor::Marriage), 0);
    }

    #[test]
    fn test_gender_points_never_zero() {
        let a = create_test_profile("a", 25, "male", &["female"]);
        let b = create_test_profile("b", 27, "female", &["male"]);
        let c = create_test_profile("c", 27, "female", &["female"]);

        assert_eq!(gender_points(&a, &b), 10);
        assert_eq!(gender_points(&a, &c), 5);
    }

    #[test]
    fn test_perfect_match_scores_100() {
        let a = create_test_profile("a", 25, "male", &["female"]);
        let b = create_test_profile("b", 26, "female", &["male"]);

        let score = calculate_compatibility(&a, &b);
        assert_eq!(score.total, 100);
        assert_eq!(score.distance_km, Some(0.0));
    }

    #[test]
    fn test_missing_location_scores_no_distance_points() {
        let a = create_test_profile("a", 25, "male", &["female"]);
        let mut b = create_test_profile("b", 26, "female", &["male"]);
        b.location = None;

        let score = calculate_compatibility(&a, &b);
        assert_eq!(score.distance_km, None);
        assert_eq!(score.breakdown.distance, 0);
        assert_eq!(score.total, 75);
    }
}
