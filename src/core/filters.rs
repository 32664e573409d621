use crate::models::{DiscoveryFilters, Profile};

/// Check if a candidate may be shown to the requester at all
///
/// Applied to every profile the store returns, so the discovery result does
/// not depend on how strict the store query was.
#[inline]
pub fn is_eligible_candidate(
    requester: &Profile,
    candidate: &Profile,
    filters: &DiscoveryFilters,
) -> bool {
    if candidate.user_id == requester.user_id {
        return false;
    }

    // Hidden or deactivated accounts never surface
    if !candidate.is_searchable || !candidate.is_active {
        return false;
    }

    if candidate.location.is_none() {
        return false;
    }

    if !requester.interested_in.contains(&candidate.gender) {
        return false;
    }

    if candidate.age < filters.age_min || candidate.age > filters.age_max {
        return false;
    }

    // Blocks apply in both directions
    if requester.has_blocked(&candidate.user_id) || candidate.has_blocked(&requester.user_id) {
        return false;
    }

    true
}

/// Inclusive radius check
#[inline]
pub fn is_within_radius(distance_km: f64, max_distance_km: f64) -> bool {
    distance_km <= max_distance_km
}

/// Whether `actor` may interact with `target`: the target must be active and
/// neither side may have blocked the other
#[inline]
pub fn can_interact(actor: &Profile, target: &Profile) -> bool {
    target.is_active && !actor.has_blocked(&target.user_id) && !target.has_blocked(&actor.user_id)
}
