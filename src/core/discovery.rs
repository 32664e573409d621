use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::DiscoverySettings;
use crate::core::{
    filters::{is_eligible_candidate, is_within_radius},
    scoring::calculate_compatibility,
};
use crate::error::EngineError;
use crate::models::{
    CandidateQuery, DiscoverQuery, DiscoveryFilters, DiscoveryPage, DiscoveryStats, GeoPoint,
    Profile, ScoredCandidate,
};
use crate::services::Store;

/// Discovery ranker - retrieves, filters, scores and paginates candidates
///
/// # Pipeline Stages
/// 1. Radius query against the profile store
/// 2. Eligibility filtering (gender, age, visibility, blocks)
/// 3. Exact distance check and compatibility scoring
/// 4. Ranking (boost, score, user id) and pagination
pub struct DiscoveryRanker<S> {
    store: Arc<S>,
    settings: DiscoverySettings,
}

impl<S> Clone for DiscoveryRanker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
        }
    }
}

impl<S: Store> DiscoveryRanker<S> {
    pub fn new(store: Arc<S>, settings: DiscoverySettings) -> Self {
        Self { store, settings }
    }

    /// Apply defaults and limits to raw query parameters
    pub fn resolve_filters(&self, query: &DiscoverQuery) -> Result<DiscoveryFilters, EngineError> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(EngineError::InvalidAction("page must be at least 1".into()));
        }

        let limit = query.limit.unwrap_or(self.settings.default_limit);
        if limit == 0 {
            return Err(EngineError::InvalidAction("limit must be at least 1".into()));
        }
        let limit = limit.min(self.settings.max_limit);

        let age_min = query.age_min.unwrap_or(self.settings.default_age_min);
        let age_max = query.age_max.unwrap_or(self.settings.default_age_max);
        if age_min > age_max {
            return Err(EngineError::InvalidAction(format!(
                "ageMin {} is greater than ageMax {}",
                age_min, age_max
            )));
        }

        let max_distance_km = query.max_distance.unwrap_or(self.settings.default_max_distance_km);
        if !max_distance_km.is_finite() || max_distance_km <= 0.0 {
            return Err(EngineError::InvalidAction("maxDistance must be a positive number".into()));
        }

        let location = match (query.latitude, query.longitude) {
            (Some(latitude), Some(longitude)) => Some(validate_point(latitude, longitude)?),
            (None, None) => None,
            _ => {
                return Err(EngineError::InvalidAction(
                    "latitude and longitude must be supplied together".into(),
                ))
            }
        };

        Ok(DiscoveryFilters {
            age_min,
            age_max,
            max_distance_km,
            page,
            limit,
            location,
        })
    }

    /// Return a ranked page of candidates, bounded by the configured deadline
    pub async fn discover(
        &self,
        requester_id: &str,
        filters: DiscoveryFilters,
    ) -> Result<DiscoveryPage, EngineError> {
        self.discover_with_deadline(requester_id, filters, self.settings.timeout())
            .await
    }

    /// Return a ranked page of candidates, failing with `Timeout` after `deadline`
    pub async fn discover_with_deadline(
        &self,
        requester_id: &str,
        filters: DiscoveryFilters,
        deadline: Duration,
    ) -> Result<DiscoveryPage, EngineError> {
        match tokio::time::timeout(deadline, self.run_discovery(requester_id, filters)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Discovery for {} exceeded {:?}", requester_id, deadline);
                Err(EngineError::Timeout(format!(
                    "discovery did not finish within {}ms",
                    deadline.as_millis()
                )))
            }
        }
    }

    async fn run_discovery(
        &self,
        requester_id: &str,
        filters: DiscoveryFilters,
    ) -> Result<DiscoveryPage, EngineError> {
        let now = Utc::now();

        // A fresh coordinate pair refreshes presence before anything is scored
        if let Some(location) = filters.location {
            if !self.store.update_location(requester_id, location, now).await? {
                return Err(EngineError::NotFound(format!("profile {}", requester_id)));
            }
        }

        let requester = self
            .store
            .get_profile(requester_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("profile {}", requester_id)))?;

        let center = requester.location.ok_or_else(|| {
            EngineError::ProfileIncomplete("a location is required before discovery".into())
        })?;

        let mut exclude_user_ids: Vec<String> = requester.blocked_users.iter().cloned().collect();
        if self.settings.exclude_swiped {
            exclude_user_ids.extend(self.store.swiped_target_ids(requester_id).await?);
        }

        let query = CandidateQuery {
            requester_id: requester.user_id.clone(),
            center,
            radius_km: filters.max_distance_km,
            genders: requester.interested_in.iter().cloned().collect(),
            min_age: filters.age_min,
            max_age: filters.age_max,
            exclude_user_ids,
            limit: self.settings.candidate_fetch_limit,
        };

        let candidates = self.store.search_candidates(&query).await?;
        let fetched = candidates.len();
        if fetched >= self.settings.candidate_fetch_limit {
            tracing::debug!(
                "Candidate fetch for {} hit the ceiling of {}",
                requester_id,
                self.settings.candidate_fetch_limit
            );
        }

        let ranked = rank_candidates(&requester, candidates, &filters, now);
        let page = paginate(ranked, &filters);

        tracing::info!(
            "Discovery for {}: {} fetched, {} ranked, returning {}",
            requester_id,
            fetched,
            page.total,
            page.profiles.len()
        );

        Ok(page)
    }

    /// Store a new location for the requester without running discovery
    pub async fn refresh_location(
        &self,
        requester_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<GeoPoint, EngineError> {
        let location = validate_point(latitude, longitude)?;

        if !self.store.update_location(requester_id, location, Utc::now()).await? {
            return Err(EngineError::NotFound(format!("profile {}", requester_id)));
        }

        tracing::debug!("Refreshed location for {}", requester_id);
        Ok(location)
    }
}

fn validate_point(latitude: f64, longitude: f64) -> Result<GeoPoint, EngineError> {
    let point = GeoPoint::new(longitude, latitude);
    if point.is_valid() {
        Ok(point)
    } else {
        Err(EngineError::InvalidAction(format!(
            "invalid coordinates ({}, {})",
            latitude, longitude
        )))
    }
}

/// Filter, score and order candidates
///
/// Boosted profiles come first, then higher scores, then user id so that
/// repeated calls over unchanged data page identically.
pub fn rank_candidates(
    requester: &Profile,
    candidates: Vec<Profile>,
    filters: &DiscoveryFilters,
    now: DateTime<Utc>,
) -> Vec<ScoredCandidate> {
    let mut ranked: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|candidate| is_eligible_candidate(requester, candidate, filters))
        .filter_map(|candidate| {
            let score = calculate_compatibility(requester, &candidate);
            let distance_km = score.distance_km?;

            if !is_within_radius(distance_km, filters.max_distance_km) {
                return None;
            }

            Some(ScoredCandidate {
                is_boosted: candidate.is_boosted(now),
                profile: candidate.card(),
                distance_km,
                compatibility_score: score.total,
                breakdown: score.breakdown,
                shared_interests: score.shared_interests,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.is_boosted
            .cmp(&a.is_boosted)
            .then(b.compatibility_score.cmp(&a.compatibility_score))
            .then_with(|| a.profile.user_id.cmp(&b.profile.user_id))
    });

    ranked
}

/// Cut one page out of a ranked list
pub fn paginate(ranked: Vec<ScoredCandidate>, filters: &DiscoveryFilters) -> DiscoveryPage {
    let total = ranked.len();
    let boosted = ranked.iter().filter(|c| c.is_boosted).count();
    let offset = (filters.page as usize - 1).saturating_mul(filters.limit as usize);

    let profiles: Vec<ScoredCandidate> = ranked
        .into_iter()
        .skip(offset)
        .take(filters.limit as usize)
        .collect();

    let has_more = offset + profiles.len() < total;

    DiscoveryPage {
        total,
        stats: DiscoveryStats {
            total,
            boosted,
            page: filters.page,
            limit: filters.limit,
            has_more,
        },
        profiles,
    }
}
