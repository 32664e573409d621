// Core engine exports
pub mod discovery;
pub mod distance;
pub mod filters;
pub mod matches;
pub mod scoring;
pub mod swipes;

pub use discovery::{paginate, rank_candidates, DiscoveryRanker};
pub use distance::{calculate_bounding_box, distance_km, haversine_distance, is_within_bounding_box};
pub use filters::{can_interact, is_eligible_candidate, is_within_radius};
pub use matches::MatchManager;
pub use scoring::{calculate_compatibility, MAX_SCORE};
pub use swipes::SwipeLedger;

use crate::error::EngineError;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Resolve `page`/`limit` for the list endpoints (likes, matches)
pub fn resolve_page(page: Option<u32>, limit: Option<u32>) -> Result<(u32, u32), EngineError> {
    let page = page.unwrap_or(1);
    if page == 0 {
        return Err(EngineError::InvalidAction("page must be at least 1".into()));
    }

    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if limit == 0 {
        return Err(EngineError::InvalidAction("limit must be at least 1".into()));
    }

    Ok((page, limit.min(MAX_PAGE_LIMIT)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_page_defaults_and_caps() {
        assert_eq!(resolve_page(None, None).unwrap(), (1, 20));
        assert_eq!(resolve_page(Some(3), Some(500)).unwrap(), (3, 50));
        assert!(resolve_page(Some(0), None).is_err());
        assert!(resolve_page(None, Some(0)).is_err());
    }
}
