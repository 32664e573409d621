use serde::{Deserialize, Serialize};
use crate::models::domain::{GeoPoint, Match, ProfileCard, ScoredCandidate, Swipe};
use crate::services::CacheStats;

/// Counters attached to a discovery page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryStats {
    pub total: usize,
    pub boosted: usize,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// Response for `GET /discover`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPage {
    pub profiles: Vec<ScoredCandidate>,
    pub total: usize,
    pub stats: DiscoveryStats,
}

/// Response for `POST /discover/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshLocationResponse {
    pub success: bool,
    pub location: GeoPoint,
}

/// Result of recording a swipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipeOutcome {
    pub swipe: Swipe,
    #[serde(rename = "isMatch")]
    pub is_match: bool,
    #[serde(rename = "isNewMatch")]
    pub is_new_match: bool,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub matched: Option<Match>,
}

/// Result of undoing the last swipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoOutcome {
    #[serde(rename = "undoneSwipe")]
    pub undone_swipe: Swipe,
    #[serde(rename = "revertedMatch", skip_serializing_if = "Option::is_none")]
    pub reverted_match: Option<Match>,
}

/// A like received from another user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedLike {
    pub swipe: Swipe,
    pub profile: ProfileCard,
}

/// Response for `GET /swipes/received`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedLikesPage {
    pub likes: Vec<ReceivedLike>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Active match enriched for one participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    #[serde(rename = "match")]
    pub matched: Match,
    pub counterpart: ProfileCard,
    #[serde(rename = "unreadCount")]
    pub unread_count: u32,
    #[serde(rename = "hasUnread")]
    pub has_unread: bool,
}

/// Response for `GET /matches`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchesPage {
    pub matches: Vec<MatchSummary>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Response for `GET /stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatsResponse {
    #[serde(rename = "totalSwipes")]
    pub total_swipes: u32,
    #[serde(rename = "totalMatches")]
    pub total_matches: u32,
    #[serde(rename = "likesSent")]
    pub likes_sent: u64,
    #[serde(rename = "dislikesSent")]
    pub dislikes_sent: u64,
    #[serde(rename = "superlikesSent")]
    pub superlikes_sent: u64,
    #[serde(rename = "likesReceived")]
    pub likes_received: u64,
    #[serde(rename = "activeMatches")]
    pub active_matches: u64,
    #[serde(rename = "profileCompleteness")]
    pub profile_completeness: u8,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Absent when the service runs without a cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}
