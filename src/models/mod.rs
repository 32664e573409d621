// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, CandidateQuery, CompatibilityScore, Conversation, DiscoveryFilters, GeoPoint,
    LookingFor, Match, Profile, ProfileCard, ScoreBreakdown, ScoredCandidate, Swipe, SwipeAction,
    SwipeStats, UserPair,
};
pub use requests::{BlockRequest, DiscoverQuery, MessageActivityRequest, PageQuery, RefreshLocationRequest, SwipeRequest};
pub use responses::{
    DiscoveryPage, DiscoveryStats, ErrorResponse, HealthResponse, MatchSummary, MatchesPage,
    ReceivedLike, ReceivedLikesPage, RefreshLocationResponse, SwipeOutcome, UndoOutcome,
    UserStatsResponse,
};
