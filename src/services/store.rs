use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CandidateQuery, Conversation, GeoPoint, Match, Profile, Swipe, SwipeAction, SwipeStats,
    UserPair,
};

/// Errors raised by a backing store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transient failure, safe to retry
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::SqlxError(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary of the engine
///
/// Every method is one unit of work: implementations must apply each call
/// atomically, and `create_match` must reject a second active match for the
/// same pair with [`StoreError::Conflict`].
pub trait Store: Send + Sync + 'static {
    fn get_profile(&self, user_id: &str) -> impl Future<Output = StoreResult<Option<Profile>>> + Send;

    fn get_profiles(&self, user_ids: &[String]) -> impl Future<Output = StoreResult<Vec<Profile>>> + Send;

    /// Returns false when no profile exists for `user_id`
    fn update_location(
        &self,
        user_id: &str,
        location: GeoPoint,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Radius search; may return candidates slightly past the radius but never
    /// drops one inside it
    fn search_candidates(&self, query: &CandidateQuery) -> impl Future<Output = StoreResult<Vec<Profile>>> + Send;

    fn swiped_target_ids(&self, user_id: &str) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Creates or overwrites Swipe(from, to) and bumps the actor's swipe counter.
    /// Also returns the action it replaced, `None` when the row was created.
    fn upsert_swipe(
        &self,
        from_user: &str,
        to_user: &str,
        action: SwipeAction,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<(Swipe, Option<SwipeAction>)>> + Send;

    fn find_swipe(&self, from_user: &str, to_user: &str) -> impl Future<Output = StoreResult<Option<Swipe>>> + Send;

    /// Marks Swipe(from, to) as part of a match created at `matched_at`
    fn flag_swipe_match(
        &self,
        from_user: &str,
        to_user: &str,
        matched_at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<Swipe>>> + Send;

    /// Deletes the user's latest swipe; deactivates the pair's active match
    /// when that swipe had produced it
    fn undo_last_swipe(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<(Swipe, Option<Match>)>>> + Send;

    /// Positive swipes on `user_id`, skipping likers in `exclude_user_ids`,
    /// inactive likers and likers who blocked `user_id`
    fn received_likes(
        &self,
        user_id: &str,
        exclude_user_ids: &[String],
        offset: u64,
        limit: u32,
    ) -> impl Future<Output = StoreResult<(Vec<Swipe>, u64)>> + Send;

    fn swipe_stats(&self, user_id: &str) -> impl Future<Output = StoreResult<SwipeStats>> + Send;

    /// Inserts conversation and match, flags both swipes and bumps both match
    /// counters in one transaction
    fn create_match(&self, pair: &UserPair, now: DateTime<Utc>) -> impl Future<Output = StoreResult<Match>> + Send;

    fn find_active_match(&self, pair: &UserPair) -> impl Future<Output = StoreResult<Option<Match>>> + Send;

    fn get_match(&self, match_id: Uuid) -> impl Future<Output = StoreResult<Option<Match>>> + Send;

    fn list_active_matches(
        &self,
        user_id: &str,
        offset: u64,
        limit: u32,
    ) -> impl Future<Output = StoreResult<(Vec<Match>, u64)>> + Send;

    fn unmatch(
        &self,
        match_id: Uuid,
        acting_user: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Match>> + Send;

    /// Deactivates match and conversation and adds the counterpart to the
    /// actor's blocklist if absent
    fn block_match(
        &self,
        match_id: Uuid,
        acting_user: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Match>> + Send;

    /// Fails with [`StoreError::InvalidInput`] once the match is inactive
    fn record_message(
        &self,
        match_id: Uuid,
        sender: &str,
        preview: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Match>> + Send;

    fn mark_read(&self, match_id: Uuid, user_id: &str) -> impl Future<Output = StoreResult<Match>> + Send;

    fn get_conversation(&self, conversation_id: Uuid) -> impl Future<Output = StoreResult<Option<Conversation>>> + Send;

    fn health_check(&self) -> impl Future<Output = StoreResult<bool>> + Send;
}
