use chrono::Utc;
use std::sync::Arc;

use crate::core::filters::can_interact;
use crate::core::matches::MatchManager;
use crate::core::resolve_page;
use crate::error::EngineError;
use crate::models::{
    Profile, ReceivedLike, ReceivedLikesPage, Swipe, SwipeAction, SwipeOutcome, UndoOutcome,
    UserStatsResponse,
};
use crate::services::{Notifier, Store};

/// Records swipes and detects mutual likes
pub struct SwipeLedger<S, N> {
    store: Arc<S>,
    matches: MatchManager<S, N>,
}

impl<S, N> Clone for SwipeLedger<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            matches: self.matches.clone(),
        }
    }
}

impl<S: Store, N: Notifier> SwipeLedger<S, N> {
    pub fn new(store: Arc<S>, matches: MatchManager<S, N>) -> Self {
        Self { store, matches }
    }

    /// Record `from_user`'s swipe on `to_user`
    ///
    /// The swipe is written first, then the reverse swipe is looked up, then
    /// the match is created. The returned swipe only carries `isMatch` once the
    /// match row exists.
    ///
    /// Match detection runs for new positive swipes and for a positive swipe
    /// repeated while still unmatched, so a like whose match creation failed
    /// is completed by either user swiping again.
    pub async fn record_swipe(
        &self,
        from_user: &str,
        to_user: &str,
        action: SwipeAction,
    ) -> Result<SwipeOutcome, EngineError> {
        if from_user == to_user {
            return Err(EngineError::InvalidAction("cannot swipe on yourself".into()));
        }

        let actor = self.require_profile(from_user).await?;
        let target = self
            .store
            .get_profile(to_user)
            .await?
            .filter(|target| can_interact(&actor, target))
            .ok_or_else(|| EngineError::NotFound(format!("profile {}", to_user)))?;

        let (swipe, previous) = self
            .store
            .upsert_swipe(from_user, &target.user_id, action, Utc::now())
            .await?;

        tracing::info!(
            "Swipe {} -> {} ({}, {})",
            from_user,
            to_user,
            action,
            match previous {
                None => "new".to_string(),
                Some(previous) => format!("was {}", previous),
            }
        );

        if !detects_match(previous, &swipe) {
            return Ok(SwipeOutcome {
                swipe,
                is_match: false,
                is_new_match: false,
                matched: None,
            });
        }

        let reciprocated = self
            .store
            .find_swipe(to_user, from_user)
            .await?
            .map_or(false, |reverse| reverse.action.is_positive());

        if !reciprocated {
            return Ok(SwipeOutcome {
                swipe,
                is_match: false,
                is_new_match: false,
                matched: None,
            });
        }

        let (matched, is_new_match) = match self.matches.find_active_match(from_user, to_user).await? {
            Some(existing) => (existing, false),
            None => self.matches.create_match(from_user, to_user).await?,
        };

        let swipe = match self.store.find_swipe(from_user, to_user).await? {
            Some(current) if current.is_match => current,
            _ => self
                .store
                .flag_swipe_match(from_user, to_user, matched.matched_at)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("swipe {} -> {}", from_user, to_user)))?,
        };

        Ok(SwipeOutcome {
            swipe,
            is_match: true,
            is_new_match,
            matched: Some(matched),
        })
    }

    /// Remove the user's most recent swipe
    ///
    /// When that swipe had produced a match, the match and its conversation
    /// are deactivated in the same write.
    pub async fn undo_last_swipe(&self, user_id: &str) -> Result<UndoOutcome, EngineError> {
        let (undone_swipe, reverted_match) = self
            .store
            .undo_last_swipe(user_id, Utc::now())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("no swipe to undo for {}", user_id)))?;

        match &reverted_match {
            Some(reverted) => tracing::info!(
                "{} undid swipe on {} and reverted match {}",
                user_id,
                undone_swipe.to_user,
                reverted.id
            ),
            None => tracing::info!("{} undid swipe on {}", user_id, undone_swipe.to_user),
        }

        Ok(UndoOutcome {
            undone_swipe,
            reverted_match,
        })
    }

    /// Likes the user received, newest first
    ///
    /// Skips users on either side of a block and likers who left.
    pub async fn received_likes(
        &self,
        user_id: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<ReceivedLikesPage, EngineError> {
        let (page, limit) = resolve_page(page, limit)?;
        let offset = (page as u64 - 1) * limit as u64;

        let recipient = self.require_profile(user_id).await?;
        let blocked: Vec<String> = recipient.blocked_users.iter().cloned().collect();

        let (swipes, total) = self
            .store
            .received_likes(user_id, &blocked, offset, limit)
            .await?;

        let liker_ids: Vec<String> = swipes.iter().map(|s| s.from_user.clone()).collect();
        let likers = self.store.get_profiles(&liker_ids).await?;

        let likes = swipes
            .into_iter()
            .filter_map(|swipe| {
                let profile = likers.iter().find(|p| p.user_id == swipe.from_user)?.card();
                Some(ReceivedLike { swipe, profile })
            })
            .collect();

        Ok(ReceivedLikesPage {
            likes,
            total,
            page,
            limit,
        })
    }

    /// Activity totals and profile completeness for one user
    pub async fn user_stats(&self, user_id: &str) -> Result<UserStatsResponse, EngineError> {
        let profile = self.require_profile(user_id).await?;
        let stats = self.store.swipe_stats(user_id).await?;

        Ok(UserStatsResponse {
            total_swipes: profile.total_swipes,
            total_matches: profile.total_matches,
            likes_sent: stats.likes_sent,
            dislikes_sent: stats.dislikes_sent,
            superlikes_sent: stats.superlikes_sent,
            likes_received: stats.likes_received,
            active_matches: stats.active_matches,
            profile_completeness: profile.completeness(),
        })
    }

    async fn require_profile(&self, user_id: &str) -> Result<Profile, EngineError> {
        self.store
            .get_profile(user_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| EngineError::NotFound(format!("profile {}", user_id)))
    }
}

/// Whether a just-written swipe should be checked for a mutual like
///
/// Changing a dislike into a like stays a plain overwrite.
fn detects_match(previous: Option<SwipeAction>, swipe: &Swipe) -> bool {
    if !swipe.action.is_positive() {
        return false;
    }

    match previous {
        None => true,
        Some(previous) => previous.is_positive() && !swipe.is_match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn swipe(action: SwipeAction, is_match: bool) -> Swipe {
        let now = Utc::now();
        Swipe {
            id: Uuid::new_v4(),
            from_user: "a".to_string(),
            to_user: "b".to_string(),
            action,
            is_match,
            match_date: is_match.then_some(now),
            created_at: now,
            swiped_at: now,
        }
    }

    #[test]
    fn test_match_detection_on_first_swipe() {
        assert!(detects_match(None, &swipe(SwipeAction::Like, false)));
        assert!(detects_match(None, &swipe(SwipeAction::Superlike, false)));
        assert!(!detects_match(None, &swipe(SwipeAction::Dislike, false)));
    }

    #[test]
    fn test_match_detection_on_reswipe() {
        // Repeating an unmatched like retries the match
        assert!(detects_match(Some(SwipeAction::Like), &swipe(SwipeAction::Superlike, false)));
        assert!(detects_match(Some(SwipeAction::Superlike), &swipe(SwipeAction::Like, false)));

        assert!(!detects_match(Some(SwipeAction::Dislike), &swipe(SwipeAction::Like, false)));
        assert!(!detects_match(Some(SwipeAction::Like), &swipe(SwipeAction::Like, true)));
        assert!(!detects_match(Some(SwipeAction::Like), &swipe(SwipeAction::Dislike, false)));
    }
}
