use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MatchingSettings;
use crate::core::resolve_page;
use crate::error::EngineError;
use crate::models::{Match, MatchSummary, MatchesPage, Profile, UserPair};
use crate::services::{Notifier, PushNotification, Store, StoreError};

/// Owns the match lifecycle of a user pair
///
/// `none -> matched -> unmatched | blocked`. A deactivated match is never
/// reactivated; a later mutual like creates a new row.
pub struct MatchManager<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    settings: MatchingSettings,
}

impl<S, N> Clone for MatchManager<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            settings: self.settings.clone(),
        }
    }
}

impl<S: Store, N: Notifier> MatchManager<S, N> {
    pub fn new(store: Arc<S>, notifier: Arc<N>, settings: MatchingSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    /// Create the active match for a pair, or attach to the one that exists
    ///
    /// Returns the match and whether this call created it. Concurrent callers
    /// racing on the same pair end up with the same match: the store rejects
    /// the second insert and the loser reads the winner's row.
    pub async fn create_match(&self, user_a: &str, user_b: &str) -> Result<(Match, bool), EngineError> {
        let pair = UserPair::new(user_a, user_b);
        let attempts = self.settings.create_attempts.max(1);
        let mut last_failure = String::from("no attempt made");

        for attempt in 1..=attempts {
            match self.store.create_match(&pair, Utc::now()).await {
                Ok(created) => {
                    tracing::info!(
                        "Match {} created for {} / {}",
                        created.id,
                        pair.low,
                        pair.high
                    );
                    self.notify_new_match(&created);
                    return Ok((created, true));
                }
                Err(StoreError::Conflict(reason)) => {
                    if let Some(existing) = self.store.find_active_match(&pair).await? {
                        tracing::debug!("Attached to concurrently created match {}", existing.id);
                        return Ok((existing, false));
                    }
                    // The winner was deactivated before we could read it
                    last_failure = reason;
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        "Match creation attempt {}/{} for {} / {} failed: {}",
                        attempt,
                        attempts,
                        pair.low,
                        pair.high,
                        err
                    );
                    last_failure = err.to_string();
                }
                Err(err) => return Err(err.into()),
            }

            if attempt < attempts {
                tokio::time::sleep(self.settings.backoff_for_attempt(attempt)).await;
            }
        }

        Err(EngineError::DependencyFailure(format!(
            "could not create match after {} attempts: {}",
            attempts, last_failure
        )))
    }

    pub async fn find_active_match(&self, user_a: &str, user_b: &str) -> Result<Option<Match>, EngineError> {
        Ok(self.store.find_active_match(&UserPair::new(user_a, user_b)).await?)
    }

    /// Deactivate a match on behalf of one of its members
    pub async fn unmatch(&self, match_id: Uuid, acting_user: &str) -> Result<Match, EngineError> {
        let current = self.authorize(match_id, acting_user).await?;
        if !current.is_active {
            return Ok(current);
        }

        let updated = self.store.unmatch(match_id, acting_user, Utc::now()).await?;
        tracing::info!("Match {} unmatched by {}", match_id, acting_user);

        Ok(updated)
    }

    /// Deactivate a match and its conversation and block the counterpart
    ///
    /// Safe to repeat: the blocklist never receives a duplicate entry.
    pub async fn block(
        &self,
        match_id: Uuid,
        acting_user: &str,
        reason: Option<String>,
    ) -> Result<Match, EngineError> {
        self.authorize(match_id, acting_user).await?;

        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let updated = self
            .store
            .block_match(match_id, acting_user, reason, Utc::now())
            .await?;

        tracing::info!("Match {} blocked by {}", match_id, acting_user);
        Ok(updated)
    }

    /// Active matches of a user, newest first, with the counterpart attached
    pub async fn list_active_matches(
        &self,
        user_id: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<MatchesPage, EngineError> {
        let (page, limit) = resolve_page(page, limit)?;
        let offset = (page as u64 - 1) * limit as u64;

        let (matches, total) = self.store.list_active_matches(user_id, offset, limit).await?;

        let counterpart_ids: Vec<String> = matches
            .iter()
            .filter_map(|m| m.users.other(user_id).map(str::to_string))
            .collect();
        let profiles = self.profiles_by_id(&counterpart_ids).await?;

        let summaries = matches
            .into_iter()
            .filter_map(|m| {
                let summary = summarize(m, user_id, &profiles);
                if summary.is_none() {
                    tracing::warn!("Skipping match for {} with a missing counterpart profile", user_id);
                }
                summary
            })
            .collect();

        Ok(MatchesPage {
            matches: summaries,
            total,
            page,
            limit,
        })
    }

    /// A single match, active or not, visible to its members only
    pub async fn get_match(&self, match_id: Uuid, user_id: &str) -> Result<MatchSummary, EngineError> {
        let found = self.authorize(match_id, user_id).await?;
        let counterpart_id = found
            .users
            .other(user_id)
            .map(str::to_string)
            .unwrap_or_default();
        let profiles = self.profiles_by_id(&[counterpart_id.clone()]).await?;

        summarize(found, user_id, &profiles)
            .ok_or_else(|| EngineError::NotFound(format!("profile {}", counterpart_id)))
    }

    /// Update the last-message cache after the messaging service stored a message
    pub async fn record_message(
        &self,
        match_id: Uuid,
        sender: &str,
        preview: &str,
    ) -> Result<Match, EngineError> {
        let current = self.authorize(match_id, sender).await?;
        if !current.is_active {
            return Err(EngineError::InvalidAction(format!("match {} is no longer active", match_id)));
        }

        let updated = self
            .store
            .record_message(match_id, sender, preview, Utc::now())
            .await?;

        if let Some(recipient) = updated.users.other(sender) {
            self.notify_new_message(&updated, sender, recipient, preview);
        }

        Ok(updated)
    }

    pub async fn mark_read(&self, match_id: Uuid, user_id: &str) -> Result<Match, EngineError> {
        self.authorize(match_id, user_id).await?;
        Ok(self.store.mark_read(match_id, user_id).await?)
    }

    /// Load a match and check that `user_id` is one of its members
    async fn authorize(&self, match_id: Uuid, user_id: &str) -> Result<Match, EngineError> {
        let found = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("match {}", match_id)))?;

        if !found.users.contains(user_id) {
            return Err(EngineError::Forbidden(format!(
                "{} is not a member of match {}",
                user_id, match_id
            )));
        }

        Ok(found)
    }

    async fn profiles_by_id(&self, user_ids: &[String]) -> Result<HashMap<String, Profile>, EngineError> {
        Ok(self
            .store
            .get_profiles(user_ids)
            .await?
            .into_iter()
            .map(|p| (p.user_id.clone(), p))
            .collect())
    }

    /// Tell both members about a new match, off the request path
    fn notify_new_match(&self, created: &Match) {
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let match_id = created.id;
        let ids = vec![created.users.low.clone(), created.users.high.clone()];

        tokio::spawn(async move {
            let profiles = match store.get_profiles(&ids).await {
                Ok(profiles) => profiles,
                Err(e) => {
                    tracing::warn!("Skipping match notifications for {}: {}", match_id, e);
                    return;
                }
            };

            for profile in &profiles {
                let Some(token) = profile.push_token.clone() else {
                    continue;
                };
                let counterpart = profiles
                    .iter()
                    .find(|p| p.user_id != profile.user_id)
                    .map(|p| p.display_name.as_str())
                    .unwrap_or("someone");

                if let Err(e) = notifier
                    .send(PushNotification::new_match(token, match_id, counterpart))
                    .await
                {
                    tracing::warn!("Match notification to {} failed: {}", profile.user_id, e);
                }
            }
        });
    }

    fn notify_new_message(&self, updated: &Match, sender: &str, recipient: &str, preview: &str) {
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let match_id = updated.id;
        let ids = vec![sender.to_string(), recipient.to_string()];
        let preview = preview.to_string();

        tokio::spawn(async move {
            let profiles = match store.get_profiles(&ids).await {
                Ok(profiles) => profiles,
                Err(e) => {
                    tracing::warn!("Skipping message notification for {}: {}", match_id, e);
                    return;
                }
            };
            let sender_name = profiles
                .iter()
                .find(|p| p.user_id == ids[0])
                .map(|p| p.display_name.clone())
                .unwrap_or_default();
            let Some(token) = profiles
                .iter()
                .find(|p| p.user_id == ids[1])
                .and_then(|p| p.push_token.clone())
            else {
                return;
            };

            if let Err(e) = notifier
                .send(PushNotification::new_message(token, match_id, &sender_name, &preview))
                .await
            {
                tracing::warn!("Message notification for {} failed: {}", match_id, e);
            }
        });
    }
}

/// Build the view of a match for one member
fn summarize(m: Match, user_id: &str, profiles: &HashMap<String, Profile>) -> Option<MatchSummary> {
    let counterpart = profiles.get(m.users.other(user_id)?)?.card();
    let unread_count = m.unread_for(user_id);

    Some(MatchSummary {
        matched: m,
        counterpart,
        unread_count,
        has_unread: unread_count > 0,
    })
}
