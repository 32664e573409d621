use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::distance::{calculate_bounding_box, distance_km, is_within_bounding_box};
use crate::models::{
    CandidateQuery, Conversation, GeoPoint, Match, Profile, Swipe, SwipeAction, SwipeStats,
    UserPair,
};
use crate::services::store::{Store, StoreError, StoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    profiles: HashMap<String, Profile>,
    /// Keyed by (from, to); the sequence number orders swipes by recency
    swipes: HashMap<(String, String), (Swipe, u64)>,
    matches: HashMap<Uuid, Match>,
    conversations: HashMap<Uuid, Conversation>,
    sequence: u64,
}

impl MemoryState {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn active_match_id(&self, pair: &UserPair) -> Option<Uuid> {
        self.matches
            .values()
            .find(|m| m.is_active && &m.users == pair)
            .map(|m| m.id)
    }

    fn deactivate_conversation(&mut self, conversation_id: Uuid) {
        if let Some(conversation) = self.conversations.get_mut(&conversation_id) {
            conversation.is_active = false;
        }
    }

    fn match_mut(&mut self, match_id: Uuid) -> StoreResult<&mut Match> {
        self.matches
            .get_mut(&match_id)
            .ok_or_else(|| StoreError::NotFound(format!("match {}", match_id)))
    }
}

/// Store kept entirely in process memory
///
/// Each trait call holds one lock for its whole duration, which gives the
/// same all-or-nothing behavior as a database transaction. Used by the test
/// suites and for local runs without Postgres.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile, as the profile service would
    pub async fn put_profile(&self, profile: Profile) {
        let mut state = self.state.lock().await;
        state.profiles.insert(profile.user_id.clone(), profile);
    }

    pub async fn swipe_count(&self) -> usize {
        self.state.lock().await.swipes.len()
    }

    /// All matches ever created for a pair, active or not
    pub async fn matches_for_pair(&self, pair: &UserPair) -> Vec<Match> {
        let state = self.state.lock().await;
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| &m.users == pair)
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.matched_at);
        matches
    }

    pub async fn conversations_for_pair(&self, pair: &UserPair) -> Vec<Conversation> {
        let state = self.state.lock().await;
        state
            .conversations
            .values()
            .filter(|c| &c.participants == pair)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Hold the store lock; every call waits until the guard is dropped
    pub(crate) async fn stall(&self) -> tokio::sync::MutexGuard<'_, impl Sized> {
        self.state.lock().await
    }
}

fn paginate<T>(items: Vec<T>, offset: u64, limit: u32) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let page = items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    (page, total)
}

impl Store for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let state = self.state.lock().await;
        Ok(state.profiles.get(user_id).cloned())
    }

    async fn get_profiles(&self, user_ids: &[String]) -> StoreResult<Vec<Profile>> {
        let state = self.state.lock().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| state.profiles.get(id).cloned())
            .collect())
    }

    async fn update_location(
        &self,
        user_id: &str,
        location: GeoPoint,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.profiles.get_mut(user_id) {
            Some(profile) => {
                profile.location = Some(location);
                profile.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn search_candidates(&self, query: &CandidateQuery) -> StoreResult<Vec<Profile>> {
        let state = self.state.lock().await;
        let bbox = calculate_bounding_box(query.center.latitude, query.center.longitude, query.radius_km);

        let mut found: Vec<(f64, Profile)> = state
            .profiles
            .values()
            .filter(|p| p.user_id != query.requester_id)
            .filter(|p| p.is_searchable && p.is_active)
            .filter(|p| query.genders.contains(&p.gender))
            .filter(|p| p.age >= query.min_age && p.age <= query.max_age)
            .filter(|p| !query.exclude_user_ids.contains(&p.user_id))
            .filter(|p| !p.has_blocked(&query.requester_id))
            .filter_map(|p| {
                let location = p.location?;
                if !is_within_bounding_box(location.latitude, location.longitude, &bbox) {
                    return None;
                }
                let distance = distance_km(&query.center, &location);
                (distance <= query.radius_km).then(|| (distance, p.clone()))
            })
            .collect();

        found.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.user_id.cmp(&b.1.user_id))
        });
        found.truncate(query.limit);

        Ok(found.into_iter().map(|(_, p)| p).collect())
    }

    async fn swiped_target_ids(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .swipes
            .keys()
            .filter(|(from, _)| from == user_id)
            .map(|(_, to)| to.clone())
            .collect())
    }

    async fn upsert_swipe(
        &self,
        from_user: &str,
        to_user: &str,
        action: SwipeAction,
        now: DateTime<Utc>,
    ) -> StoreResult<(Swipe, Option<SwipeAction>)> {
        let mut state = self.state.lock().await;
        let sequence = state.next_sequence();
        let key = (from_user.to_string(), to_user.to_string());

        let (swipe, previous) = match state.swipes.get_mut(&key) {
            Some((existing, seq)) => {
                let previous = std::mem::replace(&mut existing.action, action);
                existing.swiped_at = now;
                *seq = sequence;
                (existing.clone(), Some(previous))
            }
            None => {
                let swipe = Swipe {
                    id: Uuid::new_v4(),
                    from_user: from_user.to_string(),
                    to_user: to_user.to_string(),
                    action,
                    is_match: false,
                    match_date: None,
                    created_at: now,
                    swiped_at: now,
                };
                state.swipes.insert(key, (swipe.clone(), sequence));
                (swipe, None)
            }
        };

        if let Some(profile) = state.profiles.get_mut(from_user) {
            profile.total_swipes += 1;
        }

        Ok((swipe, previous))
    }

    async fn find_swipe(&self, from_user: &str, to_user: &str) -> StoreResult<Option<Swipe>> {
        let state = self.state.lock().await;
        Ok(state
            .swipes
            .get(&(from_user.to_string(), to_user.to_string()))
            .map(|(swipe, _)| swipe.clone()))
    }

    async fn flag_swipe_match(
        &self,
        from_user: &str,
        to_user: &str,
        matched_at: DateTime<Utc>,
    ) -> StoreResult<Option<Swipe>> {
        let mut state = self.state.lock().await;
        Ok(state
            .swipes
            .get_mut(&(from_user.to_string(), to_user.to_string()))
            .map(|(swipe, _)| {
                swipe.is_match = true;
                swipe.match_date = Some(matched_at);
                swipe.clone()
            }))
    }

    async fn undo_last_swipe(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(Swipe, Option<Match>)>> {
        let mut state = self.state.lock().await;

        let latest = state
            .swipes
            .iter()
            .filter(|((from, _), _)| from == user_id)
            .max_by_key(|(_, (swipe, seq))| (swipe.swiped_at, *seq))
            .map(|(key, _)| key.clone());

        let Some(key) = latest else {
            return Ok(None);
        };
        let Some((swipe, _)) = state.swipes.remove(&key) else {
            return Ok(None);
        };

        let mut reverted = None;
        if swipe.is_match {
            let pair = UserPair::new(&swipe.from_user, &swipe.to_user);
            if let Some(match_id) = state.active_match_id(&pair) {
                let conversation_id = {
                    let m = state.match_mut(match_id)?;
                    m.is_active = false;
                    m.unmatched_by = Some(user_id.to_string());
                    m.unmatched_at = Some(now);
                    reverted = Some(m.clone());
                    m.conversation_id
                };
                state.deactivate_conversation(conversation_id);
            }
        }

        Ok(Some((swipe, reverted)))
    }

    async fn received_likes(
        &self,
        user_id: &str,
        exclude_user_ids: &[String],
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<Swipe>, u64)> {
        let state = self.state.lock().await;
        let mut likes: Vec<(Swipe, u64)> = state
            .swipes
            .values()
            .filter(|(s, _)| s.to_user == user_id && s.action.is_positive())
            .filter(|(s, _)| !exclude_user_ids.contains(&s.from_user))
            .filter(|(s, _)| {
                state
                    .profiles
                    .get(&s.from_user)
                    .map_or(false, |liker| liker.is_active && !liker.has_blocked(user_id))
            })
            .cloned()
            .collect();
        likes.sort_by(|a, b| b.0.swiped_at.cmp(&a.0.swiped_at).then(b.1.cmp(&a.1)));

        Ok(paginate(likes.into_iter().map(|(s, _)| s).collect(), offset, limit))
    }

    async fn swipe_stats(&self, user_id: &str) -> StoreResult<SwipeStats> {
        let state = self.state.lock().await;
        let mut stats = SwipeStats::default();

        for (swipe, _) in state.swipes.values() {
            if swipe.from_user == user_id {
                match swipe.action {
                    SwipeAction::Like => stats.likes_sent += 1,
                    SwipeAction::Dislike => stats.dislikes_sent += 1,
                    SwipeAction::Superlike => stats.superlikes_sent += 1,
                }
            } else if swipe.to_user == user_id && swipe.action.is_positive() {
                stats.likes_received += 1;
            }
        }
        stats.active_matches = state
            .matches
            .values()
            .filter(|m| m.is_active && m.users.contains(user_id))
            .count() as u64;

        Ok(stats)
    }

    async fn create_match(&self, pair: &UserPair, now: DateTime<Utc>) -> StoreResult<Match> {
        let mut state = self.state.lock().await;

        if state.active_match_id(pair).is_some() {
            return Err(StoreError::Conflict(format!(
                "active match already exists for {} / {}",
                pair.low, pair.high
            )));
        }

        let conversation = Conversation::new(pair.clone(), now);
        let created = Match::new(pair.clone(), conversation.id, now);
        state.conversations.insert(conversation.id, conversation);
        state.matches.insert(created.id, created.clone());

        for key in [
            (pair.low.clone(), pair.high.clone()),
            (pair.high.clone(), pair.low.clone()),
        ] {
            if let Some((swipe, _)) = state.swipes.get_mut(&key) {
                swipe.is_match = true;
                swipe.match_date = Some(now);
            }
        }
        for user_id in [&pair.low, &pair.high] {
            if let Some(profile) = state.profiles.get_mut(user_id) {
                profile.total_matches += 1;
            }
        }

        Ok(created)
    }

    async fn find_active_match(&self, pair: &UserPair) -> StoreResult<Option<Match>> {
        let state = self.state.lock().await;
        Ok(state
            .active_match_id(pair)
            .and_then(|id| state.matches.get(&id).cloned()))
    }

    async fn get_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        let state = self.state.lock().await;
        Ok(state.matches.get(&match_id).cloned())
    }

    async fn list_active_matches(
        &self,
        user_id: &str,
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<Match>, u64)> {
        let state = self.state.lock().await;
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.is_active && m.users.contains(user_id))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.matched_at.cmp(&a.matched_at).then(a.id.cmp(&b.id)));

        Ok(paginate(matches, offset, limit))
    }

    async fn unmatch(&self, match_id: Uuid, acting_user: &str, now: DateTime<Utc>) -> StoreResult<Match> {
        let mut state = self.state.lock().await;
        let m = state.match_mut(match_id)?;
        if m.is_active {
            m.is_active = false;
            m.unmatched_by = Some(acting_user.to_string());
            m.unmatched_at = Some(now);
        }
        Ok(m.clone())
    }

    async fn block_match(
        &self,
        match_id: Uuid,
        acting_user: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Match> {
        let mut state = self.state.lock().await;

        let (blocked, other) = {
            let m = state.match_mut(match_id)?;
            let other = m
                .users
                .other(acting_user)
                .map(str::to_string)
                .ok_or_else(|| StoreError::InvalidInput(format!("{} is not part of match {}", acting_user, match_id)))?;
            m.is_active = false;
            if m.blocked_by.is_none() {
                m.blocked_by = Some(acting_user.to_string());
                m.block_reason = reason;
            }
            if m.unmatched_at.is_none() {
                m.unmatched_at = Some(now);
            }
            (m.clone(), other)
        };

        state.deactivate_conversation(blocked.conversation_id);
        if let Some(profile) = state.profiles.get_mut(acting_user) {
            // BTreeSet keeps the blocklist free of duplicates
            profile.blocked_users.insert(other);
            profile.updated_at = now;
        }

        Ok(blocked)
    }

    async fn record_message(
        &self,
        match_id: Uuid,
        sender: &str,
        preview: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Match> {
        let mut state = self.state.lock().await;
        let m = state.match_mut(match_id)?;
        let recipient = m
            .users
            .other(sender)
            .map(str::to_string)
            .ok_or_else(|| StoreError::InvalidInput(format!("{} is not part of match {}", sender, match_id)))?;
        if !m.is_active {
            return Err(StoreError::InvalidInput(format!("match {} is no longer active", match_id)));
        }

        m.last_message_preview = Some(preview.to_string());
        m.last_message_at = Some(now);
        m.last_message_by = Some(sender.to_string());
        m.message_count += 1;
        *m.unread.entry(recipient).or_insert(0) += 1;

        Ok(m.clone())
    }

    async fn mark_read(&self, match_id: Uuid, user_id: &str) -> StoreResult<Match> {
        let mut state = self.state.lock().await;
        let m = state.match_mut(match_id)?;
        m.unread.insert(user_id.to_string(), 0);
        Ok(m.clone())
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> StoreResult<Option<Conversation>> {
        let state = self.state.lock().await;
        Ok(state.conversations.get(&conversation_id).cloned())
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}
