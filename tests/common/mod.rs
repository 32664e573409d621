// Shared fixtures for the integration test crates
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use swipe_engine::config::{DiscoverySettings, MatchingSettings};
use swipe_engine::core::{DiscoveryRanker, MatchManager, SwipeLedger};
use swipe_engine::models::{
    CandidateQuery, Conversation, GeoPoint, LookingFor, Match, Profile, Swipe, SwipeAction,
    SwipeStats, UserPair,
};
use swipe_engine::services::{
    MemoryStore, Notifier, PushError, PushNotification, Store, StoreError, StoreResult,
};

/// Lagos, Nigeria
pub const LAGOS: (f64, f64) = (6.5244, 3.3792);

/// Notifier that keeps every notification in memory
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<PushNotification>>,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<PushNotification> {
        self.sent.lock().await.clone()
    }

    /// Notifications are dispatched on spawned tasks; poll until `count` arrived
    pub async fn wait_for(&self, count: usize) -> Vec<PushNotification> {
        for _ in 0..100 {
            let sent = self.sent().await;
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent().await
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, notification: PushNotification) -> Result<(), PushError> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

pub fn create_profile(id: &str, age: u8, gender: &str, interested_in: &str, lat: f64, lon: f64) -> Profile {
    Profile {
        user_id: id.to_string(),
        display_name: format!("User {}", id),
        age,
        gender: gender.to_string(),
        interested_in: [interested_in.to_string()].into_iter().collect(),
        looking_for: LookingFor::Relationship,
        bio: Some(format!("Hi, I am {}", id)),
        interests: BTreeSet::new(),
        photos: vec![format!("photo-{}", id)],
        location: Some(GeoPoint::new(lon, lat)),
        is_searchable: true,
        is_active: true,
        blocked_users: BTreeSet::new(),
        total_matches: 0,
        total_swipes: 0,
        verification_score: 1,
        boost_expires_at: None,
        push_token: Some(format!("device-{}", id)),
        updated_at: Utc::now(),
    }
}

/// Point `km` kilometres due north of (`lat`, `lon`)
pub fn north_of(lat: f64, lon: f64, km: f64) -> (f64, f64) {
    (lat + km / 111.195, lon)
}

/// Memory store whose `create_match` can be made to fail on demand
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    unavailable: AtomicU32,
    phantom_conflicts: AtomicU32,
    create_match_calls: AtomicU32,
}

impl FlakyStore {
    /// Fail the next `times` match inserts as unavailable
    pub fn fail_create_match(&self, times: u32) {
        self.unavailable.store(times, Ordering::SeqCst);
    }

    /// Reject the next `times` match inserts as conflicts while no active
    /// match exists, as when the winning match is deactivated right away
    pub fn conflict_create_match(&self, times: u32) {
        self.phantom_conflicts.store(times, Ordering::SeqCst);
    }

    pub fn create_match_calls(&self) -> u32 {
        self.create_match_calls.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl Store for FlakyStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        self.inner.get_profile(user_id).await
    }

    async fn get_profiles(&self, user_ids: &[String]) -> StoreResult<Vec<Profile>> {
        self.inner.get_profiles(user_ids).await
    }

    async fn update_location(&self, user_id: &str, location: GeoPoint, now: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.update_location(user_id, location, now).await
    }

    async fn search_candidates(&self, query: &CandidateQuery) -> StoreResult<Vec<Profile>> {
        self.inner.search_candidates(query).await
    }

    async fn swiped_target_ids(&self, user_id: &str) -> StoreResult<Vec<String>> {
        self.inner.swiped_target_ids(user_id).await
    }

    async fn upsert_swipe(
        &self,
        from_user: &str,
        to_user: &str,
        action: SwipeAction,
        now: DateTime<Utc>,
    ) -> StoreResult<(Swipe, Option<SwipeAction>)> {
        self.inner.upsert_swipe(from_user, to_user, action, now).await
    }

    async fn find_swipe(&self, from_user: &str, to_user: &str) -> StoreResult<Option<Swipe>> {
        self.inner.find_swipe(from_user, to_user).await
    }

    async fn flag_swipe_match(
        &self,
        from_user: &str,
        to_user: &str,
        matched_at: DateTime<Utc>,
    ) -> StoreResult<Option<Swipe>> {
        self.inner.flag_swipe_match(from_user, to_user, matched_at).await
    }

    async fn undo_last_swipe(&self, user_id: &str, now: DateTime<Utc>) -> StoreResult<Option<(Swipe, Option<Match>)>> {
        self.inner.undo_last_swipe(user_id, now).await
    }

    async fn received_likes(
        &self,
        user_id: &str,
        exclude_user_ids: &[String],
        offset: u64,
        limit: u32,
    ) -> StoreResult<(Vec<Swipe>, u64)> {
        self.inner.received_likes(user_id, exclude_user_ids, offset, limit).await
    }

    async fn swipe_stats(&self, user_id: &str) -> StoreResult<SwipeStats> {
        self.inner.swipe_stats(user_id).await
    }

    async fn create_match(&self, pair: &UserPair, now: DateTime<Utc>) -> StoreResult<Match> {
        self.create_match_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.unavailable) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        if take_one(&self.phantom_conflicts) {
            return Err(StoreError::Conflict(format!("active match exists for {} / {}", pair.low, pair.high)));
        }
        self.inner.create_match(pair, now).await
    }

    async fn find_active_match(&self, pair: &UserPair) -> StoreResult<Option<Match>> {
        self.inner.find_active_match(pair).await
    }

    async fn get_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        self.inner.get_match(match_id).await
    }

    async fn list_active_matches(&self, user_id: &str, offset: u64, limit: u32) -> StoreResult<(Vec<Match>, u64)> {
        self.inner.list_active_matches(user_id, offset, limit).await
    }

    async fn unmatch(&self, match_id: Uuid, acting_user: &str, now: DateTime<Utc>) -> StoreResult<Match> {
        self.inner.unmatch(match_id, acting_user, now).await
    }

    async fn block_match(
        &self,
        match_id: Uuid,
        acting_user: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Match> {
        self.inner.block_match(match_id, acting_user, reason, now).await
    }

    async fn record_message(&self, match_id: Uuid, sender: &str, preview: &str, now: DateTime<Utc>) -> StoreResult<Match> {
        self.inner.record_message(match_id, sender, preview, now).await
    }

    async fn mark_read(&self, match_id: Uuid, user_id: &str) -> StoreResult<Match> {
        self.inner.mark_read(match_id, user_id).await
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> StoreResult<Option<Conversation>> {
        self.inner.get_conversation(conversation_id).await
    }

    async fn health_check(&self) -> StoreResult<bool> {
        self.inner.health_check().await
    }
}

/// Access to the memory store behind a test engine
pub trait Backing {
    fn memory(&self) -> &MemoryStore;
}

impl Backing for MemoryStore {
    fn memory(&self) -> &MemoryStore {
        self
    }
}

impl Backing for FlakyStore {
    fn memory(&self) -> &MemoryStore {
        &self.inner
    }
}

pub struct Engine<S = MemoryStore> {
    pub store: Arc<S>,
    pub notifier: Arc<RecordingNotifier>,
    pub discovery: DiscoveryRanker<S>,
    pub ledger: SwipeLedger<S, RecordingNotifier>,
    pub matches: MatchManager<S, RecordingNotifier>,
}

pub fn engine() -> Engine {
    engine_with(DiscoverySettings::default())
}

pub fn engine_with(discovery: DiscoverySettings) -> Engine {
    build(MemoryStore::new(), discovery, MatchingSettings::default())
}

/// Engine over a [`FlakyStore`] with short retry backoff
pub fn flaky_engine(create_attempts: u32) -> Engine<FlakyStore> {
    let matching = MatchingSettings {
        create_attempts,
        retry_backoff_ms: 1,
    };
    build(FlakyStore::default(), DiscoverySettings::default(), matching)
}

fn build<S: Store>(store: S, discovery: DiscoverySettings, matching: MatchingSettings) -> Engine<S> {
    let store = Arc::new(store);
    let notifier = Arc::new(RecordingNotifier::default());
    let matches = MatchManager::new(Arc::clone(&store), Arc::clone(&notifier), matching);
    let ledger = SwipeLedger::new(Arc::clone(&store), matches.clone());

    Engine {
        discovery: DiscoveryRanker::new(Arc::clone(&store), discovery),
        store,
        notifier,
        ledger,
        matches,
    }
}

/// A (25, female, Lagos) and B (27, male, 2 km away) who are into each other
/// and share "hiking"
pub async fn seed_pair<S: Backing>(engine: &Engine<S>) -> (Profile, Profile) {
    let (lat, lon) = LAGOS;
    let mut a = create_profile("user-a", 25, "female", "male", lat, lon);
    a.interests.insert("hiking".to_string());
    let (b_lat, b_lon) = north_of(lat, lon, 2.0);
    let mut b = create_profile("user-b", 27, "male", "female", b_lat, b_lon);
    b.interests.insert("hiking".to_string());

    engine.store.memory().put_profile(a.clone()).await;
    engine.store.memory().put_profile(b.clone()).await;
    (a, b)
}
