use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A longitude/latitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    /// True when both coordinates are finite and inside their valid ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// What a user is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookingFor {
    Relationship,
    Casual,
    Marriage,
    Friendship,
}

impl LookingFor {
    /// Long-term intents share a bucket, as do short-term ones
    pub fn is_long_term(self) -> bool {
        matches!(self, LookingFor::Relationship | LookingFor::Marriage)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LookingFor::Relationship => "relationship",
            LookingFor::Casual => "casual",
            LookingFor::Marriage => "marriage",
            LookingFor::Friendship => "friendship",
        }
    }
}

impl FromStr for LookingFor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relationship" => Ok(LookingFor::Relationship),
            "casual" => Ok(LookingFor::Casual),
            "marriage" => Ok(LookingFor::Marriage),
            "friendship" => Ok(LookingFor::Friendship),
            other => Err(format!("unknown lookingFor value: {}", other)),
        }
    }
}

/// Searchable dating profile
///
/// Written by the profile management service; the engine only updates the
/// location, the activity counters and the blocklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub age: u8,
    pub gender: String,
    #[serde(rename = "interestedIn", default)]
    pub interested_in: BTreeSet<String>,
    #[serde(rename = "lookingFor")]
    pub looking_for: LookingFor,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(rename = "isSearchable", default = "default_true")]
    pub is_searchable: bool,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
    #[serde(rename = "blockedUsers", default)]
    pub blocked_users: BTreeSet<String>,
    #[serde(rename = "totalMatches", default)]
    pub total_matches: u32,
    #[serde(rename = "totalSwipes", default)]
    pub total_swipes: u32,
    #[serde(rename = "verificationScore", default)]
    pub verification_score: u8,
    #[serde(rename = "boostExpiresAt", default)]
    pub boost_expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "pushToken", default, skip_serializing)]
    pub push_token: Option<String>,
    #[serde(rename = "updatedAt", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool { true }

impl Profile {
    /// A boost only counts while its expiry lies in the future
    pub fn is_boosted(&self, now: DateTime<Utc>) -> bool {
        self.boost_expires_at.map_or(false, |expires| expires > now)
    }

    pub fn has_blocked(&self, user_id: &str) -> bool {
        self.blocked_users.contains(user_id)
    }

    /// Percentage (0-100) of the profile sections that are filled in
    pub fn completeness(&self) -> u8 {
        let checks = [
            !self.display_name.trim().is_empty(),
            self.bio.as_deref().map_or(false, |b| !b.trim().is_empty()),
            !self.interests.is_empty(),
            !self.photos.is_empty(),
            self.location.is_some(),
            !self.interested_in.is_empty(),
            self.verification_score > 0,
        ];
        let filled = checks.iter().filter(|c| **c).count();
        ((filled * 100) as f64 / checks.len() as f64).round() as u8
    }

    pub fn card(&self) -> ProfileCard {
        ProfileCard {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            age: self.age,
            gender: self.gender.clone(),
            bio: self.bio.clone(),
            interests: self.interests.iter().cloned().collect(),
            photos: self.photos.clone(),
            looking_for: self.looking_for,
            verification_score: self.verification_score,
        }
    }
}

/// Public subset of a profile shown to other users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCard {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub age: u8,
    pub gender: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub photos: Vec<String>,
    #[serde(rename = "lookingFor")]
    pub looking_for: LookingFor,
    #[serde(rename = "verificationScore")]
    pub verification_score: u8,
}

/// Direction of a swipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Dislike,
    Superlike,
}

impl SwipeAction {
    /// Likes and superlikes both count towards a match
    pub fn is_positive(self) -> bool {
        matches!(self, SwipeAction::Like | SwipeAction::Superlike)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwipeAction::Like => "like",
            SwipeAction::Dislike => "dislike",
            SwipeAction::Superlike => "superlike",
        }
    }
}

impl fmt::Display for SwipeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwipeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "like" => Ok(SwipeAction::Like),
            "dislike" => Ok(SwipeAction::Dislike),
            "superlike" => Ok(SwipeAction::Superlike),
            other => Err(format!("unknown swipe action: {}", other)),
        }
    }
}

/// Directed swipe edge, unique per (from, to)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swipe {
    pub id: Uuid,
    #[serde(rename = "fromUser")]
    pub from_user: String,
    #[serde(rename = "toUser")]
    pub to_user: String,
    pub action: SwipeAction,
    #[serde(rename = "isMatch")]
    pub is_match: bool,
    #[serde(rename = "matchDate")]
    pub match_date: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "swipedAt")]
    pub swiped_at: DateTime<Utc>,
}

/// Unordered user pair, normalized so `low <= high`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserPair {
    pub low: String,
    pub high: String,
}

impl UserPair {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self { low: a.to_string(), high: b.to_string() }
        } else {
            Self { low: b.to_string(), high: a.to_string() }
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The member that is not `user_id`, if `user_id` is a member
    pub fn other(&self, user_id: &str) -> Option<&str> {
        if self.low == user_id {
            Some(&self.high)
        } else if self.high == user_id {
            Some(&self.low)
        } else {
            None
        }
    }

    pub fn as_array(&self) -> [String; 2] {
        [self.low.clone(), self.high.clone()]
    }
}

/// Mutual-like relationship between two users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub users: UserPair,
    #[serde(rename = "conversationId")]
    pub conversation_id: Uuid,
    #[serde(rename = "matchedAt")]
    pub matched_at: DateTime<Utc>,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "unmatchedBy")]
    pub unmatched_by: Option<String>,
    #[serde(rename = "unmatchedAt")]
    pub unmatched_at: Option<DateTime<Utc>>,
    #[serde(rename = "blockedBy")]
    pub blocked_by: Option<String>,
    #[serde(rename = "blockReason")]
    pub block_reason: Option<String>,
    #[serde(rename = "lastMessagePreview")]
    pub last_message_preview: Option<String>,
    #[serde(rename = "lastMessageAt")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastMessageBy")]
    pub last_message_by: Option<String>,
    #[serde(rename = "messageCount")]
    pub message_count: u32,
    /// Unread message count per participant
    #[serde(default)]
    pub unread: BTreeMap<String, u32>,
}

impl Match {
    pub fn new(users: UserPair, conversation_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            users,
            conversation_id,
            matched_at: now,
            is_active: true,
            unmatched_by: None,
            unmatched_at: None,
            blocked_by: None,
            block_reason: None,
            last_message_preview: None,
            last_message_at: None,
            last_message_by: None,
            message_count: 0,
            unread: BTreeMap::new(),
        }
    }

    pub fn unread_for(&self, user_id: &str) -> u32 {
        self.unread.get(user_id).copied().unwrap_or(0)
    }
}

/// Conversation reference created alongside a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: UserPair,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(participants: UserPair, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            participants,
            is_active: true,
            created_at: now,
        }
    }
}

/// Per-component breakdown of a compatibility score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance: u8,
    pub age: u8,
    pub interests: u8,
    pub intent: u8,
    #[serde(rename = "genderPreference")]
    pub gender_preference: u8,
}

impl ScoreBreakdown {
    pub fn sum(&self) -> u32 {
        self.distance as u32
            + self.age as u32
            + self.interests as u32
            + self.intent as u32
            + self.gender_preference as u32
    }
}

/// Result of scoring one candidate against a requester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityScore {
    pub total: u8,
    #[serde(rename = "distanceKm")]
    pub distance_km: Option<f64>,
    pub breakdown: ScoreBreakdown,
    #[serde(rename = "sharedInterests")]
    pub shared_interests: Vec<String>,
}

/// Ranked discovery candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub profile: ProfileCard,
    #[serde(rename = "distanceKm")]
    pub distance_km: f64,
    #[serde(rename = "compatibilityScore")]
    pub compatibility_score: u8,
    pub breakdown: ScoreBreakdown,
    #[serde(rename = "sharedInterests")]
    pub shared_interests: Vec<String>,
    #[serde(rename = "isBoosted")]
    pub is_boosted: bool,
}

/// Discovery filters after defaults have been applied
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryFilters {
    pub age_min: u8,
    pub age_max: u8,
    pub max_distance_km: f64,
    pub page: u32,
    pub limit: u32,
    pub location: Option<GeoPoint>,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Radius query handed to the profile store
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub requester_id: String,
    pub center: GeoPoint,
    pub radius_km: f64,
    pub genders: Vec<String>,
    pub min_age: u8,
    pub max_age: u8,
    pub exclude_user_ids: Vec<String>,
    pub limit: usize,
}

/// Swipe and match counters for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeStats {
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
}
