//! Swipe Engine - discovery and matching service for the Lume dating app
//!
//! Ranks nearby candidates by compatibility, records swipes, and turns mutual
//! likes into exactly one match and conversation per pair, even when both
//! users swipe at the same moment.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    calculate_compatibility, haversine_distance, DiscoveryRanker, MatchManager, SwipeLedger,
};
pub use error::EngineError;
pub use models::{Match, Profile, Swipe, SwipeAction, UserPair};
pub use routes::{configure_routes, AppState, TokenVerifier};
pub use services::{MemoryStore, Notifier, PostgresStore, PushClient, Store};
