use serde::{Deserialize, Serialize};
use validator::Validate;

/// Query string of `GET /discover`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DiscoverQuery {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1))]
    pub limit: Option<u32>,
    #[serde(rename = "maxDistance")]
    pub max_distance: Option<f64>,
    #[serde(rename = "ageMin")]
    pub age_min: Option<u8>,
    #[serde(rename = "ageMax")]
    pub age_max: Option<u8>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

/// Body of `POST /discover/refresh`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshLocationRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

/// Body of `POST /swipe/{targetId}`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SwipeRequest {
    #[validate(length(min = 1))]
    pub action: String,
}

/// Shared `page`/`limit` query string
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1))]
    pub limit: Option<u32>,
}

/// Body of `POST /matches/{matchId}/block`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct BlockRequest {
    #[validate(length(max = 500))]
    #[serde(default)]
    pub reason: Option<String>,
}

/// Body of `POST /matches/{matchId}/messages`, sent by the messaging service
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MessageActivityRequest {
    #[validate(length(min = 1, max = 280))]
    pub preview: String,
}
