use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the push gateway
#[derive(Debug, Error)]
pub enum PushError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Push gateway returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid push gateway key")]
    Unauthorized,
}

/// Notification addressed to one device token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: Value,
}

impl PushNotification {
    pub fn new_match(token: String, match_id: uuid::Uuid, counterpart_name: &str) -> Self {
        Self {
            token,
            title: "It's a match!".to_string(),
            body: format!("You and {} liked each other", counterpart_name),
            data: serde_json::json!({ "type": "match", "matchId": match_id }),
        }
    }

    pub fn new_message(token: String, match_id: uuid::Uuid, sender_name: &str, preview: &str) -> Self {
        Self {
            token,
            title: sender_name.to_string(),
            body: preview.to_string(),
            data: serde_json::json!({ "type": "message", "matchId": match_id }),
        }
    }
}

/// Dispatches push notifications
pub trait Notifier: Send + Sync + 'static {
    fn send(&self, notification: PushNotification) -> impl Future<Output = Result<(), PushError>> + Send;
}

/// HTTP client for the push gateway
///
/// Posts `{title, body, data}` to `{endpoint}/devices/{token}/notifications`.
/// Without an endpoint the client only logs, which is the setup for local runs.
pub struct PushClient {
    endpoint: Option<String>,
    api_key: Option<String>,
    client: Client,
}

impl PushClient {
    pub fn new(
        endpoint: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint,
            api_key,
            client,
        })
    }

    pub fn disabled() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            client: Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    fn notification_url(&self, endpoint: &str, token: &str) -> String {
        format!(
            "{}/devices/{}/notifications",
            endpoint.trim_end_matches('/'),
            urlencoding::encode(token)
        )
    }
}

impl Notifier for PushClient {
    async fn send(&self, notification: PushNotification) -> Result<(), PushError> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            tracing::debug!("Push disabled, dropping notification: {}", notification.title);
            return Ok(());
        };

        let url = self.notification_url(endpoint, &notification.token);
        let mut request = self.client.post(&url).json(&serde_json::json!({
            "title": notification.title,
            "body": notification.body,
            "data": notification.data,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PushError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(PushError::ApiError(format!("{} - {}", status, body)));
        }

        tracing::debug!("Push notification delivered: {}", notification.title);
        Ok(())
    }
}
