use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::crypto;
use super::vapid::VapidKeys;
use crate::db::queries::subscriptions;

/// The transient message handed to the subscriber's notification renderer.
/// Produced here, consumed once on the client; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}

/// Result of a one-shot push submission. There is no retry or backoff:
/// a failure is surfaced immediately to the caller.
#[derive(Debug)]
pub enum SendOutcome {
    Delivered,
    /// The session never subscribed (or subscribed elsewhere); no delivery
    /// was attempted.
    NoSubscription,
    DeliveryFailed(String),
}

/// Submits messages to subscribers' push services, resolving delivery
/// addresses through the subscription registry and authenticating with the
/// application-server key pair.
///
/// Nothing here guards against two concurrent sends for one session; they
/// may race at the push service. Accepted as a known limitation.
pub struct PushDispatcher {
    db: SqlitePool,
    keys: VapidKeys,
    client: reqwest::Client,
    ttl_seconds: u32,
}

impl PushDispatcher {
    pub fn new(db: SqlitePool, keys: VapidKeys, ttl_seconds: u32) -> Self {
        Self {
            db,
            keys,
            client: reqwest::Client::new(),
            ttl_seconds,
        }
    }

    /// The public application-server key handed to subscribing clients.
    pub fn public_key(&self) -> &str {
        self.keys.public_key()
    }

    /// Resolve the session's subscription and submit `{title, body, url}`
    /// to its endpoint, encrypted with the stored subscriber keys. The
    /// registry is never mutated, even when the endpoint rejects us.
    pub async fn send(&self, session_id: &str, title: &str, body: &str, url: &str) -> SendOutcome {
        let row = match subscriptions::get_subscription(&self.db, session_id).await {
            Ok(Some(row)) => row,
            Ok(None) => return SendOutcome::NoSubscription,
            Err(e) => return SendOutcome::DeliveryFailed(format!("registry lookup failed: {e}")),
        };

        let payload = NotificationPayload {
            title: title.to_string(),
            body: body.to_string(),
            url: url.to_string(),
        };
        let serialized = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(e) => return SendOutcome::DeliveryFailed(format!("payload encoding failed: {e}")),
        };

        let encrypted = match crypto::encrypt(&row.p256dh, &row.auth, &serialized) {
            Ok(bytes) => bytes,
            Err(e) => return SendOutcome::DeliveryFailed(format!("encryption failed: {e}")),
        };

        let authorization = match self.keys.authorization_header(&row.endpoint) {
            Ok(header) => header,
            Err(e) => return SendOutcome::DeliveryFailed(e),
        };

        let response = self
            .client
            .post(&row.endpoint)
            .header("Authorization", authorization)
            .header("Content-Encoding", "aes128gcm")
            .header("TTL", self.ttl_seconds.to_string())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(encrypted)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!(%session_id, "push message delivered");
                SendOutcome::Delivered
            }
            Ok(resp) => {
                warn!(%session_id, status = %resp.status(), "push service rejected message");
                SendOutcome::DeliveryFailed(format!("push service returned {}", resp.status()))
            }
            Err(e) => {
                warn!(%session_id, error = %e, "push submission failed");
                SendOutcome::DeliveryFailed(format!("push request failed: {e}"))
            }
        }
    }
}
