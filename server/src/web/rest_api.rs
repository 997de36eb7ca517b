use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::db::queries::subscriptions;
use crate::push::dispatcher::SendOutcome;

use super::app_state::AppState;

/// Subscription material as the client's push service hands it out:
/// the delivery endpoint plus the subscriber's encryption keys.
#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionInfo {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub session_id: String,
    pub subscription: SubscriptionInfo,
}

/// POST /api/push/subscribe — register (or replace) the session's push
/// subscription. Re-subscribing overwrites the previous record whole.
pub async fn subscribe_push(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubscribeRequest>,
) -> impl IntoResponse {
    match subscriptions::upsert_subscription(
        &state.db,
        &body.session_id,
        &body.subscription.endpoint,
        &body.subscription.keys.p256dh,
        &body.subscription.keys.auth,
    )
    .await
    {
        Ok(()) => {
            info!(session_id = %body.session_id, "push subscription stored");
            Json(json!({"success": true})).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to store push subscription");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub session_id: String,
    pub title: String,
    pub body: String,
    pub url: String,
}

/// POST /api/push/send — deliver a one-shot notification to the session's
/// subscription. 404 when the session never subscribed; delivery failures
/// return a generic 500 with the cause logged server-side.
pub async fn send_push(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendRequest>,
) -> impl IntoResponse {
    match state
        .dispatcher
        .send(&body.session_id, &body.title, &body.body, &body.url)
        .await
    {
        SendOutcome::Delivered => Json(json!({"success": true})).into_response(),
        SendOutcome::NoSubscription => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No subscription"})),
        )
            .into_response(),
        SendOutcome::DeliveryFailed(reason) => {
            error!(session_id = %body.session_id, error = %reason, "Push delivery failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Send failed"})),
            )
                .into_response()
        }
    }
}

/// GET /api/push/public-key — the application-server key clients need to
/// create a subscription.
pub async fn public_key(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({"public_key": state.dispatcher.public_key()}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::{create_pool, run_migrations};
    use crate::hub::presence_hub::PresenceHub;
    use crate::push::dispatcher::PushDispatcher;
    use crate::push::vapid::VapidKeys;
    use axum::body::to_bytes;

    async fn test_state() -> Arc<AppState> {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let (keys, _) = VapidKeys::generate("mailto:test@example.org".into()).unwrap();
        Arc::new(AppState {
            hub: Arc::new(PresenceHub::new()),
            db: pool.clone(),
            dispatcher: PushDispatcher::new(pool, keys, 60),
            public_url: "http://localhost:8080".into(),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_stores_row() {
        let state = test_state().await;
        let response = subscribe_push(
            State(state.clone()),
            Json(SubscribeRequest {
                session_id: "s1".into(),
                subscription: SubscriptionInfo {
                    endpoint: "https://push.example/send/abc".into(),
                    keys: SubscriptionKeys {
                        p256dh: "pubkey".into(),
                        auth: "secret".into(),
                    },
                },
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"success": true}));

        let row = subscriptions::get_subscription(&state.db, "s1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.endpoint, "https://push.example/send/abc");
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_previous_record() {
        let state = test_state().await;
        for endpoint in ["https://push.example/old", "https://push.example/new"] {
            let response = subscribe_push(
                State(state.clone()),
                Json(SubscribeRequest {
                    session_id: "s1".into(),
                    subscription: SubscriptionInfo {
                        endpoint: endpoint.into(),
                        keys: SubscriptionKeys {
                            p256dh: "pubkey".into(),
                            auth: "secret".into(),
                        },
                    },
                }),
            )
            .await
            .into_response();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let row = subscriptions::get_subscription(&state.db, "s1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.endpoint, "https://push.example/new");
    }

    #[tokio::test]
    async fn test_send_without_subscription_is_404() {
        let state = test_state().await;
        let response = send_push(
            State(state),
            Json(SendRequest {
                session_id: "nobody".into(),
                title: "Hi".into(),
                body: "There".into(),
                url: "/x".into(),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "No subscription"}));
    }

    #[tokio::test]
    async fn test_send_failure_is_generic_500() {
        let state = test_state().await;
        // Corrupt subscriber keys make encryption fail before any network call.
        subscriptions::upsert_subscription(&state.db, "s1", "https://push.example/x", "bad", "bad")
            .await
            .unwrap();

        let response = send_push(
            State(state),
            Json(SendRequest {
                session_id: "s1".into(),
                title: "Hi".into(),
                body: "There".into(),
                url: "/x".into(),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The detailed cause stays in the server log.
        assert_eq!(body_json(response).await, json!({"error": "Send failed"}));
    }

    #[tokio::test]
    async fn test_public_key_endpoint() {
        let state = test_state().await;
        let expected = state.dispatcher.public_key().to_string();
        let response = public_key(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"public_key": expected}));
    }
}
