use sqlx::SqlitePool;

use crate::db::models::PushSubscriptionRow;

/// Upsert a session's push subscription. Last write wins: a re-subscribe
/// replaces the endpoint and both keys in a single atomic statement.
pub async fn upsert_subscription(
    pool: &SqlitePool,
    session_id: &str,
    endpoint: &str,
    p256dh: &str,
    auth: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO push_subscriptions (session_id, endpoint, p256dh, auth, created_at) \
         VALUES (?, ?, ?, ?, datetime('now')) \
         ON CONFLICT(session_id) DO UPDATE SET endpoint = excluded.endpoint, \
         p256dh = excluded.p256dh, auth = excluded.auth, \
         created_at = datetime('now')",
    )
    .bind(session_id)
    .bind(endpoint)
    .bind(p256dh)
    .bind(auth)
    .execute(pool)
    .await?;
    Ok(())
}

/// Get a session's subscription. Returns None when the session never subscribed.
pub async fn get_subscription(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Option<PushSubscriptionRow>, sqlx::Error> {
    sqlx::query_as::<_, PushSubscriptionRow>(
        "SELECT session_id, endpoint, p256dh, auth, created_at \
         FROM push_subscriptions WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}
