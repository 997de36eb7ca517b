use sqlx::FromRow;

/// A stored push subscription: the delivery address and key material a
/// client registered for its session.
#[derive(Debug, Clone, FromRow)]
pub struct PushSubscriptionRow {
    pub session_id: String,
    /// Opaque push-service URL the message is submitted to.
    pub endpoint: String,
    /// Client public key (base64url, uncompressed P-256 point).
    pub p256dh: String,
    /// Client auth secret (base64url, 16 bytes).
    pub auth: String,
    pub created_at: String,
}
