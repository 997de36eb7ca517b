use std::sync::Arc;

use sqlx::SqlitePool;

use crate::hub::presence_hub::PresenceHub;
use crate::push::dispatcher::PushDispatcher;

/// Shared state for all web handlers.
pub struct AppState {
    pub hub: Arc<PresenceHub>,
    pub db: SqlitePool,
    pub dispatcher: PushDispatcher,
    pub public_url: String,
}
