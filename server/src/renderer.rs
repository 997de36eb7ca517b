//! Decision logic for the client-resident notification renderer: the
//! background listener that receives push events out-of-band and turns
//! them into a displayed notification and a click action.
//!
//! Everything here is a pure function of the event. The renderer runs
//! independently of any open page, so it must not rely on shared state
//! from a prior page session; the handler shipped to clients delegates
//! its decisions to these rules, which keeps them testable without a
//! live event source.

use serde::Deserialize;

pub const DEFAULT_TITLE: &str = "New Notification";
pub const DEFAULT_URL: &str = "/";

/// Action identifiers exposed on a rendered notification.
pub const ACTION_OPEN: &str = "open";
pub const ACTION_DISMISS: &str = "dismiss";

#[derive(Debug, Default, Deserialize)]
struct PayloadFields {
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
}

/// What a push event resolves to on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl NotificationContent {
    /// Resolve a raw push event body. Structured `{title, body, url}` JSON
    /// is used as-is with per-field defaults; anything unparsable falls
    /// back to the raw text as the body. Malformed payloads never surface
    /// as an error; the notification always renders.
    pub fn resolve(raw: &[u8]) -> Self {
        let fields = serde_json::from_slice::<PayloadFields>(raw).unwrap_or_else(|_| {
            PayloadFields {
                body: Some(String::from_utf8_lossy(raw).into_owned()),
                ..PayloadFields::default()
            }
        });

        Self {
            title: fields.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: fields.body.unwrap_or_default(),
            url: fields.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        }
    }
}

/// What a notification click resolves to. Either way the notification
/// itself is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Focus an existing client window, or open a new one, at this URL.
    Navigate(String),
    /// Close the notification and do nothing else.
    Dismiss,
}

/// Route a notification click. A click on "open", or a click with no
/// explicit action (the notification body itself), navigates to the
/// stored URL; "dismiss" only closes.
pub fn resolve_click(action: Option<&str>, url: &str) -> ClickOutcome {
    match action {
        Some(ACTION_DISMISS) => ClickOutcome::Dismiss,
        _ => ClickOutcome::Navigate(url.to_string()),
    }
}

/// Outcome of the notification-permission prompt. Declining is a plain
/// denied outcome with no persisted side effect, not an error.
pub fn permission_granted(status: &str) -> bool {
    status == "granted"
}
