use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Aggregated diagnostics for one probe run.
///
/// Built additively while the page runs: the observers append to `logs`,
/// `errors` and `network` as events arrive, and the scripted sequence fills
/// `firebase_init` and `chat_messages` once each. Nothing is ever removed or
/// rewritten. The record is serialized exactly once, at the end of the run,
/// whether or not the run succeeded.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Every console message the page printed, in arrival order.
    pub logs: Vec<String>,

    /// Stringified uncaught page errors, plus the run's own failure if the
    /// scripted sequence aborted.
    pub errors: Vec<String>,

    /// Failed requests and non-200 responses on Firebase-related URLs.
    pub network: Vec<NetworkEntry>,

    /// Snapshot of the app's Firebase debug globals, taken once after load.
    pub firebase_init: Option<InitSnapshot>,

    /// Chat state before the test send, widened with `afterSend` after it.
    pub chat_messages: Option<ChatSnapshot>,
}

impl Report {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the record as pretty-printed JSON, creating parent directories
    /// as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// One captured network anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NetworkEntry {
    /// The request never completed (DNS failure, refused connection, abort).
    Failed { url: String, error: String },

    /// A response arrived, but with a status other than 200.
    Response { url: String, status: i64 },
}

/// Result of the in-page Firebase init check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitSnapshot {
    /// The check ran; fields mirror the page's debug globals.
    State(FirebaseInit),

    /// The check itself threw inside the page.
    Error { error: String },
}

/// Firebase presence/initialization flags read from the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseInit {
    /// `window._firebase` exists.
    pub window_firebase: bool,

    /// The debug handle carries an `auth` service.
    pub has_auth: bool,

    /// The debug handle carries a `db` service.
    pub has_db: bool,

    pub auth_initialized: bool,

    pub db_initialized: bool,

    /// Whatever the app exposes as its auth-mode flag; not always a bool.
    #[serde(default)]
    pub use_firebase_auth: serde_json::Value,

    /// Length of the app's global message list.
    pub chat_messages_count: u64,
}

/// Chat state sampled from the page.
///
/// The initial sample keeps its fields after the send test; `after_send` is
/// added next to them rather than replacing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSnapshot {
    /// Messages in the app's global list at sample time.
    pub count: u64,

    /// First few raw message objects, exactly as the app stores them.
    pub messages: Vec<serde_json::Value>,

    /// Truncated innerHTML of the chat container.
    #[serde(rename = "chatWindowHTML")]
    pub chat_window_html: String,

    /// Final sample taken after the test send; absent when the run failed
    /// before reaching it.
    #[serde(
        rename = "afterSend",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub after_send: Option<AfterSend>,
}

/// Chat state after the test send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AfterSend {
    /// Message count after the send.
    pub messages: u64,

    /// Truncated innerHTML of the chat container.
    pub html: String,
}
