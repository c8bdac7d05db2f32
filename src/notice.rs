//! User-facing notices raised by the HTTP pipeline
//!
//! Repeated identical failures (a dead network, a crashing backend) would
//! otherwise produce one notice per request. Notices carry a key and a key is
//! shown at most once per window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const NETWORK_ERROR_KEY: &str = "network-error";
pub const SERVER_ERROR_KEY: &str = "server-error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub key: String,
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn network_unreachable() -> Self {
        Self {
            key: NETWORK_ERROR_KEY.to_string(),
            level: NoticeLevel::Warning,
            message: "Unable to reach the server. Check your connection and try again."
                .to_string(),
        }
    }

    pub fn server_fault(status: u16) -> Self {
        Self {
            key: SERVER_ERROR_KEY.to_string(),
            level: NoticeLevel::Error,
            message: format!(
                "The server failed to handle the request (HTTP {}). Please try again later.",
                status
            ),
        }
    }
}

/// Callback type for notice delivery.
pub type NoticeCallback = Box<dyn Fn(&Notice) + Send + Sync>;

pub struct Notifier {
    window: Duration,
    shown: Mutex<HashMap<String, Instant>>,
    sink: Mutex<Option<NoticeCallback>>,
}

impl Notifier {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            shown: Mutex::new(HashMap::new()),
            sink: Mutex::new(None),
        }
    }

    pub fn set_callback(&self, callback: NoticeCallback) {
        let mut sink = self.sink.lock().unwrap_or_else(|p| p.into_inner());
        *sink = Some(callback);
    }

    /// Deliver `notice` unless its key was delivered within the window.
    ///
    /// Returns whether the notice was delivered.
    pub fn notify(&self, notice: Notice) -> bool {
        let now = Instant::now();
        {
            let mut shown = self.shown.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(last) = shown.get(&notice.key) {
                if now.duration_since(*last) < self.window {
                    tracing::debug!(key = %notice.key, "Suppressed duplicate notice");
                    return false;
                }
            }
            shown.insert(notice.key.clone(), now);
        }

        match notice.level {
            NoticeLevel::Warning => tracing::warn!(key = %notice.key, "{}", notice.message),
            NoticeLevel::Error => tracing::error!(key = %notice.key, "{}", notice.message),
        }

        let sink = self.sink.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(callback) = sink.as_ref() {
            callback(&notice);
        }
        true
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
