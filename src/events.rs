//! Session lifecycle events
//!
//! The session layer never navigates anywhere itself. It reports what
//! happened and the host decides what to show (the CLI prints a hint to log
//! in again).

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Why a session ended without the user asking for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    /// The refresh endpoint refused to issue a new token
    RefreshFailed,
    /// The backend rejected credentials on an endpoint that cannot refresh
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { role: String, first_time_login: bool },
    Refreshed,
    Invalidated { reason: InvalidationReason },
    LoggedOut,
}

/// Callback type for session event notifications.
pub type SessionCallback = Box<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
pub struct SessionEvents {
    callback: Mutex<Option<SessionCallback>>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: SessionCallback) {
        let mut cb = self.callback.lock().unwrap_or_else(|p| p.into_inner());
        *cb = Some(callback);
    }

    pub fn emit(&self, event: SessionEvent) {
        tracing::debug!(event = ?event, "Session event");
        let cb = self.callback.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(callback) = cb.as_ref() {
            callback(&event);
        }
    }
}

impl std::fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEvents").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_subscriber_receives_events_in_order() {
        let events = SessionEvents::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        events.subscribe(Box::new(move |event| {
            seen_clone.lock().unwrap().push(event.clone());
        }));

        events.emit(SessionEvent::Refreshed);
        events.emit(SessionEvent::Invalidated {
            reason: InvalidationReason::RefreshFailed,
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], SessionEvent::Refreshed);
    }

    #[test]
    fn test_emit_without_subscriber_is_noop() {
        SessionEvents::new().emit(SessionEvent::LoggedOut);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(SessionEvent::Invalidated {
            reason: InvalidationReason::Unauthorized,
        })
        .unwrap();
        assert_eq!(json["event"], "invalidated");
        assert_eq!(json["reason"], "unauthorized");
    }
}
