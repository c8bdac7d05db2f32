//! Response envelope used by every backend endpoint
//!
//! The backend wraps payloads as `{ "status": "success", "data": ... }`, but
//! collection endpoints often put the records under the plural entity name
//! instead (`{ "status": "success", "partners": [...] }`). Unknown members are
//! kept so callers can pick either shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_SUCCESS)
    }

    /// Payload stored under `data`, falling back to the named member.
    pub fn payload(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().or_else(|| self.rest.get(key))
    }

    /// Take the payload out of the envelope, preferring `data`.
    pub fn into_payload(mut self, key: &str) -> Option<Value> {
        self.data.take().or_else(|| self.rest.remove(key))
    }

    /// Total record count when the backend reports one.
    pub fn total(&self) -> Option<u64> {
        ["total", "results", "count"]
            .iter()
            .find_map(|k| self.rest.get(*k).and_then(Value::as_u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_prefers_data() {
        let env: Envelope = serde_json::from_value(json!({
            "status": "success",
            "data": {"id": 1},
            "faqs": []
        }))
        .unwrap();
        assert!(env.is_success());
        assert_eq!(env.payload("faqs"), Some(&json!({"id": 1})));
    }

    #[test]
    fn test_payload_falls_back_to_plural_key() {
        let env: Envelope = serde_json::from_value(json!({
            "status": "success",
            "results": 2,
            "partners": [{"id": 1}, {"id": 2}]
        }))
        .unwrap();
        assert_eq!(env.total(), Some(2));
        let items = env.into_payload("partners").unwrap();
        assert_eq!(items.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_failure_status() {
        let env: Envelope =
            serde_json::from_value(json!({"status": "fail", "message": "Email taken"})).unwrap();
        assert!(!env.is_success());
        assert_eq!(env.message.as_deref(), Some("Email taken"));
    }
}
