//! Test utilities and helpers for unit tests
//!
//! This module provides common testing utilities including:
//! - Temporary directories and files
//! - Fabricated access tokens
//! - Canned backend responses

#[cfg(test)]
pub mod test_helpers {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::Value;
    use std::path::PathBuf;
    use tempfile::TempDir;

    use crate::client::RawResponse;
    use crate::config::ClientConfig;

    /// Create a temporary directory for testing
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    /// Create a temporary file with content
    pub fn create_temp_file_with_content(dir: &TempDir, filename: &str, content: &[u8]) -> PathBuf {
        let file_path = dir.path().join(filename);
        std::fs::write(&file_path, content).expect("Failed to write temp file");
        file_path
    }

    /// Unsigned JWT expiring at `exp` (seconds since epoch)
    pub fn make_jwt(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"id":"u1","exp":{}}}"#, exp));
        format!("{}.{}.signature", header, payload)
    }

    /// Memory-only client configuration
    pub fn test_config() -> ClientConfig {
        ClientConfig {
            base_url: "http://localhost:5000/api/v1".to_string(),
            ..ClientConfig::default()
        }
    }

    pub fn raw_response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            authorization: None,
            body: body.to_string(),
        }
    }

    pub fn json_response(body: Value) -> RawResponse {
        raw_response(200, &body.to_string())
    }

    pub fn unauthorized() -> RawResponse {
        raw_response(401, r#"{"status":"fail","message":"jwt expired"}"#)
    }

    /// Successful response carrying `token` in the Authorization header
    pub fn token_response(token: &str) -> RawResponse {
        RawResponse {
            authorization: Some(format!("Bearer {}", token)),
            ..raw_response(200, r#"{"status":"success"}"#)
        }
    }
}
