//! Request and response interception
//!
//! Outgoing requests get the current bearer token attached, read from the
//! store at send time. Incoming outcomes are classified in priority order:
//! no response, server fault, refreshable 401, everything else.

use serde_json::Value;

use crate::client::{ApiRequest, RawResponse};
use crate::error::{DeskError, ErrorCode, Result};
use crate::store::TokenStore;

pub const LOGIN_PATH: &str = "/user/login";
pub const REFRESH_PATH: &str = "/refresh-token";
pub const LOGOUT_PATH: &str = "/user/logout";
pub const CHANGE_PASSWORD_PATH: &str = "/user/change-password";

/// What the pipeline does with an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 2xx; hand the response to the caller
    Deliver,
    /// No response was received
    NetworkUnreachable,
    ServerFault(u16),
    /// Expired credentials on a request that may still be replayed
    Refresh,
    /// 401 from an endpoint that cannot refresh
    Unauthorized,
    /// Any other failure; propagate unchanged
    Reject,
}

/// Login and refresh never carry a bearer token and never trigger a refresh.
pub fn is_exempt(endpoint: &str) -> bool {
    let path = endpoint.split('?').next().unwrap_or(endpoint);
    let path = path.trim_end_matches('/');
    path == LOGIN_PATH || path == REFRESH_PATH
}

pub fn attach_credentials(request: &mut ApiRequest, store: &TokenStore) {
    request.bearer = if is_exempt(&request.endpoint) {
        None
    } else {
        store.get()
    };
}

pub fn classify(request: &ApiRequest, outcome: &Result<RawResponse>) -> Disposition {
    let response = match outcome {
        Ok(response) => response,
        Err(e) if e.is_network_error() => return Disposition::NetworkUnreachable,
        Err(_) => return Disposition::Reject,
    };

    match response.status {
        200..=299 => Disposition::Deliver,
        status if status >= 500 => Disposition::ServerFault(status),
        401 if is_exempt(&request.endpoint) => Disposition::Unauthorized,
        401 if !request.retried => Disposition::Refresh,
        _ => Disposition::Reject,
    }
}

/// Build the caller-facing error for a non-2xx response.
///
/// The backend message and the raw body are kept so forms can show what the
/// backend said.
pub fn error_from_response(response: &RawResponse) -> DeskError {
    let body: Option<Value> = serde_json::from_str(&response.body).ok();
    let message = body
        .as_ref()
        .and_then(|b| {
            b.get("message")
                .or_else(|| b.get("error"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| default_message(response.status).to_string());

    let code = if response.status >= 500 {
        ErrorCode::ServerFault
    } else {
        ErrorCode::ApiError
    };

    DeskError::Api {
        code,
        status: response.status,
        message,
        body,
    }
}

fn default_message(status: u16) -> &'static str {
    match status {
        400 => "Bad request",
        401 => "Authentication required",
        403 => "Insufficient permissions",
        404 => "Not found",
        409 => "Conflict",
        422 => "Validation failed",
        429 => "Too many requests",
        s if s >= 500 => "Server error",
        _ => "Unknown API error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::test_helpers::{raw_response, unauthorized};
    use reqwest::Method;

    fn request(endpoint: &str) -> ApiRequest {
        ApiRequest::new(Method::GET, endpoint)
    }

    #[test]
    fn test_exempt_paths() {
        assert!(is_exempt("/user/login"));
        assert!(is_exempt("/refresh-token"));
        assert!(is_exempt("/refresh-token/"));
        assert!(is_exempt("/refresh-token?x=1"));
        assert!(!is_exempt("/user/logout"));
        assert!(!is_exempt("/faqs"));
    }

    #[test]
    fn test_attach_credentials_skips_exempt() {
        let store = TokenStore::in_memory();
        store.set("abc");

        let mut faq = request("/faqs");
        attach_credentials(&mut faq, &store);
        assert_eq!(faq.bearer.as_deref(), Some("abc"));

        let mut refresh = request(REFRESH_PATH);
        refresh.bearer = Some("stale".to_string());
        attach_credentials(&mut refresh, &store);
        assert_eq!(refresh.bearer, None);
    }

    #[test]
    fn test_classify_priority() {
        let faq = request("/faqs");

        let offline: Result<RawResponse> = Err(DeskError::unreachable("connection refused"));
        assert_eq!(classify(&faq, &offline), Disposition::NetworkUnreachable);

        assert_eq!(
            classify(&faq, &Ok(raw_response(503, "{}"))),
            Disposition::ServerFault(503)
        );
        assert_eq!(classify(&faq, &Ok(unauthorized())), Disposition::Refresh);
        assert_eq!(
            classify(&faq, &Ok(raw_response(200, "{}"))),
            Disposition::Deliver
        );
        assert_eq!(
            classify(&faq, &Ok(raw_response(422, "{}"))),
            Disposition::Reject
        );
    }

    #[test]
    fn test_classify_never_refreshes_twice_or_on_exempt() {
        let mut replayed = request("/faqs");
        replayed.retried = true;
        assert_eq!(classify(&replayed, &Ok(unauthorized())), Disposition::Reject);

        for path in [LOGIN_PATH, REFRESH_PATH] {
            assert_eq!(
                classify(&request(path), &Ok(unauthorized())),
                Disposition::Unauthorized
            );
        }
    }

    #[test]
    fn test_error_keeps_backend_message() {
        let err = error_from_response(&raw_response(
            400,
            r#"{"status":"fail","message":"Question already exists"}"#,
        ));
        match err {
            DeskError::Api {
                code,
                status,
                message,
                body,
            } => {
                assert_eq!(code, ErrorCode::ApiError);
                assert_eq!(status, 400);
                assert_eq!(message, "Question already exists");
                assert_eq!(body.unwrap()["status"], "fail");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let fault = error_from_response(&raw_response(500, "<html>oops</html>"));
        assert!(fault.is_server_fault());
        assert_eq!(fault.code(), ErrorCode::ServerFault);
    }
}
