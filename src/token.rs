//! Access token inspection

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};

use sitedesk_protocol::Claims;

use crate::error::{DeskError, Result};

/// Decode the payload segment of a JWT without verifying it.
///
/// The console only needs the expiry to plan a refresh; the backend remains
/// the authority on whether the token is valid.
pub fn decode_claims(token: &str) -> Result<Claims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => return Err(DeskError::invalid_input("Access token is not a JWT")),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DeskError::invalid_input(format!("Token payload is not base64url: {}", e)))?;

    Ok(serde_json::from_slice(&bytes)?)
}

pub fn expires_at(claims: &Claims) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(claims.exp, 0).single()
}
