//! services/dashboard/src/adapters/token.rs
//!
//! Reads the claims of a backend-issued JWT without verifying it. Signature
//! verification stays with the backend; the dashboard only needs the user id
//! to parameterize "by user" listings.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracker_core::ports::{PortError, PortResult, TokenClaims, TokenDecoder};

#[derive(Debug, Default, Clone, Copy)]
pub struct JwtTokenDecoder;

const USER_ID_CLAIMS: [&str; 4] = ["userId", "user_id", "sub", "id"];
const NAME_CLAIMS: [&str; 3] = ["name", "firstName", "username"];

impl TokenDecoder for JwtTokenDecoder {
    fn decode(&self, token: &str) -> PortResult<TokenClaims> {
        let payload_segment = token
            .split('.')
            .nth(1)
            .ok_or_else(|| PortError::Invalid("Token is not a JWT".to_string()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload_segment.trim_end_matches('='))
            .map_err(|e| PortError::Invalid(format!("Token payload is not base64url: {}", e)))?;

        let payload: Map<String, Value> = serde_json::from_slice(&bytes)
            .map_err(|e| PortError::Invalid(format!("Token payload is not a JSON object: {}", e)))?;

        let user_id = USER_ID_CLAIMS
            .iter()
            .find_map(|claim| match payload.get(*claim) {
                Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| PortError::Invalid("Token carries no user id".to_string()))?;

        let display_name = NAME_CLAIMS.iter().find_map(|claim| {
            payload
                .get(*claim)
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        });

        let expires_at = payload
            .get("exp")
            .and_then(numeric_date)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        Ok(TokenClaims {
            user_id,
            display_name,
            expires_at,
        })
    }
}

// `exp` is a NumericDate, which may carry a fractional part.
fn numeric_date(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.is_finite())
            .map(|secs| secs.trunc() as i64)
    })
}
