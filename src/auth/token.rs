//! Stateless session tokens.
//!
//! Wire format: base64url (no padding) of `"<user_id>:<issued_at>:<tag>"`, where
//! `tag` is the lowercase hex HMAC-SHA-256 of `"<user_id>:<issued_at>"` under the
//! server secret. Nothing is persisted; a token is valid for as long as the
//! secret that signed it is in use (and younger than the max age, if one is set).

use std::sync::Arc;

use axum::extract::FromRef;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Decoded contents of a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: u64,
    pub issued_at: i64, // unix seconds
}

/// Signs `user_id` with the current time as issue time.
pub fn encode(user_id: u64, secret: &[u8]) -> String {
    encode_at(user_id, OffsetDateTime::now_utc().unix_timestamp(), secret)
}

pub fn encode_at(user_id: u64, issued_at: i64, secret: &[u8]) -> String {
    let payload = format!("{user_id}:{issued_at}");
    let tag = sign(payload.as_bytes(), secret);
    URL_SAFE_NO_PAD.encode(format!("{payload}:{tag}"))
}

/// Verifies the tag and returns the claims. Does not look at token age.
pub fn decode(token: &str, secret: &[u8]) -> Result<TokenClaims, TokenError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| TokenError::Malformed)?;

    let fields: Vec<&[u8]> = raw.split(|b| *b == b':').collect();
    let [user_id, issued_at, tag] = fields.as_slice() else {
        return Err(TokenError::Malformed);
    };

    let mut payload = Vec::with_capacity(user_id.len() + 1 + issued_at.len());
    payload.extend_from_slice(user_id);
    payload.push(b':');
    payload.extend_from_slice(issued_at);

    let expected = sign(&payload, secret);
    if !constant_time_eq(expected.as_bytes(), tag) {
        return Err(TokenError::BadSignature);
    }

    Ok(TokenClaims {
        user_id: parse_field(user_id)?,
        issued_at: parse_field(issued_at)?,
    })
}

fn sign(payload: &[u8], secret: &[u8]) -> String {
    // HMAC takes keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn parse_field<T: std::str::FromStr>(field: &[u8]) -> Result<T, TokenError> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(TokenError::Malformed)
}

/// Signing secret plus token policy, built once from config.
#[derive(Clone)]
pub struct TokenKeys {
    secret: Arc<[u8]>,
    max_age_secs: Option<i64>,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("secret", &"<redacted>")
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl TokenKeys {
    pub fn new(secret: &[u8], max_age_secs: Option<i64>) -> Self {
        Self {
            secret: Arc::from(secret),
            max_age_secs,
        }
    }

    pub fn issue(&self, user_id: u64) -> String {
        let token = encode(user_id, &self.secret);
        debug!(user_id, "token issued");
        token
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc().unix_timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
        let claims = decode(token, &self.secret)?;
        if let Some(max_age) = self.max_age_secs {
            if now.saturating_sub(claims.issued_at) > max_age {
                return Err(TokenError::Expired);
            }
        }
        debug!(user_id = claims.user_id, "token verified");
        Ok(claims)
    }
}
