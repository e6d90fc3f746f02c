//! Session token issuing and verification
//!
//! Tokens are HS256-signed JWTs carrying `{userId, iat, exp}`. They travel in
//! an http-only, same-site cookie named [`SESSION_COOKIE`]; API clients may
//! send the same token as `Authorization: Bearer <token>`.
//!
//! Revocation is client-side only: logout tells the browser to drop the
//! cookie, the token itself stays valid until it expires. A copied token is
//! usable for the full session lifetime.

use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{MAX_SESSION_MAX_AGE_SECS, MIN_SECRET_LEN};
use crate::types::LearnSpaceError;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "jwt";

/// Payload stored in the session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user id
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Expired,
    BadSignature,
    Malformed,
}

/// Outcome of verifying an untrusted token. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerdict {
    Valid(Claims),
    Invalid(TokenRejection),
}

impl TokenVerdict {
    /// The verified user id, if any
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Valid(claims) => Some(&claims.user_id),
            Self::Invalid(_) => None,
        }
    }

    pub fn into_claims(self) -> Option<Claims> {
        match self {
            Self::Valid(claims) => Some(claims),
            Self::Invalid(_) => None,
        }
    }
}

/// Session token issuer and verifier
#[derive(Clone)]
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    max_age_secs: u64,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}

impl SessionTokens {
    /// Create a token service
    ///
    /// Returns an error if the secret is empty or too short, or the lifetime
    /// is zero or longer than [`MAX_SESSION_MAX_AGE_SECS`]
    pub fn new(secret: &str, max_age_secs: u64) -> Result<Self, LearnSpaceError> {
        if secret.is_empty() {
            return Err(LearnSpaceError::Config("JWT_SECRET must not be empty".into()));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(LearnSpaceError::Config(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        if max_age_secs == 0 || max_age_secs > MAX_SESSION_MAX_AGE_SECS {
            return Err(LearnSpaceError::Config(format!(
                "Session lifetime must be between 1 and {} seconds",
                MAX_SESSION_MAX_AGE_SECS
            )));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            max_age_secs,
        })
    }

    /// Session lifetime in seconds
    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    /// Issue a token for a user, valid for the configured lifetime
    pub fn issue(&self, user_id: &str) -> Result<String, LearnSpaceError> {
        self.issue_at(user_id, unix_now()?)
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, user_id: &str, now: u64) -> Result<String, LearnSpaceError> {
        let exp = now
            .checked_add(self.max_age_secs)
            .ok_or_else(|| LearnSpaceError::Auth("Token expiry overflows".into()))?;
        let claims = Claims {
            user_id: user_id.to_string(),
            iat: now,
            exp,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| LearnSpaceError::Auth(format!("Failed to generate token: {}", e)))
    }

    /// Verify an untrusted token.
    ///
    /// Expiry is checked against the wall clock with zero leeway.
    pub fn verify(&self, token: &str) -> TokenVerdict {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) if data.claims.user_id.is_empty() => {
                TokenVerdict::Invalid(TokenRejection::Malformed)
            }
            Ok(data) => TokenVerdict::Valid(data.claims),
            Err(err) => TokenVerdict::Invalid(match err.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                _ => TokenRejection::Malformed,
            }),
        }
    }

    /// Set-Cookie value that stores a freshly issued token
    pub fn session_cookie(&self, token: &str, secure: bool, domain: Option<&str>) -> String {
        build_cookie(token, self.max_age_secs, secure, domain)
    }

    /// Set-Cookie value that tells the browser to discard the session
    pub fn clearing_cookie(&self, secure: bool, domain: Option<&str>) -> String {
        build_cookie("", 0, secure, domain)
    }
}

fn build_cookie(value: &str, max_age: u64, secure: bool, domain: Option<&str>) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    if let Some(domain) = domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    cookie
}

fn unix_now() -> Result<u64, LearnSpaceError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| LearnSpaceError::Auth(format!("System time error: {}", e)))
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

/// Extract the session token from a Cookie header
pub fn extract_token_from_cookie(cookie_header: Option<&str>) -> Option<&str> {
    cookie_header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
