//! Shared helpers for route handlers: JSON bodies, error rendering, sessions

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::auth::{extract_token_from_cookie, extract_token_from_header, TokenVerdict};
use crate::server::AppState;
use crate::types::{FieldErrors, LearnSpaceError};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Error body for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    full_body(Bytes::new())
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(full_body(json));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn no_content() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

/// Render an error, logging server failures with their detail
pub fn error_response(err: LearnSpaceError) -> Response<BoxBody> {
    let status = err.status_code();
    if err.is_server_error() {
        error!(code = err.code(), "Request failed: {}", err);
    } else {
        warn!(code = err.code(), status = status.as_u16(), "Request rejected: {}", err);
    }

    let fields = match &err {
        LearnSpaceError::Validation(fields) => Some(fields.clone()),
        _ => None,
    };

    json_response(
        status,
        &ErrorResponse {
            error: err.public_message(),
            code: err.code().to_string(),
            fields,
        },
    )
}

/// Collapse a handler result into a response
pub fn respond(result: Result<Response<BoxBody>, LearnSpaceError>) -> Response<BoxBody> {
    result.unwrap_or_else(error_response)
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorResponse {
            error: format!("No route for {}", path),
            code: "NOT_FOUND".into(),
            fields: None,
        },
    )
}

pub fn method_not_allowed() -> Response<BoxBody> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorResponse {
            error: "Method not allowed".into(),
            code: "METHOD_NOT_ALLOWED".into(),
            fields: None,
        },
    )
}

/// Attach a Set-Cookie header
pub fn with_cookie(
    mut response: Response<BoxBody>,
    cookie: &str,
) -> Result<Response<BoxBody>, LearnSpaceError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| LearnSpaceError::Internal(format!("Invalid cookie header: {}", e)))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(response)
}

/// Read and parse a JSON body, refusing anything over `limit` bytes
pub async fn parse_json_body<T, B>(req: Request<B>, limit: usize) -> Result<T, LearnSpaceError>
where
    T: for<'de> Deserialize<'de>,
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body = Limited::new(req.into_body(), limit)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<http_body_util::LengthLimitError>() {
                LearnSpaceError::Http("Request body too large".into())
            } else {
                LearnSpaceError::Http(format!("Failed to read body: {}", e))
            }
        })?;

    serde_json::from_slice(&body.to_bytes())
        .map_err(|e| LearnSpaceError::Http(format!("Invalid JSON: {}", e)))
}

/// Resolve the session user from the `jwt` cookie, or a bearer token.
///
/// Any missing, malformed or expired token is simply "no identity".
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<String, LearnSpaceError> {
    let cookie = headers.get(COOKIE).and_then(|v| v.to_str().ok());
    let bearer = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    let token = extract_token_from_cookie(cookie)
        .or_else(|| extract_token_from_header(bearer))
        .ok_or_else(|| LearnSpaceError::Unauthenticated("Not signed in".into()))?;

    match state.tokens.verify(token) {
        TokenVerdict::Valid(claims) => Ok(claims.user_id),
        TokenVerdict::Invalid(reason) => {
            tracing::debug!(?reason, "Rejected session token");
            Err(LearnSpaceError::Unauthenticated(
                "Session is invalid or expired".into(),
            ))
        }
    }
}

/// `rest` if it is exactly one non-empty path segment
pub fn single_segment(rest: &str) -> Option<&str> {
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

/// Run blocking store work (password hashing, SQLite) off the async workers
pub async fn blocking<F, T>(f: F) -> Result<T, LearnSpaceError>
where
    F: FnOnce() -> Result<T, LearnSpaceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LearnSpaceError::Internal(format!("Blocking task failed: {}", e)))?
}
