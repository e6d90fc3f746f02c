//! Typed HTTP client for the Learn Space API
//!
//! Holds the session token captured at login and sends it back as the `jwt`
//! cookie, the same way a browser would. Error bodies are mapped back onto
//! [`LearnSpaceError`] by status, so callers see the same variants the server
//! raised.

mod persist;

pub use persist::{CourseSelectionPersister, DocumentPersister, PresentationSelectionPersister};

use std::sync::RwLock;
use std::time::Duration;

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::{extract_token_from_cookie, SESSION_COOKIE};
use crate::db::{CourseRow, PresentationRow};
use crate::routes::{ErrorResponse, HealthResponse};
use crate::services::accounts::{AuthResponse, Credentials, PublicUser};
use crate::services::courses::{CreateCourseRequest, PublicCourse};
use crate::services::documents::{CourseDocument, DocumentSaved, ReplaceDocumentRequest};
use crate::services::presentations::{
    CreatePresentationRequest, PresentationDetail, PublicPresentation, UpdatePresentationRequest,
};
use crate::types::{FieldErrors, LearnSpaceError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session: RwLock<Option<String>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Client for the server at `base_url`, e.g. `http://127.0.0.1:8080`
    pub fn new(base_url: &str) -> Result<Self, LearnSpaceError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, LearnSpaceError> {
        let base = Url::parse(base_url)
            .map_err(|e| LearnSpaceError::Config(format!("Invalid base URL {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(LearnSpaceError::Config(format!(
                "Invalid base URL {}: not a base",
                base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("learnspace-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            session: RwLock::new(None),
        })
    }

    /// Token of the current session, if logged in
    pub fn session_token(&self) -> Option<String> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    /// Use an existing token, e.g. one restored from disk
    pub fn set_session_token(&self, token: Option<String>) -> Result<(), LearnSpaceError> {
        let mut session = self
            .session
            .write()
            .map_err(|e| LearnSpaceError::Internal(format!("Lock poisoned: {}", e)))?;
        *session = token;
        Ok(())
    }

    // ---- auth ----

    pub async fn register(&self, email: &str, password: &str) -> Result<PublicUser, LearnSpaceError> {
        let body = credentials(email, password);
        let response: AuthResponse = self.send_json(Method::POST, "/auth/register", &body).await?;
        Ok(response.user)
    }

    /// Log in and keep the session cookie for later requests
    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser, LearnSpaceError> {
        let response = self
            .request(Method::POST, "/auth/login")?
            .json(&credentials(email, password))
            .send()
            .await?;
        let response = check(response).await?;

        let token = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|v| extract_token_from_cookie(Some(v)).map(str::to_string))
            .ok_or_else(|| LearnSpaceError::Http("Login response carried no session cookie".into()))?;
        self.set_session_token(Some(token))?;

        let body: AuthResponse = response.json().await?;
        debug!(user_id = %body.user.id, "Logged in");
        Ok(body.user)
    }

    /// Ask the server to clear the cookie and forget the local token
    pub async fn logout(&self) -> Result<(), LearnSpaceError> {
        let result: Result<Value, _> = self.send_empty(Method::POST, "/auth/logout").await;
        self.set_session_token(None)?;
        result.map(|_| ())
    }

    pub async fn me(&self) -> Result<PublicUser, LearnSpaceError> {
        self.send_empty(Method::GET, "/auth/me").await
    }

    // ---- courses ----

    pub async fn create_course(
        &self,
        request: &CreateCourseRequest,
    ) -> Result<CourseRow, LearnSpaceError> {
        self.send_json(Method::POST, "/course", request).await
    }

    pub async fn list_courses(&self) -> Result<Vec<CourseRow>, LearnSpaceError> {
        self.send_empty(Method::GET, "/course").await
    }

    pub async fn get_course(&self, course_id: &str) -> Result<CourseDocument, LearnSpaceError> {
        self.send_empty(Method::GET, &format!("/course/{}", course_id)).await
    }

    pub async fn replace_document(
        &self,
        course_id: &str,
        request: &ReplaceDocumentRequest,
    ) -> Result<DocumentSaved, LearnSpaceError> {
        self.send_json(Method::PUT, &format!("/course/{}", course_id), request)
            .await
    }

    pub async fn save_document(
        &self,
        course_id: &str,
        document: Vec<Value>,
    ) -> Result<DocumentSaved, LearnSpaceError> {
        let request = ReplaceDocumentRequest {
            document: Some(document),
            default_selection: None,
        };
        self.replace_document(course_id, &request).await
    }

    pub async fn save_default_selection(
        &self,
        course_id: &str,
        block_ids: Vec<String>,
    ) -> Result<DocumentSaved, LearnSpaceError> {
        let request = ReplaceDocumentRequest {
            document: None,
            default_selection: Some(block_ids),
        };
        self.replace_document(course_id, &request).await
    }

    pub async fn delete_course(&self, course_id: &str) -> Result<(), LearnSpaceError> {
        self.send_no_content(Method::DELETE, &format!("/course/{}", course_id))
            .await
    }

    // ---- presentations ----

    /// Presentations of one course, or of all the caller's courses
    pub async fn list_presentations(
        &self,
        course_id: Option<&str>,
    ) -> Result<Vec<PresentationRow>, LearnSpaceError> {
        let mut builder = self.request(Method::GET, "/presentation")?;
        if let Some(course_id) = course_id {
            builder = builder.query(&[("courseId", course_id)]);
        }
        decode(builder.send().await?).await
    }

    pub async fn create_presentation(
        &self,
        request: &CreatePresentationRequest,
    ) -> Result<PresentationRow, LearnSpaceError> {
        self.send_json(Method::POST, "/presentation", request).await
    }

    pub async fn get_presentation(&self, id: &str) -> Result<PresentationDetail, LearnSpaceError> {
        self.send_empty(Method::GET, &format!("/presentation/{}", id)).await
    }

    pub async fn update_presentation(
        &self,
        id: &str,
        request: &UpdatePresentationRequest,
    ) -> Result<PresentationRow, LearnSpaceError> {
        self.send_json(Method::PUT, &format!("/presentation/{}", id), request)
            .await
    }

    pub async fn delete_presentation(&self, id: &str) -> Result<(), LearnSpaceError> {
        self.send_no_content(Method::DELETE, &format!("/presentation/{}", id))
            .await
    }

    // ---- public ----

    pub async fn public_presentation(&self, id: &str) -> Result<PublicPresentation, LearnSpaceError> {
        self.send_empty(Method::GET, &format!("/public/presentation/{}", id))
            .await
    }

    pub async fn public_course(&self, slug: &str) -> Result<PublicCourse, LearnSpaceError> {
        self.send_empty(Method::GET, &format!("/public/course/{}", slug))
            .await
    }

    pub async fn health(&self) -> Result<HealthResponse, LearnSpaceError> {
        self.send_empty(Method::GET, "/health").await
    }

    // ---- plumbing ----

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, LearnSpaceError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| LearnSpaceError::Internal(format!("Bad request path {}: {}", path, e)))?;

        let mut builder = self.http.request(method, url);
        if let Some(token) = self.session_token() {
            builder = builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, token));
        }
        Ok(builder)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, LearnSpaceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(method, path)?.json(body).send().await?;
        decode(response).await
    }

    async fn send_empty<T>(&self, method: Method, path: &str) -> Result<T, LearnSpaceError>
    where
        T: DeserializeOwned,
    {
        let response = self.request(method, path)?.send().await?;
        decode(response).await
    }

    async fn send_no_content(&self, method: Method, path: &str) -> Result<(), LearnSpaceError> {
        let response = self.request(method, path)?.send().await?;
        check(response).await.map(|_| ())
    }
}

fn credentials(email: &str, password: &str) -> Credentials {
    Credentials {
        email: email.to_string(),
        password: password.to_string(),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, LearnSpaceError> {
    Ok(check(response).await?.json().await?)
}

/// Pass success through, turn an error body back into a [`LearnSpaceError`]
async fn check(response: Response) -> Result<Response, LearnSpaceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorResponse>(&text).ok();
    Err(error_from_status(status, body, text))
}

fn error_from_status(status: StatusCode, body: Option<ErrorResponse>, raw: String) -> LearnSpaceError {
    let (message, fields) = match body {
        Some(body) => (body.error, body.fields),
        None if raw.is_empty() => (status.to_string(), None),
        None => (raw, None),
    };

    match status {
        StatusCode::BAD_REQUEST => match fields {
            Some(fields) if !fields.is_empty() => LearnSpaceError::Validation(fields),
            _ => LearnSpaceError::Validation(FieldErrors::single("request", message)),
        },
        StatusCode::UNAUTHORIZED => LearnSpaceError::Unauthenticated(message),
        StatusCode::FORBIDDEN => LearnSpaceError::Forbidden(message),
        StatusCode::NOT_FOUND => LearnSpaceError::NotFound(message),
        StatusCode::CONFLICT => LearnSpaceError::Conflict(message),
        _ => LearnSpaceError::Http(format!("{}: {}", status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(ApiClient::new("not a url").is_err());
        assert!(ApiClient::new("mailto:someone@example.com").is_err());
        assert!(ApiClient::new("http://127.0.0.1:8080").is_ok());
    }

    #[test]
    fn test_session_token_roundtrip() {
        let client = ApiClient::new("http://127.0.0.1:8080").unwrap();
        assert!(client.session_token().is_none());
        client.set_session_token(Some("abc".into())).unwrap();
        assert_eq!(client.session_token().as_deref(), Some("abc"));
        client.set_session_token(None).unwrap();
        assert!(client.session_token().is_none());
    }

    #[test]
    fn test_error_mapping() {
        let body = ErrorResponse {
            error: "Validation failed".into(),
            code: "VALIDATION_ERROR".into(),
            fields: Some(FieldErrors::single("title", "too short")),
        };
        match error_from_status(StatusCode::BAD_REQUEST, Some(body), String::new()) {
            LearnSpaceError::Validation(fields) => {
                assert_eq!(fields.iter().next().unwrap().field, "title")
            }
            other => panic!("unexpected {:?}", other),
        }

        let body = ErrorResponse {
            error: "Invalid JSON".into(),
            code: "BAD_REQUEST".into(),
            fields: None,
        };
        assert!(matches!(
            error_from_status(StatusCode::BAD_REQUEST, Some(body), String::new()),
            LearnSpaceError::Validation(_)
        ));

        assert!(matches!(
            error_from_status(StatusCode::FORBIDDEN, None, String::new()),
            LearnSpaceError::Forbidden(_)
        ));
        assert!(matches!(
            error_from_status(StatusCode::CONFLICT, None, "taken".into()),
            LearnSpaceError::Conflict(m) if m == "taken"
        ));
        assert!(matches!(
            error_from_status(StatusCode::BAD_GATEWAY, None, String::new()),
            LearnSpaceError::Http(_)
        ));
    }
}
