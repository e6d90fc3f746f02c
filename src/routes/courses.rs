//! HTTP routes for courses and their documents
//!
//! - GET    /course      - caller's courses, newest first
//! - POST   /course      - create a course
//! - GET    /course/{id} - course, document and default selection
//! - PUT    /course/{id} - replace document and/or default selection
//! - DELETE /course/{id} - delete with blocks and presentations

use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use crate::routes::common::{
    authenticate, blocking, json_response, method_not_allowed, no_content, parse_json_body,
    respond, single_segment, BoxBody,
};
use crate::server::AppState;
use crate::services::courses::{self, CreateCourseRequest};
use crate::services::documents::{self, ReplaceDocumentRequest};
use crate::types::LearnSpaceError;

/// Route `/course` and `/course/{id}`
pub async fn handle_course_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if path == "/course" || path == "/course/" {
        let response = match method {
            Method::GET => respond(list(req, state).await),
            Method::POST => respond(create(req, state).await),
            _ => method_not_allowed(),
        };
        return Some(response);
    }

    let course_id = single_segment(path.strip_prefix("/course/")?)?.to_string();
    let response = match method {
        Method::GET => respond(get(req, state, course_id).await),
        Method::PUT => respond(replace(req, state, course_id).await),
        Method::DELETE => respond(delete(req, state, course_id).await),
        _ => method_not_allowed(),
    };
    Some(response)
}

async fn list<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<BoxBody>, LearnSpaceError> {
    let user_id = authenticate(req.headers(), &state)?;

    let store = Arc::clone(&state.store);
    let courses = blocking(move || courses::list_courses(&store, &user_id)).await?;

    Ok(json_response(StatusCode::OK, &courses))
}

async fn create<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<BoxBody>, LearnSpaceError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let user_id = authenticate(req.headers(), &state)?;
    let request: CreateCourseRequest = parse_json_body(req, state.args.max_body_bytes).await?;

    let store = Arc::clone(&state.store);
    let course = blocking(move || courses::create_course(&store, &user_id, &request)).await?;

    Ok(json_response(StatusCode::CREATED, &course))
}

async fn get<B>(
    req: Request<B>,
    state: Arc<AppState>,
    course_id: String,
) -> Result<Response<BoxBody>, LearnSpaceError> {
    let user_id = authenticate(req.headers(), &state)?;

    let store = Arc::clone(&state.store);
    let document =
        blocking(move || documents::get_document(&store, &course_id, &user_id)).await?;

    Ok(json_response(StatusCode::OK, &document))
}

async fn replace<B>(
    req: Request<B>,
    state: Arc<AppState>,
    course_id: String,
) -> Result<Response<BoxBody>, LearnSpaceError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let user_id = authenticate(req.headers(), &state)?;
    let request: ReplaceDocumentRequest = parse_json_body(req, state.args.max_body_bytes).await?;

    let store = Arc::clone(&state.store);
    let saved = blocking(move || {
        documents::replace_document(&store, &course_id, &user_id, request)
    })
    .await?;

    Ok(json_response(StatusCode::OK, &saved))
}

async fn delete<B>(
    req: Request<B>,
    state: Arc<AppState>,
    course_id: String,
) -> Result<Response<BoxBody>, LearnSpaceError> {
    let user_id = authenticate(req.headers(), &state)?;

    let store = Arc::clone(&state.store);
    blocking(move || courses::delete_course(&store, &user_id, &course_id)).await?;

    Ok(no_content())
}
