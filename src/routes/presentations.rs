//! HTTP routes for presentations
//!
//! - GET    /presentation?courseId= - list for one course, or all of the caller's
//! - POST   /presentation           - create
//! - GET    /presentation/{id}      - read with resolved blocks
//! - PUT    /presentation/{id}      - partial update
//! - DELETE /presentation/{id}      - delete

use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::routes::common::{
    authenticate, blocking, json_response, method_not_allowed, no_content, parse_json_body,
    respond, single_segment, BoxBody,
};
use crate::server::AppState;
use crate::services::presentations::{
    self, CreatePresentationRequest, UpdatePresentationRequest,
};
use crate::types::LearnSpaceError;

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(rename = "courseId", alias = "course_id")]
    course_id: Option<String>,
}

/// Route `/presentation` and `/presentation/{id}`
pub async fn handle_presentation_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    if path == "/presentation" || path == "/presentation/" {
        let response = match method {
            Method::GET => respond(list(req, state).await),
            Method::POST => respond(create(req, state).await),
            _ => method_not_allowed(),
        };
        return Some(response);
    }

    let id = single_segment(path.strip_prefix("/presentation/")?)?.to_string();
    let response = match method {
        Method::GET => respond(get(req, state, id).await),
        Method::PUT => respond(update(req, state, id).await),
        Method::DELETE => respond(delete(req, state, id).await),
        _ => method_not_allowed(),
    };
    Some(response)
}

async fn list<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<BoxBody>, LearnSpaceError> {
    let user_id = authenticate(req.headers(), &state)?;

    let query: ListQuery = match req.uri().query() {
        Some(q) => serde_urlencoded::from_str(q)
            .map_err(|e| LearnSpaceError::invalid("courseId", e.to_string()))?,
        None => ListQuery::default(),
    };
    let course_id = query.course_id.filter(|id| !id.is_empty());

    let store = Arc::clone(&state.store);
    let list = blocking(move || {
        presentations::list_presentations(&store, &user_id, course_id.as_deref())
    })
    .await?;

    Ok(json_response(StatusCode::OK, &list))
}

async fn create<B>(req: Request<B>, state: Arc<AppState>) -> Result<Response<BoxBody>, LearnSpaceError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let user_id = authenticate(req.headers(), &state)?;
    let request: CreatePresentationRequest =
        parse_json_body(req, state.args.max_body_bytes).await?;

    let store = Arc::clone(&state.store);
    let presentation =
        blocking(move || presentations::create_presentation(&store, &user_id, request)).await?;

    Ok(json_response(StatusCode::CREATED, &presentation))
}

async fn get<B>(
    req: Request<B>,
    state: Arc<AppState>,
    id: String,
) -> Result<Response<BoxBody>, LearnSpaceError> {
    let user_id = authenticate(req.headers(), &state)?;

    let store = Arc::clone(&state.store);
    let detail = blocking(move || presentations::get_presentation(&store, &user_id, &id)).await?;

    Ok(json_response(StatusCode::OK, &detail))
}

async fn update<B>(
    req: Request<B>,
    state: Arc<AppState>,
    id: String,
) -> Result<Response<BoxBody>, LearnSpaceError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let user_id = authenticate(req.headers(), &state)?;
    let request: UpdatePresentationRequest =
        parse_json_body(req, state.args.max_body_bytes).await?;

    let store = Arc::clone(&state.store);
    let updated = blocking(move || {
        presentations::update_presentation(&store, &user_id, &id, request)
    })
    .await?;

    Ok(json_response(StatusCode::OK, &updated))
}

async fn delete<B>(
    req: Request<B>,
    state: Arc<AppState>,
    id: String,
) -> Result<Response<BoxBody>, LearnSpaceError> {
    let user_id = authenticate(req.headers(), &state)?;

    let store = Arc::clone(&state.store);
    blocking(move || presentations::delete_presentation(&store, &user_id, &id)).await?;

    Ok(no_content())
}
