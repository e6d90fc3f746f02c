//! Unauthenticated read-only projections
//!
//! - GET /public/presentation/{id}
//! - GET /public/course/{slug}
//!
//! Anything that cannot be shown is a plain 404.

use hyper::{Method, Response, StatusCode};
use std::sync::Arc;

use crate::routes::common::{
    blocking, json_response, method_not_allowed, respond, single_segment, BoxBody,
};
use crate::server::AppState;
use crate::services::{courses, presentations};

/// Route `/public/*`
pub async fn handle_public_request(
    method: &Method,
    path: &str,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    if let Some(rest) = path.strip_prefix("/public/presentation/") {
        let id = single_segment(rest)?.to_string();
        if method != Method::GET {
            return Some(method_not_allowed());
        }

        let store = Arc::clone(&state.store);
        let result = blocking(move || presentations::get_public_presentation(&store, &id))
            .await
            .map(|view| json_response(StatusCode::OK, &view));
        return Some(respond(result));
    }

    if let Some(rest) = path.strip_prefix("/public/course/") {
        let slug = single_segment(rest)?.to_string();
        if method != Method::GET {
            return Some(method_not_allowed());
        }

        let store = Arc::clone(&state.store);
        let result = blocking(move || courses::get_public_course(&store, &slug))
            .await
            .map(|view| json_response(StatusCode::OK, &view));
        return Some(respond(result));
    }

    None
}
