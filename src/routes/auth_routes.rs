//! HTTP routes for authentication
//!
//! - POST /auth/register - create credentials
//! - POST /auth/login    - check credentials and set the session cookie
//! - POST /auth/logout   - tell the browser to drop the session cookie
//! - GET  /auth/me       - current user for the session
//!
//! Logout does not revoke the token server-side.

use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::info;

use crate::routes::common::{
    authenticate, blocking, json_response, method_not_allowed, parse_json_body, respond,
    with_cookie, BoxBody, SuccessResponse,
};
use crate::server::AppState;
use crate::services::accounts::{self, AuthResponse, Credentials};
use crate::types::LearnSpaceError;

/// Route `/auth/*`. Returns `None` for paths this module does not own.
pub async fn handle_auth_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/auth/register") => respond(handle_register(req, state).await),
        (&Method::POST, "/auth/login") => respond(handle_login(req, state).await),
        (&Method::POST, "/auth/logout") => respond(handle_logout(state)),
        (&Method::GET, "/auth/me") => respond(handle_me(req, state).await),

        (_, "/auth/register") | (_, "/auth/login") | (_, "/auth/logout") | (_, "/auth/me") => {
            method_not_allowed()
        }

        _ => return None,
    };

    Some(response)
}

/// POST /auth/register
async fn handle_register<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, LearnSpaceError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let credentials: Credentials = parse_json_body(req, state.args.max_body_bytes).await?;

    let store = Arc::clone(&state.store);
    let user = blocking(move || accounts::register(&store, &credentials)).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &AuthResponse {
            message: "User created".into(),
            user,
        },
    ))
}

/// POST /auth/login
async fn handle_login<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, LearnSpaceError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let credentials: Credentials = parse_json_body(req, state.args.max_body_bytes).await?;

    let store = Arc::clone(&state.store);
    let user = blocking(move || accounts::login(&store, &credentials)).await?;

    let token = state.tokens.issue(&user.id)?;
    let cookie = state.tokens.session_cookie(
        &token,
        state.args.cookie_secure,
        state.args.cookie_domain.as_deref(),
    );

    info!(user_id = %user.id, "User logged in");

    with_cookie(
        json_response(
            StatusCode::OK,
            &AuthResponse {
                message: "Logged in".into(),
                user,
            },
        ),
        &cookie,
    )
}

/// POST /auth/logout
fn handle_logout(state: Arc<AppState>) -> Result<Response<BoxBody>, LearnSpaceError> {
    let cookie = state
        .tokens
        .clearing_cookie(state.args.cookie_secure, state.args.cookie_domain.as_deref());

    with_cookie(
        json_response(
            StatusCode::OK,
            &SuccessResponse {
                success: true,
                message: "Logged out".into(),
            },
        ),
        &cookie,
    )
}

/// GET /auth/me
async fn handle_me<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, LearnSpaceError> {
    let user_id = authenticate(req.headers(), &state)?;

    let store = Arc::clone(&state.store);
    let user = blocking(move || accounts::current_user(&store, &user_id)).await?;

    Ok(json_response(StatusCode::OK, &user))
}
