//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one tracked task per connection. Routing is a
//! chain of prefix handlers, each returning `None` for paths it does not own.

use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::auth::SessionTokens;
use crate::config::Args;
use crate::db::Store;
use crate::routes::{self, common::not_found_response, BoxBody};
use crate::types::LearnSpaceError;

/// How long shutdown waits for open connections
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Opened by the caller, closed by the caller after the server stops
    pub store: Arc<Store>,
    pub tokens: SessionTokens,
    pub started_at: Instant,
}

impl AppState {
    /// Build state from configuration and an open store
    pub fn new(args: Args, store: Arc<Store>) -> Result<Self, LearnSpaceError> {
        let secret = args
            .jwt_secret()
            .ok_or_else(|| LearnSpaceError::Config("JWT_SECRET is required".into()))?;
        let tokens = SessionTokens::new(&secret, args.session_max_age_secs)?;

        Ok(Self {
            args,
            store,
            tokens,
            started_at: Instant::now(),
        })
    }
}

/// Start the HTTP server on the configured address and run until Ctrl-C
pub async fn run(state: Arc<AppState>) -> Result<(), LearnSpaceError> {
    let listener = TcpListener::bind(state.args.listen).await?;
    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// Returns after open connections have finished their in-flight requests,
/// or after [`DRAIN_TIMEOUT`], whichever comes first.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), LearnSpaceError>
where
    F: Future<Output = ()>,
{
    info!("Learn Space listening on {}", listener.local_addr()?);

    let (drain_tx, drain_rx) = watch::channel(false);
    let mut connections = JoinSet::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    connections.spawn(serve_connection(
                        stream,
                        addr,
                        Arc::clone(&state),
                        drain_rx.clone(),
                    ));
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    error!("Connection task failed: {}", e);
                }
            }
        }
    }

    drop(listener);
    let _ = drain_tx.send(true);

    if !connections.is_empty() {
        info!("Draining {} open connections", connections.len());
    }
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!("Connection task failed: {}", e);
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            "Dropping {} connections still open after {:?}",
            connections.len(),
            DRAIN_TIMEOUT
        );
        connections.shutdown().await;
    }

    Ok(())
}

/// Serve one connection. When `drain` flips, keep-alive is switched off so the
/// current request completes and the connection then closes.
async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<AppState>,
    mut drain: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { handle_request(state, addr, req).await }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = async { let _ = drain.wait_for(|draining| *draining).await; } => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(err) = result {
        debug!("Error serving connection from {}: {:?}", addr, err);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Log and route one incoming request
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());
    Ok(route(req, state).await)
}

/// Dispatch a request to its handler
pub async fn route<B>(req: Request<B>, state: Arc<AppState>) -> Response<BoxBody>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if path.starts_with("/auth/") {
        return routes::handle_auth_request(req, state)
            .await
            .unwrap_or_else(|| not_found_response(&path));
    }

    if path == "/course" || path.starts_with("/course/") {
        return routes::handle_course_request(req, state)
            .await
            .unwrap_or_else(|| not_found_response(&path));
    }

    if path == "/presentation" || path.starts_with("/presentation/") {
        return routes::handle_presentation_request(req, state)
            .await
            .unwrap_or_else(|| not_found_response(&path));
    }

    if path.starts_with("/public/") {
        return routes::handle_public_request(&method, &path, state)
            .await
            .unwrap_or_else(|| not_found_response(&path));
    }

    match (method, path.as_str()) {
        (Method::GET, "/health") => routes::health_check(state),
        _ => not_found_response(&path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper::StatusCode;

    fn state() -> Arc<AppState> {
        let args = <Args as clap::Parser>::try_parse_from([
            "learnspace",
            "--jwt-secret",
            "router-test-secret-that-is-long-enough",
        ])
        .unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        Arc::new(AppState::new(args, store).unwrap())
    }

    fn request(method: Method, uri: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(response: Response<BoxBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = route(request(Method::GET, "/health", ""), state()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["healthy"], true);
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = route(request(Method::GET, "/nope", ""), state()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = route(request(Method::GET, "/course/a/b", ""), state()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_private_routes_require_session() {
        let state = state();
        for (method, uri) in [
            (Method::GET, "/course"),
            (Method::GET, "/course/abc"),
            (Method::PUT, "/course/abc"),
            (Method::GET, "/presentation"),
            (Method::DELETE, "/presentation/abc"),
            (Method::GET, "/auth/me"),
        ] {
            let response = route(request(method, uri, "{}"), Arc::clone(&state)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(body_json(response).await["code"], "UNAUTHENTICATED");
        }
    }

    #[tokio::test]
    async fn test_garbage_cookie_is_unauthenticated() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/course")
            .header("cookie", "jwt=not.a.token")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = route(req, state()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let response = route(request(Method::PATCH, "/course", ""), state()).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = route(request(Method::GET, "/auth/login", ""), state()).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_opens_session() {
        let state = state();
        let credentials = r#"{"email":"ada@example.com","password":"secret1"}"#;

        let response = route(
            request(Method::POST, "/auth/register", credentials),
            Arc::clone(&state),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = route(
            request(Method::POST, "/auth/login", credentials),
            Arc::clone(&state),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("jwt="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=2592000"));
        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "ada@example.com");

        let session = cookie.split(';').next().unwrap().to_string();
        let req = Request::builder()
            .method(Method::GET)
            .uri("/auth/me")
            .header("cookie", session)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = route(req, Arc::clone(&state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["email"], "ada@example.com");

        let response = route(
            request(Method::POST, "/auth/login", r#"{"email":"ada@example.com","password":"nope!!"}"#),
            state,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_shutdown_finishes_in_flight_request() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let state = state();
        let store = Arc::clone(&state.store);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let mut server = tokio::spawn(serve(listener, state, async {
            let _ = stop_rx.await;
        }));

        // Headers plus half the body, so the request is mid-flight
        let body = r#"{"email":"late@example.com","password":"secret1"}"#;
        let (head, tail) = body.split_at(10);
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                format!(
                    "POST /auth/register HTTP/1.1\r\nhost: {addr}\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{head}",
                    body.len()
                )
                .as_bytes(),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        stop_tx.send(()).unwrap();
        let early = tokio::time::timeout(Duration::from_millis(200), &mut server).await;
        assert!(early.is_err(), "serve returned with a request still open");

        stream.write_all(tail.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 201"), "{}", response);

        server.await.unwrap().unwrap();

        // The write landed before the store could be closed
        assert_eq!(store.stats().unwrap().users, 1);
        store.close().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, state(), async {
            let _ = stop_rx.await;
        }));

        // reqwest keeps the connection alive in its pool
        let client = reqwest::Client::new();
        let status = client.get(format!("{base}/health")).send().await.unwrap().status();
        assert_eq!(status, StatusCode::OK);

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("idle keep-alive connection held up shutdown")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_validation_errors_carry_fields() {
        let response = route(
            request(Method::POST, "/auth/register", r#"{"email":"bad","password":"1"}"#),
            state(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["fields"][0]["field"], "email");
        assert_eq!(body["fields"][1]["field"], "password");
    }
}
