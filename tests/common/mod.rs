//! In-process server harness for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use clap::Parser;
use learnspace::{serve, AppState, ApiClient, Args, Store};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const SECRET: &str = "integration-test-secret-at-least-32-chars";

pub struct TestServer {
    pub base_url: String,
    pub store: Arc<Store>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_store(Store::open_in_memory().expect("in-memory store")).await
    }

    pub async fn with_store(store: Store) -> Self {
        let args = Args::try_parse_from(["learnspace", "--jwt-secret", SECRET, "--listen", "127.0.0.1:0"])
            .expect("args");
        let store = Arc::new(store);
        let state = Arc::new(AppState::new(args, Arc::clone(&store)).expect("state"));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            serve(listener, state, shutdown).await.expect("serve");
        });

        Self {
            base_url: format!("http://{}", addr),
            store,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn client(&self) -> Arc<ApiClient> {
        Arc::new(ApiClient::new(&self.base_url).expect("client"))
    }

    /// Client registered and logged in as `email`
    pub async fn signed_in(&self, email: &str) -> Arc<ApiClient> {
        let client = self.client();
        client.register(email, "password1").await.expect("register");
        client.login(email, "password1").await.expect("login");
        client
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

pub fn block(id: &str, text: &str) -> serde_json::Value {
    serde_json::json!({ "id": id, "type": "paragraph", "text": text })
}
