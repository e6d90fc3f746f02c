//! Liveness probe
//!
//! `GET /health` answers 200 while the process is up and the store is open.

use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::routes::common::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// False once the store has been closed
    pub healthy: bool,
    pub version: String,
    /// Uptime in seconds
    pub uptime: u64,
    pub timestamp: String,
}

pub fn health_check(state: Arc<AppState>) -> Response<BoxBody> {
    let healthy = !state.store.is_closed();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(
        status,
        &HealthResponse {
            healthy,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime: state.started_at.elapsed().as_secs(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    )
}
