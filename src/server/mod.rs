//! HTTP server for Learn Space

pub mod http;

pub use http::{route, run, serve, AppState};
