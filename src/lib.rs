//! Learn Space - course authoring with block documents and presentations
//!
//! Authors write a course as an ordered document of content blocks, pick a
//! default subset to show, and save further named subsets as presentations.
//! Presentations and courses can be shared read-only without an account.
//!
//! ## Layout
//!
//! - **routes**: HTTP handlers under `/auth`, `/course`, `/presentation`, `/public`
//! - **services**: validation, ownership checks and selection resolution
//! - **db**: SQLite store for users, courses, blocks and presentations
//! - **sync**: client-side debounced autosave and block selections
//! - **client**: typed HTTP client for the API

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod sync;
pub mod types;

pub use client::ApiClient;
pub use config::Args;
pub use db::Store;
pub use server::{run, serve, AppState};
pub use types::{LearnSpaceError, Result};
