//! HTTP routes for Learn Space

pub mod auth_routes;
pub mod common;
pub mod courses;
pub mod health;
pub mod presentations;
pub mod public;

pub use auth_routes::handle_auth_request;
pub use common::{error_response, json_response, BoxBody, ErrorResponse};
pub use courses::handle_course_request;
pub use health::{health_check, HealthResponse};
pub use presentations::handle_presentation_request;
pub use public::handle_public_request;
