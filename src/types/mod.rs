//! Shared types for Learn Space

mod error;

pub use error::{FieldError, FieldErrors, LearnSpaceError, Result};
