//! Ownership guard
//!
//! Every private course or presentation operation passes through here, inside
//! the same store access that performs the operation. Decisions are never
//! cached between requests.

use std::fmt;

use rusqlite::Connection;

use crate::db::courses::course_author;
use crate::types::LearnSpaceError;

/// Result of checking a user against a course's author
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    NotFound,
    Forbidden,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Allowed => write!(f, "ALLOWED"),
            Access::NotFound => write!(f, "NOT_FOUND"),
            Access::Forbidden => write!(f, "FORBIDDEN"),
        }
    }
}

impl Access {
    /// Owner-facing policy: absent is 404, someone else's is 403
    pub fn require(self) -> Result<(), LearnSpaceError> {
        match self {
            Access::Allowed => Ok(()),
            Access::NotFound => Err(LearnSpaceError::NotFound("Course not found".into())),
            Access::Forbidden => Err(LearnSpaceError::Forbidden(
                "You do not own this course".into(),
            )),
        }
    }

    /// Concealing policy: anything but the owner sees 404
    pub fn require_concealed(self) -> Result<(), LearnSpaceError> {
        match self {
            Access::Allowed => Ok(()),
            Access::NotFound | Access::Forbidden => {
                Err(LearnSpaceError::NotFound("Course not found".into()))
            }
        }
    }
}

/// Decide whether `user_id` may act on `course_id`
pub fn authorize(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
) -> Result<Access, LearnSpaceError> {
    Ok(match course_author(conn, course_id)? {
        None => Access::NotFound,
        Some(author_id) if author_id == user_id => Access::Allowed,
        Some(_) => Access::Forbidden,
    })
}
