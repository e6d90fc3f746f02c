//! Business rules on top of the store
//!
//! Each service validates its input before touching the store, runs the
//! ownership guard inside the same connection access as the work it protects,
//! and returns plain serializable values for the routes to render.

pub mod accounts;
pub mod courses;
pub mod documents;
pub mod presentations;

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use rusqlite::Connection;
use serde_json::Value;

use crate::db::{blocks, BlockRow};
use crate::types::{FieldErrors, LearnSpaceError};

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 100;

/// Trim a title and check its length in characters
pub(crate) fn validate_title(
    errors: &mut FieldErrors,
    field: &str,
    title: &str,
) -> Option<String> {
    let title = title.trim();
    let len = title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&len) {
        errors.push(
            field,
            format!(
                "must be between {} and {} characters",
                TITLE_MIN_CHARS, TITLE_MAX_CHARS
            ),
        );
        return None;
    }
    Some(title.to_string())
}

/// Drop duplicate ids, keeping the first occurrence. Empty ids are invalid.
pub(crate) fn normalize_ids(field: &str, ids: Vec<String>) -> Result<Vec<String>, LearnSpaceError> {
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(LearnSpaceError::invalid(field, "block ids must be non-empty strings"));
    }
    let unique: IndexSet<String> = ids.into_iter().collect();
    Ok(unique.into_iter().collect())
}

/// Resolve a stored selection against the live blocks of its course.
///
/// Returns the payloads and ids that still exist, in selection order. Stale ids
/// are dropped silently.
pub(crate) fn resolve_selection(blocks: &[BlockRow], ids: &[String]) -> (Vec<Value>, Vec<String>) {
    let mut resolved = Vec::with_capacity(ids.len());
    let mut live_ids = Vec::with_capacity(ids.len());

    for id in ids {
        if let Some(block) = blocks.iter().find(|b| &b.id == id) {
            resolved.push(block.content.clone());
            live_ids.push(id.clone());
        }
    }

    (resolved, live_ids)
}

/// Live block ids per course, loaded at most once per course.
///
/// Every selection leaving the service layer passes through [`LiveBlocks::retain`],
/// so stored ids of deleted blocks never reach a client.
pub(crate) struct LiveBlocks<'c> {
    conn: &'c Connection,
    by_course: HashMap<String, HashSet<String>>,
}

impl<'c> LiveBlocks<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            by_course: HashMap::new(),
        }
    }

    /// `ids` restricted to live blocks of `course_id`, in stored order
    pub(crate) fn retain(
        &mut self,
        course_id: &str,
        ids: &[String],
    ) -> Result<Vec<String>, LearnSpaceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if !self.by_course.contains_key(course_id) {
            let live = blocks::list_block_ids(self.conn, course_id)?;
            self.by_course
                .insert(course_id.to_string(), live.into_iter().collect());
        }

        let live = self.by_course.get(course_id);
        Ok(ids
            .iter()
            .filter(|id| live.is_some_and(|live| live.contains(*id)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(id: &str, position: i64) -> BlockRow {
        BlockRow {
            course_id: "c1".into(),
            id: id.into(),
            position,
            content: json!({ "id": id }),
        }
    }

    #[test]
    fn test_validate_title() {
        let mut errors = FieldErrors::new();
        assert_eq!(
            validate_title(&mut errors, "title", "  Algebra 101 "),
            Some("Algebra 101".to_string())
        );
        assert!(validate_title(&mut errors, "title", "ab").is_none());
        assert!(validate_title(&mut errors, "title", &"x".repeat(101)).is_none());
        assert_eq!(errors.iter().count(), 2);
    }

    #[test]
    fn test_normalize_ids() {
        let ids = vec!["b2".to_string(), "b1".to_string(), "b2".to_string()];
        assert_eq!(normalize_ids("block_ids", ids).unwrap(), vec!["b2", "b1"]);
        assert!(normalize_ids("block_ids", vec![" ".to_string()]).is_err());
    }

    #[test]
    fn test_resolve_selection_drops_stale_ids() {
        let blocks = vec![block("x", 0), block("z", 1)];
        let ids = vec!["z".to_string(), "y".to_string(), "x".to_string()];

        let (content, live) = resolve_selection(&blocks, &ids);
        assert_eq!(live, vec!["z", "x"]);
        assert_eq!(content, vec![json!({ "id": "z" }), json!({ "id": "x" })]);

        let (content, live) = resolve_selection(&[], &ids);
        assert!(content.is_empty() && live.is_empty());
    }

    #[test]
    fn test_live_blocks_retain() {
        let store = crate::db::Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO users (id, email, password_hash, created_at) VALUES ('u1', 'a@b.co', 'h', 'now')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO courses (id, title, slug, author_id, created_at, default_presentation_block_ids) \
                     VALUES ('c1', 'Algebra', 'algebra', 'u1', 'now', '[]')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO blocks (course_id, id, json, position) VALUES ('c1', 'x', '{\"id\":\"x\"}', 0)",
                    [],
                )?;

                let mut live = LiveBlocks::new(conn);
                let ids = vec!["y".to_string(), "x".to_string()];
                assert_eq!(live.retain("c1", &ids)?, vec!["x"]);
                assert!(live.retain("missing", &ids)?.is_empty());
                assert!(live.retain("c1", &[])?.is_empty());
                Ok(())
            })
            .unwrap();
    }
}
