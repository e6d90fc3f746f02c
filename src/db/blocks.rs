//! Document blocks
//!
//! A course's document is the ordered set of its block rows. Saves replace the
//! whole set, so `position` is always dense from zero.

use rusqlite::{params, Connection, Row, Transaction};
use serde::Serialize;
use serde_json::Value;

use crate::types::LearnSpaceError;

/// Block row from database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockRow {
    pub course_id: String,
    pub id: String,
    pub position: i64,
    /// Opaque editor payload, including its own `id`
    pub content: Value,
}

/// Block row as stored, before the payload is parsed
struct RawBlock {
    course_id: String,
    id: String,
    position: i64,
    json: String,
}

impl RawBlock {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            course_id: row.get("course_id")?,
            id: row.get("id")?,
            position: row.get("position")?,
            json: row.get("json")?,
        })
    }

    fn parse(self) -> Result<BlockRow, LearnSpaceError> {
        let content = serde_json::from_str(&self.json).map_err(|e| {
            LearnSpaceError::Internal(format!("Corrupt block {} payload: {}", self.id, e))
        })?;

        Ok(BlockRow {
            course_id: self.course_id,
            id: self.id,
            position: self.position,
            content,
        })
    }
}

/// A block as supplied by the editor: its id and full payload
#[derive(Debug, Clone, PartialEq)]
pub struct BlockInput {
    pub id: String,
    pub content: Value,
}

/// List a course's blocks in document order
pub fn list_blocks(conn: &Connection, course_id: &str) -> Result<Vec<BlockRow>, LearnSpaceError> {
    let mut stmt = conn.prepare(
        "SELECT course_id, id, position, json FROM blocks WHERE course_id = ? ORDER BY position",
    )?;

    let rows = stmt.query_map(params![course_id], RawBlock::from_row)?;

    let mut blocks = vec![];
    for row in rows {
        blocks.push(row?.parse()?);
    }
    Ok(blocks)
}

/// Live block ids of a course, in document order
pub fn list_block_ids(conn: &Connection, course_id: &str) -> Result<Vec<String>, LearnSpaceError> {
    let mut stmt =
        conn.prepare("SELECT id FROM blocks WHERE course_id = ? ORDER BY position")?;
    let ids = stmt
        .query_map(params![course_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Discard every block of the course and write `blocks` at positions 0..N-1.
///
/// Runs inside the caller's transaction; nothing is visible until it commits.
pub fn replace_blocks(
    tx: &Transaction,
    course_id: &str,
    blocks: &[BlockInput],
) -> Result<usize, LearnSpaceError> {
    tx.execute("DELETE FROM blocks WHERE course_id = ?", params![course_id])?;

    let mut stmt = tx.prepare(
        "INSERT INTO blocks (course_id, id, json, position) VALUES (?, ?, ?, ?)",
    )?;

    for (position, block) in blocks.iter().enumerate() {
        let json = serde_json::to_string(&block.content).map_err(|e| {
            LearnSpaceError::Internal(format!("Failed to encode block {}: {}", block.id, e))
        })?;
        stmt.execute(params![course_id, block.id, json, position as i64])?;
    }

    Ok(blocks.len())
}
