//! Course CRUD operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{encode_id_list, is_unique_violation, now_rfc3339, parse_id_list};
use crate::types::LearnSpaceError;

/// Course row from database, with the selection column already parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRow {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub author_id: String,
    pub created_at: String,
    pub default_presentation_block_ids: Vec<String>,
}

/// Course row as stored, before the selection text is parsed
struct RawCourse {
    id: String,
    title: String,
    slug: String,
    description: Option<String>,
    thumbnail_url: Option<String>,
    author_id: String,
    created_at: String,
    default_presentation_block_ids: String,
}

impl RawCourse {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            description: row.get("description")?,
            thumbnail_url: row.get("thumbnail_url")?,
            author_id: row.get("author_id")?,
            created_at: row.get("created_at")?,
            default_presentation_block_ids: row.get("default_presentation_block_ids")?,
        })
    }

    fn parse(self) -> Result<CourseRow, LearnSpaceError> {
        let default_presentation_block_ids = parse_id_list(
            &self.default_presentation_block_ids,
            "default_presentation_block_ids",
        )?;

        Ok(CourseRow {
            id: self.id,
            title: self.title,
            slug: self.slug,
            description: self.description,
            thumbnail_url: self.thumbnail_url,
            author_id: self.author_id,
            created_at: self.created_at,
            default_presentation_block_ids,
        })
    }
}

/// Validated input for creating a course
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub author_id: String,
}

/// Insert a course with an empty default selection. A taken slug is a conflict.
pub fn insert_course(conn: &Connection, input: NewCourse) -> Result<CourseRow, LearnSpaceError> {
    let course = CourseRow {
        id: uuid::Uuid::new_v4().to_string(),
        title: input.title,
        slug: input.slug,
        description: input.description,
        thumbnail_url: input.thumbnail_url,
        author_id: input.author_id,
        created_at: now_rfc3339(),
        default_presentation_block_ids: Vec::new(),
    };

    conn.execute(
        r#"
        INSERT INTO courses (
            id, title, slug, description, thumbnail_url, author_id, created_at,
            default_presentation_block_ids
        ) VALUES (?, ?, ?, ?, ?, ?, ?, '[]')
        "#,
        params![
            course.id,
            course.title,
            course.slug,
            course.description,
            course.thumbnail_url,
            course.author_id,
            course.created_at,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            LearnSpaceError::Conflict(format!("Slug '{}' is already taken", course.slug))
        } else {
            LearnSpaceError::from(e)
        }
    })?;

    Ok(course)
}

/// Get course by ID
pub fn get_course(conn: &Connection, id: &str) -> Result<Option<CourseRow>, LearnSpaceError> {
    conn.query_row("SELECT * FROM courses WHERE id = ?", params![id], RawCourse::from_row)
        .optional()?
        .map(RawCourse::parse)
        .transpose()
}

/// Get course by slug
pub fn get_course_by_slug(
    conn: &Connection,
    slug: &str,
) -> Result<Option<CourseRow>, LearnSpaceError> {
    conn.query_row(
        "SELECT * FROM courses WHERE slug = ?",
        params![slug],
        RawCourse::from_row,
    )
    .optional()?
    .map(RawCourse::parse)
    .transpose()
}

/// Author of a course, if the course exists
pub fn course_author(conn: &Connection, id: &str) -> Result<Option<String>, LearnSpaceError> {
    Ok(conn
        .query_row(
            "SELECT author_id FROM courses WHERE id = ?",
            params![id],
            |row| row.get(0),
        )
        .optional()?)
}

/// List an author's courses, newest first
pub fn list_by_author(conn: &Connection, author_id: &str) -> Result<Vec<CourseRow>, LearnSpaceError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM courses WHERE author_id = ? ORDER BY created_at DESC, rowid DESC",
    )?;

    let rows = stmt.query_map(params![author_id], RawCourse::from_row)?;

    let mut courses = vec![];
    for row in rows {
        courses.push(row?.parse()?);
    }
    Ok(courses)
}

/// Replace the serialized default selection
pub fn set_default_selection(
    conn: &Connection,
    course_id: &str,
    block_ids: &[String],
) -> Result<(), LearnSpaceError> {
    let encoded = encode_id_list(block_ids)?;
    let updated = conn.execute(
        "UPDATE courses SET default_presentation_block_ids = ? WHERE id = ?",
        params![encoded, course_id],
    )?;

    if updated == 0 {
        return Err(LearnSpaceError::NotFound("Course not found".into()));
    }
    Ok(())
}

/// Delete a course; blocks and presentations go with it
pub fn delete_course(conn: &Connection, id: &str) -> Result<bool, LearnSpaceError> {
    let deleted = conn.execute("DELETE FROM courses WHERE id = ?", params![id])?;
    Ok(deleted > 0)
}
