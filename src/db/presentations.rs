//! Presentation CRUD operations
//!
//! A presentation stores block ids, not blocks. Ids are not checked against the
//! course's live blocks on write; readers filter stale ones out.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{encode_id_list, now_rfc3339, parse_id_list};
use crate::types::LearnSpaceError;

const COLUMNS: &str = "id, course_id, title, block_ids, created_at, updated_at, \
                       NULL AS course_title";

/// Presentation row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationRow {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub block_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Only filled by listings that span several courses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_title: Option<String>,
}

struct RawPresentation {
    id: String,
    course_id: String,
    title: String,
    block_ids: String,
    created_at: String,
    updated_at: String,
    course_title: Option<String>,
}

impl RawPresentation {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            course_id: row.get("course_id")?,
            title: row.get("title")?,
            block_ids: row.get("block_ids")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            course_title: row.get("course_title")?,
        })
    }

    fn parse(self) -> Result<PresentationRow, LearnSpaceError> {
        Ok(PresentationRow {
            block_ids: parse_id_list(&self.block_ids, "block_ids")?,
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            created_at: self.created_at,
            updated_at: self.updated_at,
            course_title: self.course_title,
        })
    }
}

/// Partial update; `None` leaves the field as it is
#[derive(Debug, Clone, Default)]
pub struct PresentationChanges {
    pub title: Option<String>,
    pub block_ids: Option<Vec<String>>,
}

impl PresentationChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.block_ids.is_none()
    }
}

pub fn insert_presentation(
    conn: &Connection,
    course_id: &str,
    title: &str,
    block_ids: &[String],
) -> Result<PresentationRow, LearnSpaceError> {
    let now = now_rfc3339();
    let presentation = PresentationRow {
        id: uuid::Uuid::new_v4().to_string(),
        course_id: course_id.to_string(),
        title: title.to_string(),
        block_ids: block_ids.to_vec(),
        created_at: now.clone(),
        updated_at: now,
        course_title: None,
    };

    conn.execute(
        r#"
        INSERT INTO presentations (id, course_id, title, block_ids, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            presentation.id,
            presentation.course_id,
            presentation.title,
            encode_id_list(&presentation.block_ids)?,
            presentation.created_at,
            presentation.updated_at,
        ],
    )?;

    Ok(presentation)
}

pub fn get_presentation(
    conn: &Connection,
    id: &str,
) -> Result<Option<PresentationRow>, LearnSpaceError> {
    conn.query_row(
        &format!("SELECT {} FROM presentations WHERE id = ?", COLUMNS),
        params![id],
        RawPresentation::from_row,
    )
    .optional()?
    .map(RawPresentation::parse)
    .transpose()
}

/// Presentations of one course, newest first
pub fn list_by_course(
    conn: &Connection,
    course_id: &str,
) -> Result<Vec<PresentationRow>, LearnSpaceError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM presentations WHERE course_id = ? ORDER BY created_at DESC, rowid DESC",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![course_id], RawPresentation::from_row)?;

    let mut presentations = vec![];
    for row in rows {
        presentations.push(row?.parse()?);
    }
    Ok(presentations)
}

/// Presentations across every course an author owns, newest first, with the
/// course title attached
pub fn list_by_author(
    conn: &Connection,
    author_id: &str,
) -> Result<Vec<PresentationRow>, LearnSpaceError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT p.id, p.course_id, p.title, p.block_ids, p.created_at, p.updated_at,
               c.title AS course_title
        FROM presentations p
        JOIN courses c ON c.id = p.course_id
        WHERE c.author_id = ?
        ORDER BY p.created_at DESC, p.rowid DESC
        "#,
    )?;
    let rows = stmt.query_map(params![author_id], RawPresentation::from_row)?;

    let mut presentations = vec![];
    for row in rows {
        presentations.push(row?.parse()?);
    }
    Ok(presentations)
}

/// Apply `changes` and bump `updated_at`. Returns `None` if the row is gone.
pub fn update_presentation(
    conn: &Connection,
    id: &str,
    changes: &PresentationChanges,
) -> Result<Option<PresentationRow>, LearnSpaceError> {
    let encoded = changes
        .block_ids
        .as_ref()
        .map(|ids| encode_id_list(ids))
        .transpose()?;

    let updated = conn.execute(
        r#"
        UPDATE presentations
        SET title = COALESCE(?, title),
            block_ids = COALESCE(?, block_ids),
            updated_at = ?
        WHERE id = ?
        "#,
        params![changes.title, encoded, now_rfc3339(), id],
    )?;

    if updated == 0 {
        return Ok(None);
    }
    get_presentation(conn, id)
}

pub fn delete_presentation(conn: &Connection, id: &str) -> Result<bool, LearnSpaceError> {
    let deleted = conn.execute("DELETE FROM presentations WHERE id = ?", params![id])?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        courses::{delete_course, insert_course, NewCourse},
        schema::init_schema,
        users::insert_user,
    };

    struct Fixture {
        conn: Connection,
        author_id: String,
        course_id: String,
    }

    fn setup() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        let user = insert_user(&conn, "ada@example.com", "hash").unwrap();
        let course = insert_course(
            &conn,
            NewCourse {
                title: "Algebra 101".into(),
                slug: "algebra-101".into(),
                description: None,
                thumbnail_url: None,
                author_id: user.id.clone(),
            },
        )
        .unwrap();
        Fixture {
            conn,
            author_id: user.id,
            course_id: course.id,
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let f = setup();
        let p = insert_presentation(&f.conn, &f.course_id, "Midterm Review", &ids(&["b1"])).unwrap();

        let found = get_presentation(&f.conn, &p.id).unwrap().unwrap();
        assert_eq!(found, p);
        assert_eq!(found.block_ids, vec!["b1"]);
        assert!(get_presentation(&f.conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_lists_newest_first() {
        let f = setup();
        let a = insert_presentation(&f.conn, &f.course_id, "First", &[]).unwrap();
        let b = insert_presentation(&f.conn, &f.course_id, "Second", &[]).unwrap();

        let by_course = list_by_course(&f.conn, &f.course_id).unwrap();
        assert_eq!(by_course[0].id, b.id);
        assert_eq!(by_course[1].id, a.id);
        assert!(by_course[0].course_title.is_none());

        let by_author = list_by_author(&f.conn, &f.author_id).unwrap();
        assert_eq!(by_author.len(), 2);
        assert_eq!(by_author[0].course_title.as_deref(), Some("Algebra 101"));
    }

    #[test]
    fn test_partial_update() {
        let f = setup();
        let p = insert_presentation(&f.conn, &f.course_id, "Draft", &ids(&["b1", "b2"])).unwrap();

        let renamed = update_presentation(
            &f.conn,
            &p.id,
            &PresentationChanges {
                title: Some("Final".into()),
                block_ids: None,
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(renamed.title, "Final");
        assert_eq!(renamed.block_ids, vec!["b1", "b2"]);

        let reselected = update_presentation(
            &f.conn,
            &p.id,
            &PresentationChanges {
                title: None,
                block_ids: Some(ids(&["b2"])),
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(reselected.title, "Final");
        assert_eq!(reselected.block_ids, vec!["b2"]);

        assert!(update_presentation(&f.conn, "missing", &PresentationChanges::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_delete_and_cascade() {
        let f = setup();
        let p = insert_presentation(&f.conn, &f.course_id, "One", &[]).unwrap();
        assert!(delete_presentation(&f.conn, &p.id).unwrap());
        assert!(!delete_presentation(&f.conn, &p.id).unwrap());

        let q = insert_presentation(&f.conn, &f.course_id, "Two", &[]).unwrap();
        delete_course(&f.conn, &f.course_id).unwrap();
        assert!(get_presentation(&f.conn, &q.id).unwrap().is_none());
    }
}
