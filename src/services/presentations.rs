//! Presentations: named, ordered block selections of a course

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::auth::authorize;
use crate::db::{blocks, courses, presentations, PresentationChanges, PresentationRow, Store};
use crate::services::{normalize_ids, resolve_selection, validate_title, LiveBlocks};
use crate::types::{FieldErrors, LearnSpaceError};

/// Body of `POST /presentation`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePresentationRequest {
    pub title: String,
    #[serde(alias = "courseId")]
    pub course_id: String,
    #[serde(default, alias = "blockIds", skip_serializing_if = "Option::is_none")]
    pub block_ids: Option<Vec<String>>,
}

/// Body of `PUT /presentation/{id}`. At least one field is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePresentationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "blockIds", skip_serializing_if = "Option::is_none")]
    pub block_ids: Option<Vec<String>>,
}

/// A presentation with its selection resolved against the live document.
/// `block_ids` only lists blocks that still exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationDetail {
    #[serde(flatten)]
    pub presentation: PresentationRow,
    pub blocks: Vec<Value>,
}

/// Unauthenticated projection; carries no author or course identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicPresentation {
    pub title: String,
    pub course_title: String,
    pub blocks: Vec<Value>,
    pub block_ids: Vec<String>,
}

fn not_found() -> LearnSpaceError {
    LearnSpaceError::NotFound("Presentation not found".into())
}

/// Presentations of one course, or of every course the caller owns
pub fn list_presentations(
    store: &Store,
    user_id: &str,
    course_id: Option<&str>,
) -> Result<Vec<PresentationRow>, LearnSpaceError> {
    store.with_conn(|conn| {
        let rows = match course_id {
            Some(course_id) => {
                authorize(conn, user_id, course_id)?.require_concealed()?;
                presentations::list_by_course(conn, course_id)?
            }
            None => presentations::list_by_author(conn, user_id)?,
        };

        let mut live = LiveBlocks::new(conn);
        rows.into_iter()
            .map(|row| with_live_ids(&mut live, row))
            .collect()
    })
}

/// The row with its `block_ids` restricted to blocks that still exist
fn with_live_ids(
    live: &mut LiveBlocks<'_>,
    mut row: PresentationRow,
) -> Result<PresentationRow, LearnSpaceError> {
    row.block_ids = live.retain(&row.course_id, &row.block_ids)?;
    Ok(row)
}

pub fn create_presentation(
    store: &Store,
    user_id: &str,
    request: CreatePresentationRequest,
) -> Result<PresentationRow, LearnSpaceError> {
    let mut errors = FieldErrors::new();
    let title = validate_title(&mut errors, "title", &request.title);
    if request.course_id.trim().is_empty() {
        errors.push("course_id", "is required");
    }
    errors.into_result()?;
    let title = title.unwrap_or_default();

    let block_ids = normalize_ids("block_ids", request.block_ids.unwrap_or_default())?;

    let presentation = store.with_conn(|conn| {
        authorize(conn, user_id, &request.course_id)?.require_concealed()?;
        let row = presentations::insert_presentation(conn, &request.course_id, &title, &block_ids)?;
        with_live_ids(&mut LiveBlocks::new(conn), row)
    })?;

    info!(
        presentation_id = %presentation.id,
        course_id = %presentation.course_id,
        "Created presentation"
    );
    Ok(presentation)
}

/// Load a presentation for its course's author
pub fn get_presentation(
    store: &Store,
    user_id: &str,
    presentation_id: &str,
) -> Result<PresentationDetail, LearnSpaceError> {
    store.with_conn(|conn| {
        let mut presentation =
            presentations::get_presentation(conn, presentation_id)?.ok_or_else(not_found)?;
        authorize(conn, user_id, &presentation.course_id)?.require()?;

        let live = blocks::list_blocks(conn, &presentation.course_id)?;
        let (blocks, block_ids) = resolve_selection(&live, &presentation.block_ids);
        presentation.block_ids = block_ids;

        Ok(PresentationDetail {
            presentation,
            blocks,
        })
    })
}

/// Partial update of title and/or selection
pub fn update_presentation(
    store: &Store,
    user_id: &str,
    presentation_id: &str,
    request: UpdatePresentationRequest,
) -> Result<PresentationRow, LearnSpaceError> {
    let mut changes = PresentationChanges::default();

    if let Some(title) = &request.title {
        let mut errors = FieldErrors::new();
        changes.title = validate_title(&mut errors, "title", title);
        errors.into_result()?;
    }
    if let Some(ids) = request.block_ids {
        changes.block_ids = Some(normalize_ids("block_ids", ids)?);
    }
    if changes.is_empty() {
        return Err(LearnSpaceError::invalid("title", "provide title or block_ids"));
    }

    let updated = store.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        let existing =
            presentations::get_presentation(&tx, presentation_id)?.ok_or_else(not_found)?;
        authorize(&tx, user_id, &existing.course_id)?.require()?;

        let updated =
            presentations::update_presentation(&tx, presentation_id, &changes)?.ok_or_else(not_found)?;
        let updated = with_live_ids(&mut LiveBlocks::new(&tx), updated)?;
        tx.commit()?;
        Ok(updated)
    })?;

    info!(presentation_id = %presentation_id, "Updated presentation");
    Ok(updated)
}

/// Hard delete
pub fn delete_presentation(
    store: &Store,
    user_id: &str,
    presentation_id: &str,
) -> Result<(), LearnSpaceError> {
    store.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        let existing =
            presentations::get_presentation(&tx, presentation_id)?.ok_or_else(not_found)?;
        authorize(&tx, user_id, &existing.course_id)?.require()?;

        presentations::delete_presentation(&tx, presentation_id)?;
        tx.commit()?;
        Ok(())
    })?;

    info!(presentation_id = %presentation_id, "Deleted presentation");
    Ok(())
}

/// Public read-only view. Every miss is a plain 404.
pub fn get_public_presentation(
    store: &Store,
    presentation_id: &str,
) -> Result<PublicPresentation, LearnSpaceError> {
    store.with_conn(|conn| {
        let presentation =
            presentations::get_presentation(conn, presentation_id)?.ok_or_else(not_found)?;
        let course =
            courses::get_course(conn, &presentation.course_id)?.ok_or_else(not_found)?;

        let live = blocks::list_blocks(conn, &course.id)?;
        let (blocks, block_ids) = resolve_selection(&live, &presentation.block_ids);

        Ok(PublicPresentation {
            title: presentation.title,
            course_title: course.title,
            blocks,
            block_ids,
        })
    })
}
