//! Course documents: the ordered block sequence plus the default selection
//!
//! A save replaces the whole document. Blocks and the selection are written in
//! one transaction, after the ownership check on the same connection.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::authorize;
use crate::db::{blocks, courses, BlockInput, CourseRow, Store};
use crate::services::{normalize_ids, resolve_selection, LiveBlocks};
use crate::types::{FieldErrors, LearnSpaceError};

/// Response of `GET /course/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDocument {
    pub course: CourseRow,
    /// Block payloads in document order
    pub document: Vec<Value>,
    /// Default selection, restricted to blocks that still exist
    pub default_selection: Vec<String>,
}

/// Body of `PUT /course/{id}`. At least one field is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplaceDocumentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Vec<Value>>,
    #[serde(
        default,
        alias = "presentationBlockIds",
        alias = "defaultSelection",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_selection: Option<Vec<String>>,
}

/// What a save wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSaved {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_selection: Option<Vec<String>>,
}

/// Check every element is an object with a unique, non-empty string `id`
pub fn validate_document(document: Vec<Value>) -> Result<Vec<BlockInput>, LearnSpaceError> {
    let mut errors = FieldErrors::new();
    let mut seen = HashSet::new();
    let mut blocks = Vec::with_capacity(document.len());

    for (index, content) in document.into_iter().enumerate() {
        let field = format!("document[{}].id", index);
        let id = match content.as_object().and_then(|obj| obj.get("id")) {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            _ if !content.is_object() => {
                errors.push(format!("document[{}]", index), "must be an object");
                continue;
            }
            _ => {
                errors.push(field, "must be a non-empty string");
                continue;
            }
        };

        if !seen.insert(id.clone()) {
            errors.push(field, format!("duplicate block id '{}'", id));
            continue;
        }

        blocks.push(BlockInput { id, content });
    }

    errors.into_result()?;
    Ok(blocks)
}

/// Load a course's document for its author
pub fn get_document(
    store: &Store,
    course_id: &str,
    user_id: &str,
) -> Result<CourseDocument, LearnSpaceError> {
    store.with_conn(|conn| {
        authorize(conn, user_id, course_id)?.require()?;

        let mut course = courses::get_course(conn, course_id)?
            .ok_or_else(|| LearnSpaceError::NotFound("Course not found".into()))?;
        let live = blocks::list_blocks(conn, course_id)?;
        let (_, default_selection) =
            resolve_selection(&live, &course.default_presentation_block_ids);
        course.default_presentation_block_ids = default_selection.clone();

        Ok(CourseDocument {
            course,
            document: live.into_iter().map(|b| b.content).collect(),
            default_selection,
        })
    })
}

/// Replace the document and/or the default selection, all or nothing
pub fn replace_document(
    store: &Store,
    course_id: &str,
    user_id: &str,
    request: ReplaceDocumentRequest,
) -> Result<DocumentSaved, LearnSpaceError> {
    if request.document.is_none() && request.default_selection.is_none() {
        return Err(LearnSpaceError::invalid(
            "document",
            "provide document or default_selection",
        ));
    }

    let new_blocks = request.document.map(validate_document).transpose()?;
    let selection = request
        .default_selection
        .map(|ids| normalize_ids("default_selection", ids))
        .transpose()?;

    let selection = store.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        authorize(&tx, user_id, course_id)?.require()?;

        if let Some(new_blocks) = &new_blocks {
            let written = blocks::replace_blocks(&tx, course_id, new_blocks)?;
            debug!(course_id = %course_id, blocks = written, "Replaced document blocks");
        }
        let saved_selection = match &selection {
            Some(ids) => {
                courses::set_default_selection(&tx, course_id, ids)?;
                Some(LiveBlocks::new(&tx).retain(course_id, ids)?)
            }
            None => None,
        };

        tx.commit()?;
        Ok(saved_selection)
    })?;

    info!(course_id = %course_id, "Saved course document");
    Ok(DocumentSaved {
        success: true,
        block_count: new_blocks.as_ref().map(Vec::len),
        default_selection: selection,
    })
}
