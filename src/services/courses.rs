//! Course creation, listing, deletion and the public course projection

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::auth::authorize;
use crate::db::{blocks, courses, CourseRow, NewCourse, Store};
use crate::services::{resolve_selection, validate_title, LiveBlocks};
use crate::types::{FieldErrors, LearnSpaceError};

pub const SLUG_MIN_CHARS: usize = 3;
pub const SLUG_MAX_CHARS: usize = 100;

/// Body of `POST /course`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "thumbnailUrl", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// Read-only view of a course's default presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicCourse {
    pub title: String,
    pub description: Option<String>,
    pub blocks: Vec<Value>,
    pub block_ids: Vec<String>,
}

/// Derive a slug: lowercase ASCII alphanumeric runs joined by single hyphens
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// `[a-z0-9]+(-[a-z0-9]+)*`, within the length bounds
pub fn is_valid_slug(slug: &str) -> bool {
    (SLUG_MIN_CHARS..=SLUG_MAX_CHARS).contains(&slug.len())
        && slug.split('-').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

/// Empty strings become `None`
fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn validate(author_id: &str, request: &CreateCourseRequest) -> Result<NewCourse, LearnSpaceError> {
    let mut errors = FieldErrors::new();

    let title = validate_title(&mut errors, "title", &request.title);

    let slug = match non_empty(request.slug.as_ref()) {
        Some(slug) => slug,
        None => slugify(&request.title),
    };
    if !is_valid_slug(&slug) {
        errors.push(
            "slug",
            format!(
                "must be {}-{} lowercase letters, digits and single hyphens",
                SLUG_MIN_CHARS, SLUG_MAX_CHARS
            ),
        );
    }

    let thumbnail_url = non_empty(request.thumbnail_url.as_ref());
    if let Some(thumbnail) = &thumbnail_url {
        if url::Url::parse(thumbnail).is_err() {
            errors.push("thumbnail_url", "must be an absolute URL");
        }
    }

    errors.into_result()?;

    Ok(NewCourse {
        title: title.unwrap_or_default(),
        slug,
        description: non_empty(request.description.as_ref()),
        thumbnail_url,
        author_id: author_id.to_string(),
    })
}

/// Create a course owned by `author_id`, with an empty document
pub fn create_course(
    store: &Store,
    author_id: &str,
    request: &CreateCourseRequest,
) -> Result<CourseRow, LearnSpaceError> {
    let input = validate(author_id, request)?;
    let course = store.with_conn(|conn| courses::insert_course(conn, input))?;

    info!(course_id = %course.id, slug = %course.slug, "Created course");
    Ok(course)
}

/// The caller's courses, newest first
pub fn list_courses(store: &Store, author_id: &str) -> Result<Vec<CourseRow>, LearnSpaceError> {
    store.with_conn(|conn| {
        let mut live = LiveBlocks::new(conn);
        courses::list_by_author(conn, author_id)?
            .into_iter()
            .map(|mut course| {
                course.default_presentation_block_ids =
                    live.retain(&course.id, &course.default_presentation_block_ids)?;
                Ok::<_, LearnSpaceError>(course)
            })
            .collect()
    })
}

/// Delete a course with its blocks and presentations
pub fn delete_course(store: &Store, user_id: &str, course_id: &str) -> Result<(), LearnSpaceError> {
    store.with_conn(|conn| {
        authorize(conn, user_id, course_id)?.require()?;
        courses::delete_course(conn, course_id)?;
        Ok(())
    })?;

    info!(course_id = %course_id, "Deleted course");
    Ok(())
}

/// Public projection of a course's default selection, looked up by slug
pub fn get_public_course(store: &Store, slug: &str) -> Result<PublicCourse, LearnSpaceError> {
    store.with_conn(|conn| {
        let course = courses::get_course_by_slug(conn, slug)?
            .ok_or_else(|| LearnSpaceError::NotFound("Course not found".into()))?;
        let live = blocks::list_blocks(conn, &course.id)?;
        let (blocks, block_ids) =
            resolve_selection(&live, &course.default_presentation_block_ids);

        Ok(PublicCourse {
            title: course.title,
            description: course.description,
            blocks,
            block_ids,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::accounts::{register, Credentials};

    fn setup() -> (Store, String) {
        let store = Store::open_in_memory().unwrap();
        let user = register(
            &store,
            &Credentials {
                email: "ada@example.com".into(),
                password: "secret1".into(),
            },
        )
        .unwrap();
        (store, user.id)
    }

    fn request(title: &str, slug: Option<&str>) -> CreateCourseRequest {
        CreateCourseRequest {
            title: title.into(),
            slug: slug.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Algebra 101"), "algebra-101");
        assert_eq!(slugify("  Intro -- to   Rust! "), "intro-to-rust");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
    }

    #[test]
    fn test_slug_shape() {
        assert!(is_valid_slug("algebra-101"));
        assert!(!is_valid_slug("ab"));
        assert!(!is_valid_slug("Algebra"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug("-leading"));
    }

    #[test]
    fn test_create_derives_slug_and_nulls_empty_fields() {
        let (store, author) = setup();
        let course = create_course(
            &store,
            &author,
            &CreateCourseRequest {
                title: "Algebra 101".into(),
                slug: None,
                description: Some("   ".into()),
                thumbnail_url: Some(String::new()),
            },
        )
        .unwrap();

        assert_eq!(course.slug, "algebra-101");
        assert!(course.description.is_none());
        assert!(course.thumbnail_url.is_none());
        assert!(course.default_presentation_block_ids.is_empty());
    }

    #[test]
    fn test_duplicate_slug_conflicts() {
        let (store, author) = setup();
        create_course(&store, &author, &request("Algebra 101", Some("algebra-101"))).unwrap();
        let err =
            create_course(&store, &author, &request("Algebra Again", Some("algebra-101"))).unwrap_err();
        assert!(matches!(err, LearnSpaceError::Conflict(_)));
        assert_eq!(list_courses(&store, &author).unwrap().len(), 1);
    }

    #[test]
    fn test_validation_fields() {
        let (store, author) = setup();
        let err = create_course(
            &store,
            &author,
            &CreateCourseRequest {
                title: "Hi".into(),
                slug: Some("Bad Slug".into()),
                description: None,
                thumbnail_url: Some("not a url".into()),
            },
        )
        .unwrap_err();

        match err {
            LearnSpaceError::Validation(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["title", "slug", "thumbnail_url"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_requires_owner() {
        let (store, author) = setup();
        let course = create_course(&store, &author, &request("Algebra 101", None)).unwrap();

        let err = delete_course(&store, "someone-else", &course.id).unwrap_err();
        assert!(matches!(err, LearnSpaceError::Forbidden(_)));

        delete_course(&store, &author, &course.id).unwrap();
        let err = delete_course(&store, &author, &course.id).unwrap_err();
        assert!(matches!(err, LearnSpaceError::NotFound(_)));
    }

    #[test]
    fn test_public_course_unknown_slug() {
        let (store, _) = setup();
        assert!(matches!(
            get_public_course(&store, "nope"),
            Err(LearnSpaceError::NotFound(_))
        ));
    }
}
