//! [`Persist`] implementations that write editing sessions through the API

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::ApiClient;
use crate::services::presentations::UpdatePresentationRequest;
use crate::sync::{BlockSelection, Persist};
use crate::types::LearnSpaceError;

/// Saves a course's whole document
pub struct DocumentPersister {
    client: Arc<ApiClient>,
    course_id: String,
}

impl DocumentPersister {
    pub fn new(client: Arc<ApiClient>, course_id: impl Into<String>) -> Self {
        Self {
            client,
            course_id: course_id.into(),
        }
    }
}

#[async_trait]
impl Persist<Vec<Value>> for DocumentPersister {
    async fn persist(&self, snapshot: &Vec<Value>) -> Result<(), LearnSpaceError> {
        self.client
            .save_document(&self.course_id, snapshot.clone())
            .await
            .map(|_| ())
    }
}

/// Saves a course's default selection
pub struct CourseSelectionPersister {
    client: Arc<ApiClient>,
    course_id: String,
}

impl CourseSelectionPersister {
    pub fn new(client: Arc<ApiClient>, course_id: impl Into<String>) -> Self {
        Self {
            client,
            course_id: course_id.into(),
        }
    }
}

#[async_trait]
impl Persist<BlockSelection> for CourseSelectionPersister {
    async fn persist(&self, snapshot: &BlockSelection) -> Result<(), LearnSpaceError> {
        self.client
            .save_default_selection(&self.course_id, snapshot.to_ids())
            .await
            .map(|_| ())
    }
}

/// Saves a presentation's block selection
pub struct PresentationSelectionPersister {
    client: Arc<ApiClient>,
    presentation_id: String,
}

impl PresentationSelectionPersister {
    pub fn new(client: Arc<ApiClient>, presentation_id: impl Into<String>) -> Self {
        Self {
            client,
            presentation_id: presentation_id.into(),
        }
    }
}

#[async_trait]
impl Persist<BlockSelection> for PresentationSelectionPersister {
    async fn persist(&self, snapshot: &BlockSelection) -> Result<(), LearnSpaceError> {
        let request = UpdatePresentationRequest {
            title: None,
            block_ids: Some(snapshot.to_ids()),
        };
        self.client
            .update_presentation(&self.presentation_id, &request)
            .await
            .map(|_| ())
    }
}
