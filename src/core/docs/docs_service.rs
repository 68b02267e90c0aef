use async_trait::async_trait;
use thiserror::Error;

use super::docs_requests::Request;
use super::request_builder::{build_plan, BatchPlan};
use crate::core::markup::classify_document;

/// Errors raised while creating or populating a document.
#[derive(Debug, Error)]
pub enum DocsError {
    #[error("Google Docs API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Request to Google Docs failed: {0}")]
    Transport(String),
    #[error("Google Docs response was missing the document id")]
    MissingDocumentId,
}

/// What the API hands back after `documents.create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDocument {
    pub document_id: String,
    pub title: String,
}

/// The two Docs API calls the pipeline needs.
#[async_trait]
pub trait DocsApi: Send + Sync {
    async fn create_document(&self, title: &str) -> Result<CreatedDocument, DocsError>;
    async fn batch_update(&self, document_id: &str, requests: &[Request]) -> Result<(), DocsError>;
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDocument {
    pub document_id: String,
    pub title: String,
    pub request_count: usize,
}

impl PublishedDocument {
    pub fn url(&self) -> String {
        document_url(&self.document_id)
    }
}

pub fn document_url(document_id: &str) -> String {
    format!("https://docs.google.com/document/d/{}/edit", document_id)
}

/// Classifies the markup and builds the ordered batch-update requests.
pub fn plan_document(markup: &str) -> BatchPlan {
    let lines = classify_document(markup);
    build_plan(&lines)
}

/// Runs the classify → build → create → populate pipeline.
pub struct PublishService<A: DocsApi> {
    api: A,
}

impl<A: DocsApi> PublishService<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Creates a document titled `title` and fills it with `markup`.
    pub async fn publish(&self, title: &str, markup: &str) -> Result<PublishedDocument, DocsError> {
        let plan = plan_document(markup);
        tracing::debug!("Planned {} line(s) of text", plan.plain_text.lines().count());

        let created = self.api.create_document(title).await?;
        tracing::info!(
            document_id = %created.document_id,
            "Created document with title: {}",
            created.title
        );

        if plan.is_empty() {
            tracing::warn!("Markup is empty, leaving the document blank");
        } else {
            if let Err(e) = self
                .api
                .batch_update(&created.document_id, &plan.requests)
                .await
            {
                tracing::warn!(
                    "Document {} was created but filling it failed, it is left empty",
                    document_url(&created.document_id)
                );
                return Err(e);
            }
            tracing::info!("Added {} request(s) of formatted text to document", plan.len());
        }

        Ok(PublishedDocument {
            document_id: created.document_id,
            title: created.title,
            request_count: plan.len(),
        })
    }
}
