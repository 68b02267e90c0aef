// =============================================================================
// GOOGLE DOCS CLIENT
// =============================================================================
//
// Thin REST client for the two Docs API calls the pipeline makes:
//
// - `POST /v1/documents`                    create an empty document
// - `POST /v1/documents/{id}:batchUpdate`   apply the built requests in order
//
// Authentication is delegated to a `TokenSource` (installed-app OAuth or a
// service account). Errors from Google come back as a JSON envelope
// (`{"error": {"code", "message", "status"}}`); the message is surfaced as-is.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;

use super::token_source::TokenSource;
use crate::core::docs::{BatchUpdateBody, CreatedDocument, DocsApi, DocsError, Request};

const DOCS_API_BASE: &str = "https://docs.googleapis.com/v1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocumentResponse {
    document_id: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
}

/// Pulls `error.message` out of a Google error body, falling back to the raw text.
fn google_error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn transport(err: reqwest::Error) -> DocsError {
    DocsError::Transport(err.to_string())
}

pub struct GoogleDocsClient {
    client: Client,
    base_url: String,
    auth: Box<dyn TokenSource>,
}

impl GoogleDocsClient {
    pub fn new(auth: Box<dyn TokenSource>) -> Self {
        Self {
            client: Client::new(),
            base_url: DOCS_API_BASE.to_string(),
            auth,
        }
    }

    /// Points the client at another API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post_json(
        &self,
        url: &str,
        body: &impl serde::Serialize,
    ) -> Result<Response, DocsError> {
        let token = self.auth.access_token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.map_err(transport)?;
            return Err(DocsError::Api {
                status,
                message: google_error_message(&text),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl DocsApi for GoogleDocsClient {
    async fn create_document(&self, title: &str) -> Result<CreatedDocument, DocsError> {
        let url = format!("{}/documents", self.base_url);
        tracing::debug!("Creating Google Doc titled '{}'", title);

        let response = self.post_json(&url, &json!({ "title": title })).await?;
        let created: CreateDocumentResponse = response.json().await.map_err(transport)?;

        let document_id = created.document_id.ok_or(DocsError::MissingDocumentId)?;
        Ok(CreatedDocument {
            document_id,
            title: created.title.unwrap_or_else(|| title.to_string()),
        })
    }

    async fn batch_update(&self, document_id: &str, requests: &[Request]) -> Result<(), DocsError> {
        let url = format!("{}/documents/{}:batchUpdate", self.base_url, document_id);
        tracing::debug!(
            "Sending batchUpdate with {} request(s) to {}",
            requests.len(),
            document_id
        );

        let response = self
            .post_json(&url, &BatchUpdateBody { requests })
            .await?;
        let update: BatchUpdateResponse = response.json().await.map_err(transport)?;

        tracing::debug!("batchUpdate returned {} replies", update.replies.len());
        Ok(())
    }
}
