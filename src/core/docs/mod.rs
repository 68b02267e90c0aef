pub mod docs_requests;
pub mod docs_service;
pub mod request_builder;

pub use docs_requests::{BatchUpdateBody, Request};
pub use docs_service::{plan_document, CreatedDocument, DocsApi, DocsError, PublishService};
