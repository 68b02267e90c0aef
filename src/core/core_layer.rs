// The core module contains the translation logic.
// Nothing in here performs I/O; the infra layer supplies the API client.

#[path = "markup/mod.rs"]
pub mod markup;

#[path = "docs/mod.rs"]
pub mod docs;
