// The infra module contains everything that performs I/O.
// - `google_docs/` talks to the Docs API and handles authentication.
// - `markup/` reads the input document from disk.

#[path = "google_docs/mod.rs"]
pub mod google_docs;

#[path = "markup/mod.rs"]
pub mod markup;
