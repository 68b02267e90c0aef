// =============================================================================
// GOOGLE DOCS MODULE
// =============================================================================
//
// Everything that talks to Google lives here. The core layer only knows the
// `DocsApi` trait; this module provides the HTTP implementation of it and the
// token sources it authenticates with.
//
// **Authentication Options:**
// 1. **Installed-app OAuth** (default): the user consents in a browser and the
//    document is created in their Drive.
// 2. **Service Account**: no browser needed, but the document belongs to the
//    service account.

pub mod google_docs_client;
pub mod oauth_flow;
pub mod service_account;
pub mod token_source;

pub use google_docs_client::GoogleDocsClient;
pub use oauth_flow::InstalledAppAuth;
pub use service_account::ServiceAccountAuth;
pub use token_source::TokenSource;
