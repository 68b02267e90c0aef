// This is the entry point of md2gdoc.
//
// **Architecture Overview:**
// - `core/` = Markup classification and request building (no I/O)
// - `infra/` = Google Docs HTTP client, authentication, file reading
//
// This file's job is to:
// 1. Load configuration (.env, flags, environment)
// 2. Read the markup
// 3. Wire the API client into the publish service
// 4. Report the document URL

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::core::docs::{plan_document, BatchUpdateBody, PublishService};
use crate::infra::google_docs::{
    GoogleDocsClient, InstalledAppAuth, ServiceAccountAuth, TokenSource,
};
use crate::infra::markup::MarkupReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AuthMode {
    /// Browser consent as the current user
    Oauth,
    /// Service account key, no browser
    ServiceAccount,
}

#[derive(Debug, Parser)]
#[command(name = "md2gdoc")]
#[command(version)]
#[command(about = "Recreate a Markdown file's formatting in a new Google Doc", long_about = None)]
struct Cli {
    /// Markdown file to convert (the bundled sample notes if omitted)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Title of the new document
    #[arg(long, env = "MD2GDOC_TITLE", default_value = "AnsibleHealthTest")]
    title: String,

    /// OAuth client secrets downloaded from the Cloud console
    #[arg(long, env = "GOOGLE_CLIENT_SECRETS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Local port for the OAuth redirect
    #[arg(long, env = "MD2GDOC_REDIRECT_PORT", default_value_t = 9000)]
    port: u16,

    /// How to authenticate against the Docs API
    #[arg(long, value_enum, env = "MD2GDOC_AUTH", default_value = "oauth")]
    auth: AuthMode,

    /// Service account JSON key (for --auth service-account)
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_KEY")]
    service_account: Option<PathBuf>,

    /// Print the batchUpdate body instead of calling the API
    #[arg(long)]
    dry_run: bool,
}

async fn token_source(cli: &Cli) -> anyhow::Result<Box<dyn TokenSource>> {
    match cli.auth {
        AuthMode::Oauth => {
            let auth = InstalledAppAuth::from_file(&cli.credentials, cli.port)
                .await
                .with_context(|| {
                    format!(
                        "Could not load OAuth client from {}",
                        cli.credentials.display()
                    )
                })?;
            Ok(Box::new(auth))
        }
        AuthMode::ServiceAccount => {
            let path = cli.service_account.as_deref().context(
                "--service-account (or GOOGLE_SERVICE_ACCOUNT_KEY) is required for service account auth",
            )?;
            let auth = ServiceAccountAuth::from_file(path)
                .await
                .with_context(|| format!("Could not load service account key {}", path.display()))?;
            tracing::info!("Authenticating as service account {}", auth.client_email());
            Ok(Box::new(auth))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists) before flags
    // fall back to them.
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr so --dry-run output stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let markup = match &cli.input {
        Some(path) => MarkupReader::read(path).await?,
        None => {
            tracing::info!("No input file given, using the bundled sample notes");
            MarkupReader::sample().to_string()
        }
    };

    if cli.dry_run {
        let plan = plan_document(&markup);
        let body = BatchUpdateBody {
            requests: &plan.requests,
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let client = GoogleDocsClient::new(token_source(&cli).await?);
    let service = PublishService::new(client);

    let published = service
        .publish(&cli.title, &markup)
        .await
        .context("Failed to publish document")?;

    println!(
        "Created \"{}\" with {} formatting request(s): {}",
        published.title,
        published.request_count,
        published.url()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["md2gdoc", "notes.md"]).unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("notes.md")));
        assert_eq!(cli.auth, AuthMode::Oauth);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_service_account_mode() {
        let cli = Cli::try_parse_from([
            "md2gdoc",
            "--auth",
            "service-account",
            "--service-account",
            "key.json",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.auth, AuthMode::ServiceAccount);
        assert_eq!(cli.service_account, Some(PathBuf::from("key.json")));
        assert!(cli.input.is_none());
        assert!(cli.dry_run);
    }
}
