// =============================================================================
// INSTALLED-APP OAUTH FLOW
// =============================================================================
//
// Authenticates as the user running the tool, so the new document lands in
// their own Drive.
//
// **Flow:**
// 1. Read the OAuth client from `credentials.json` (downloaded from the Google
//    Cloud console as a "Desktop app" or "Web application" client).
// 2. Print the consent URL and listen on `http://localhost:<port>/`.
// 3. Google redirects the browser back with `?code=...&state=...`.
// 4. Exchange the code (plus the PKCE verifier) for an access token.
//
// The redirect URI `http://localhost:9000/` must be registered on the client.
// Tokens are only kept in memory for the lifetime of the process.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Client, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

use super::token_source::{
    read_token_response, AuthError, CachedToken, TokenResponse, TokenSource, DOCUMENTS_SCOPE,
};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const MAX_REQUEST_HEAD: usize = 8 * 1024;
/// Browsers open speculative connections that never send a request.
const CALLBACK_READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str =
    "The authentication flow has completed. You may close this window.";
const FAILURE_PAGE: &str = "Authorization failed. You may close this window.";

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// OAuth client settings from `credentials.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parses the console download, which nests the client under `installed` or `web`.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let file: ClientSecretsFile = serde_json::from_str(json)
            .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;

        file.installed.or(file.web).ok_or_else(|| {
            AuthError::InvalidCredentials(
                "expected an \"installed\" or \"web\" OAuth client".to_string(),
            )
        })
    }

    pub async fn from_file(path: &Path) -> Result<Self, AuthError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| AuthError::CredentialsFile {
                    path: path.display().to_string(),
                    source,
                })?;
        Self::from_json(&content)
    }
}

/// A fresh PKCE code verifier (64 unreserved characters).
pub fn pkce_verifier() -> String {
    random_token(64)
}

/// S256 challenge for a verifier: base64url(sha256(verifier)) without padding.
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn redirect_uri(port: u16) -> String {
    format!("http://localhost:{}/", port)
}

/// Consent-screen URL the user has to open.
pub fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    state: &str,
    code_challenge: &str,
) -> Result<Url, AuthError> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", DOCUMENTS_SCOPE),
            ("state", state),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
            ("access_type", "offline"),
        ],
    )
    .map_err(|e| AuthError::InvalidCredentials(format!("bad auth_uri: {}", e)))
}

/// What a request to the redirect listener turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    Error(String),
    StateMismatch,
    /// Something else, like the browser asking for `/favicon.ico`.
    Ignored,
}

/// Interprets the request target (`/?code=...&state=...`) of a redirect.
pub fn parse_callback(target: &str, expected_state: &str) -> CallbackOutcome {
    let Ok(url) = Url::parse("http://localhost").and_then(|base| base.join(target)) else {
        return CallbackOutcome::Ignored;
    };
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return CallbackOutcome::Error(error.clone());
    }
    let Some(code) = params.get("code") else {
        return CallbackOutcome::Ignored;
    };
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return CallbackOutcome::StateMismatch;
    }

    CallbackOutcome::Code(code.clone())
}

/// Reads the request head and returns the request target of the first line.
async fn read_request_target(stream: &mut TcpStream) -> Result<String, AuthError> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| AuthError::Callback(e.to_string()))?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") || head.len() >= MAX_REQUEST_HEAD {
            break;
        }
    }

    let head = String::from_utf8_lossy(&head);
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();
    Ok(target)
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<(), AuthError> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| AuthError::Callback(e.to_string()))?;
    let _ = stream.shutdown().await;
    Ok(())
}

/// Serves the redirect listener until Google calls back with a code or an error.
///
/// Connections that send nothing within `read_timeout` are dropped.
pub async fn wait_for_callback(
    listener: &TcpListener,
    expected_state: &str,
    read_timeout: Duration,
) -> Result<String, AuthError> {
    loop {
        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(|e| AuthError::Callback(e.to_string()))?;
        let target =
            match tokio::time::timeout(read_timeout, read_request_target(&mut stream)).await {
                Ok(target) => target?,
                Err(_) => {
                    tracing::debug!("Dropping idle connection from {} to redirect listener", peer);
                    continue;
                }
            };

        match parse_callback(&target, expected_state) {
            CallbackOutcome::Code(code) => {
                respond(&mut stream, "200 OK", SUCCESS_PAGE).await?;
                return Ok(code);
            }
            CallbackOutcome::Error(error) => {
                respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await?;
                return Err(AuthError::Denied(error));
            }
            CallbackOutcome::StateMismatch => {
                respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await?;
                return Err(AuthError::StateMismatch);
            }
            CallbackOutcome::Ignored => {
                tracing::warn!("Ignoring unrelated request to redirect listener: {}", target);
                respond(&mut stream, "404 Not Found", "").await?;
            }
        }
    }
}

struct UserTokens {
    access: CachedToken,
    refresh_token: Option<String>,
}

/// Token source that runs the browser consent flow on first use.
pub struct InstalledAppAuth {
    secrets: ClientSecrets,
    port: u16,
    client: Client,
    tokens: RwLock<Option<UserTokens>>,
}

impl InstalledAppAuth {
    pub fn new(secrets: ClientSecrets, port: u16) -> Self {
        Self {
            secrets,
            port,
            client: Client::new(),
            tokens: RwLock::new(None),
        }
    }

    pub async fn from_file(path: &Path, port: u16) -> Result<Self, AuthError> {
        let secrets = ClientSecrets::from_file(path).await?;
        Ok(Self::new(secrets, port))
    }

    fn client_form<'a>(&'a self, mut form: Vec<(&'a str, &'a str)>) -> Vec<(&'a str, &'a str)> {
        form.push(("client_id", self.secrets.client_id.as_str()));
        if let Some(secret) = &self.secrets.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        form
    }

    async fn run_consent_flow(&self) -> Result<TokenResponse, AuthError> {
        let listener = TcpListener::bind(("localhost", self.port))
            .await
            .map_err(|e| {
                AuthError::Callback(format!("cannot listen on port {}: {}", self.port, e))
            })?;

        let verifier = pkce_verifier();
        let state = random_token(32);
        let redirect = redirect_uri(self.port);
        let url = authorization_url(&self.secrets, &redirect, &state, &pkce_challenge(&verifier))?;

        println!("Please visit this URL to authorize this application: {}", url);
        tracing::info!("Waiting for the OAuth redirect on {}", redirect);

        let code = wait_for_callback(&listener, &state, CALLBACK_READ_TIMEOUT).await?;
        tracing::debug!("Received authorization code, exchanging it for a token");

        let form = self.client_form(vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect.as_str()),
            ("code_verifier", verifier.as_str()),
        ]);
        let response = self
            .client
            .post(&self.secrets.token_uri)
            .form(&form)
            .send()
            .await?;
        read_token_response(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let form = self.client_form(vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);
        let response = self
            .client
            .post(&self.secrets.token_uri)
            .form(&form)
            .send()
            .await?;
        read_token_response(response).await
    }
}

#[async_trait]
impl TokenSource for InstalledAppAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        {
            let tokens = self.tokens.read().await;
            if let Some(tokens) = tokens.as_ref() {
                if tokens.access.is_fresh() {
                    return Ok(tokens.access.token.clone());
                }
            }
        }

        let mut tokens = self.tokens.write().await;
        let previous_refresh = tokens.as_ref().and_then(|t| t.refresh_token.clone());

        let response = match &previous_refresh {
            Some(refresh_token) => match self.refresh(refresh_token).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Refreshing the access token failed, asking again: {}", e);
                    self.run_consent_flow().await?
                }
            },
            None => self.run_consent_flow().await?,
        };

        let access = CachedToken::from_response(&response);
        let token = access.token.clone();
        *tokens = Some(UserTokens {
            access,
            refresh_token: response.refresh_token.or(previous_refresh),
        });

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> ClientSecrets {
        ClientSecrets::from_json(
            r#"{
                "installed": {
                    "client_id": "123.apps.googleusercontent.com",
                    "client_secret": "shh",
                    "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                    "token_uri": "https://oauth2.googleapis.com/token",
                    "redirect_uris": ["http://localhost"]
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_client_secrets_installed_section() {
        let secrets = secrets();
        assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret.as_deref(), Some("shh"));
    }

    #[test]
    fn test_client_secrets_web_section_with_defaults() {
        let secrets = ClientSecrets::from_json(r#"{ "web": { "client_id": "abc" } }"#).unwrap();
        assert_eq!(secrets.client_id, "abc");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
        assert!(secrets.client_secret.is_none());
    }

    #[test]
    fn test_client_secrets_rejects_service_account_json() {
        let err = ClientSecrets::from_json(r#"{ "type": "service_account" }"#).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn test_client_secrets_missing_file() {
        let err = ClientSecrets::from_file(Path::new("does/not/exist/credentials.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CredentialsFile { .. }));
    }

    #[test]
    fn test_pkce_challenge_rfc7636_vector() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_pkce_verifier_shape() {
        let verifier = pkce_verifier();
        assert_eq!(verifier.len(), 64);
        assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(verifier, pkce_verifier());
    }

    #[test]
    fn test_authorization_url_params() {
        let url = authorization_url(&secrets(), &redirect_uri(9000), "st4te", "chall").unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert_eq!(params["redirect_uri"], "http://localhost:9000/");
        assert_eq!(params["scope"], DOCUMENTS_SCOPE);
        assert_eq!(params["state"], "st4te");
        assert_eq!(params["code_challenge"], "chall");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["response_type"], "code");
    }

    #[test]
    fn test_parse_callback_outcomes() {
        assert_eq!(
            parse_callback("/?state=abc&code=4%2F0Ab&scope=docs", "abc"),
            CallbackOutcome::Code("4/0Ab".to_string())
        );
        assert_eq!(
            parse_callback("/?state=abc&error=access_denied", "abc"),
            CallbackOutcome::Error("access_denied".to_string())
        );
        assert_eq!(
            parse_callback("/?state=evil&code=xyz", "abc"),
            CallbackOutcome::StateMismatch
        );
        assert_eq!(
            parse_callback("/favicon.ico", "abc"),
            CallbackOutcome::Ignored
        );
    }

    async fn send_request(addr: std::net::SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_wait_for_callback_skips_noise() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            let favicon = send_request(addr, "/favicon.ico").await;
            let redirect = send_request(addr, "/?state=s1&code=the-code").await;
            (favicon, redirect)
        });

        let code = wait_for_callback(&listener, "s1", CALLBACK_READ_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(code, "the-code");

        let (favicon, redirect) = browser.await.unwrap();
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(redirect.starts_with("HTTP/1.1 200"));
        assert!(redirect.contains(SUCCESS_PAGE));
    }

    #[tokio::test]
    async fn test_wait_for_callback_denied() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser =
            tokio::spawn(async move { send_request(addr, "/?state=s1&error=access_denied").await });

        let err = wait_for_callback(&listener, "s1", CALLBACK_READ_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Denied(ref reason) if reason == "access_denied"));
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 400"));
    }

    #[tokio::test]
    async fn test_wait_for_callback_drops_idle_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            // Preconnect that never sends a request line.
            let idle = TcpStream::connect(addr).await.unwrap();
            let redirect = send_request(addr, "/?state=s1&code=late-code").await;
            drop(idle);
            redirect
        });

        let code = tokio::time::timeout(
            Duration::from_secs(5),
            wait_for_callback(&listener, "s1", Duration::from_millis(100)),
        )
        .await
        .expect("listener stayed blocked on the idle connection")
        .unwrap();
        assert_eq!(code, "late-code");
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 200"));
    }
}
