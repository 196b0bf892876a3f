//! Google service-account authentication shared by the Sheets and Drive
//! clients.
//!
//! A signed RS256 assertion is exchanged at the account's `token_uri` for a
//! short-lived access token, which is cached until shortly before it expires.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// OAuth scopes needed by the tabular store and file storage.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh this many seconds before the token expires.
const REFRESH_MARGIN_SECS: u64 = 60;

/// The fields of a service-account key file this crate uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccount {
    /// Load a service-account key file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read service account file {}: {}", path.display(), e)
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let account: ServiceAccount = serde_json::from_str(json)
            .map_err(|e| anyhow::anyhow!("Invalid service account JSON: {}", e))?;
        if account.client_email.is_empty() || account.private_key.is_empty() {
            anyhow::bail!("Service account JSON is missing client_email or private_key");
        }
        Ok(account)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Access-token source for Google REST APIs.
pub struct GoogleAuth {
    client: Client,
    account: ServiceAccount,
    key: EncodingKey,
    token: RwLock<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn new(account: ServiceAccount) -> anyhow::Result<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid service account private key: {}", e))?;
        Ok(Self {
            client: Client::new(),
            account,
            key,
            token: RwLock::new(None),
        })
    }

    /// Auth that always hands out `token`, for clients pointed at a local server.
    #[cfg(test)]
    pub(crate) fn with_token(token: &str) -> Self {
        Self {
            client: Client::new(),
            account: ServiceAccount {
                client_email: "tests@localhost".to_string(),
                private_key: String::new(),
                token_uri: DEFAULT_TOKEN_URI.to_string(),
            },
            key: EncodingKey::from_secret(b"unused"),
            token: RwLock::new(Some(CachedToken {
                value: token.to_string(),
                refresh_at: Instant::now() + std::time::Duration::from_secs(3600),
            })),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.account.client_email
    }

    /// Build the signed JWT assertion for the token exchange.
    fn assertion(&self) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: SCOPES.join(" "),
            aud: &self.account.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.key,
        )?)
    }

    /// Return a valid access token, exchanging a new assertion if needed.
    pub async fn access_token(&self) -> anyhow::Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(token) = slot.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.assertion()?;
        let resp = self
            .client
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("Failed to obtain Google access token: {} - {}", status, text);
        }

        let parsed: TokenResponse = serde_json::from_str(&text)?;
        let lifetime = parsed.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64);
        let refresh_in = lifetime.saturating_sub(REFRESH_MARGIN_SECS);
        tracing::debug!(
            "Obtained Google access token for {} (valid {}s)",
            self.account.client_email,
            lifetime
        );

        *slot = Some(CachedToken {
            value: parsed.access_token.clone(),
            refresh_at: Instant::now() + std::time::Duration::from_secs(refresh_in),
        });
        Ok(parsed.access_token)
    }
}
