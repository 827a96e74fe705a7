//! Service-account OAuth for the Sheets API.
//!
//! An RS256 JWT assertion signed with the key file's private key is exchanged
//! at the key's token URI for a bearer token, which is cached until shortly
//! before it expires.

use std::path::Path;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::SheetsError;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const ASSERTION_TTL_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 120;

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

struct CachedToken {
    token: String,
    expires_at: i64,
}

pub struct ServiceAccountAuth {
    client_email: String,
    token_uri: String,
    key: EncodingKey,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn from_file(path: &Path) -> Result<Self, SheetsError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            SheetsError::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&data)
    }

    fn from_json(data: &str) -> Result<Self, SheetsError> {
        let sa: ServiceAccountKey = serde_json::from_str(data)
            .map_err(|e| SheetsError::Credentials(format!("invalid service account JSON: {e}")))?;
        let key = EncodingKey::from_rsa_pem(sa.private_key.as_bytes())
            .map_err(|e| SheetsError::Credentials(format!("invalid private key: {e}")))?;

        Ok(Self {
            client_email: sa.client_email,
            token_uri: sa.token_uri,
            key,
            cached: RwLock::new(None),
        })
    }

    fn claims(&self, now: i64) -> AssertionClaims {
        AssertionClaims {
            iss: self.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        }
    }

    /// Returns a valid bearer token, exchanging a fresh assertion when needed.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String, SheetsError> {
        let now = chrono::Utc::now().timestamp();
        {
            let cached = self.cached.read().await;
            if let Some(c) = cached.as_ref() {
                if now + REFRESH_MARGIN_SECS < c.expires_at {
                    return Ok(c.token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        let fresh = self.exchange(client, now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn exchange(&self, client: &reqwest::Client, now: i64) -> Result<CachedToken, SheetsError> {
        info!(client_email = %self.client_email, "Exchanging service account assertion for access token");

        let assertion = encode(&Header::new(Algorithm::RS256), &self.claims(now), &self.key)
            .map_err(|e| SheetsError::Credentials(format!("signing assertion failed: {e}")))?;

        let resp = client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SheetsError::Api {
                status: status.as_u16(),
                message: format!("token exchange failed: {text}"),
            });
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SheetsError::Parse(e.to_string()))?;
        debug!(expires_in = body.expires_in, "Access token obtained");

        Ok(CachedToken {
            token: body.access_token,
            expires_at: now + body.expires_in,
        })
    }
}
