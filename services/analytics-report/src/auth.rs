use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ReportError;
use shared::truncate_for_log;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are treated as already expired.
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Anything able to hand out a bearer token for the analytics API.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, ReportError>;
}

/// The subset of a Google service-account JSON key this service needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Invalid service account key {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let key: ServiceAccountKey =
            serde_json::from_str(raw).context("Failed to parse service account key JSON")?;

        if key.key_type != "service_account" {
            return Err(anyhow!(
                "Expected key of type \"service_account\", got \"{}\"",
                key.key_type
            ));
        }

        Ok(key)
    }
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: i64,
    pub obtained_at: i64,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let obtained_at =
            DateTime::from_timestamp_millis(self.obtained_at).unwrap_or(DateTime::UNIX_EPOCH);
        let expires_at = obtained_at + Duration::seconds(self.expires_in - EXPIRY_MARGIN_SECS);

        now >= expires_at
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Mints access tokens with the OAuth2 JWT-bearer grant and caches them until they
/// near expiry.
pub struct ServiceAccountAuth {
    client: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

impl ServiceAccountAuth {
    pub fn new(client: Client, key: ServiceAccountKey, scope: &str) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Service account private key is not a valid RSA PEM")?;

        Ok(Self {
            client,
            key,
            encoding_key,
            scope: scope.to_string(),
            cached: Mutex::new(None),
        })
    }

    pub fn from_file(client: Client, path: &Path, scope: &str) -> Result<Self> {
        let key = ServiceAccountKey::from_file(path)?;
        info!(
            "Loaded service account {} from {}",
            key.client_email,
            path.display()
        );
        Self::new(client, key, scope)
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn build_assertion(&self, now: DateTime<Utc>) -> Result<String, ReportError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| ReportError::Credential(format!("Failed to sign assertion: {}", e)))
    }

    async fn fetch_token(&self) -> Result<AccessToken, ReportError> {
        info!("Requesting access token for {}", self.key.client_email);

        let assertion = self.build_assertion(Utc::now())?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| ReportError::Credential(format!("Token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReportError::Credential(format!(
                "Token endpoint returned HTTP {}: {}",
                status,
                truncate_for_log(&error_text, 512)
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ReportError::Credential(format!("Invalid token response: {}", e)))?;

        Ok(AccessToken {
            access_token: token_response.access_token,
            expires_in: token_response.expires_in,
            obtained_at: Utc::now().timestamp_millis(),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, ReportError> {
        // Held across the refresh so concurrent requests wait for a single token fetch.
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
            debug!("Access token near expiry, refreshing");
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);

        Ok(access_token)
    }
}
