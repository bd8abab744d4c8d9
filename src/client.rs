use std::path::Path;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};
use crate::metrics::{ReportRequest, ReportResponse};
use crate::models::{SiteConfig, TimeWindow};

pub const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DATA_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Credential exchange and report queries for one analytics provider.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn access_token(&self, site: &SiteConfig) -> ReportResult<String>;

    async fn run_report(
        &self,
        token: &str,
        property_id: &str,
        window: TimeWindow,
    ) -> ReportResult<ReportResponse>;
}

#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> ReportResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Credential(format!("cannot read key file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ReportError::Credential(format!("malformed key file {}: {e}", path.display()))
        })
    }

    /// Signed assertion for the OAuth JWT-bearer grant, valid for one hour.
    pub fn assertion(&self, scope: &str) -> ReportResult<String> {
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| ReportError::Credential(format!("invalid private key: {e}")))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| ReportError::Credential(format!("cannot sign assertion: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google Analytics Data API client authenticated with service-account keys.
#[derive(Clone)]
pub struct GoogleAnalyticsClient {
    client: Client,
    api_base: String,
}

impl GoogleAnalyticsClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            api_base: DATA_API_BASE.to_string(),
        }
    }

    fn report_url(&self, property_id: &str) -> String {
        format!("{}/properties/{}:runReport", self.api_base, property_id)
    }
}

impl Default for GoogleAnalyticsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyticsSource for GoogleAnalyticsClient {
    async fn access_token(&self, site: &SiteConfig) -> ReportResult<String> {
        let key = ServiceAccountKey::from_file(&site.key_file)?;
        let assertion = key.assertion(ANALYTICS_SCOPE)?;

        let resp = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| ReportError::Credential(format!("token request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReportError::Credential(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ReportError::Credential(format!("token response parse failed: {e}")))?;
        Ok(token.access_token)
    }

    async fn run_report(
        &self,
        token: &str,
        property_id: &str,
        window: TimeWindow,
    ) -> ReportResult<ReportResponse> {
        let request = ReportRequest::for_range(
            window.start_date.to_string(),
            window.end_date.to_string(),
        );

        let resp = self
            .client
            .post(self.report_url(property_id))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReportError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReportError::Transport(format!("status {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| ReportError::MalformedResponse(e.to_string()))
    }
}
