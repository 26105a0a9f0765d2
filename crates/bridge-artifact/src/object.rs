//! Cloud object storage backend
//!
//! Speaks the plain HTTP object API shared by GCS and S3-compatible
//! endpoints: `PUT`/`HEAD` on `<endpoint>/<bucket>/<key>`. Objects are
//! written with a public-read ACL header; the bearer token used for writes
//! never leaves the backend.

use crate::backend::{ArtifactStore, StoredArtifact};
use crate::checksum::Checksum;
use crate::error::{StoreError, StoreErrorCode};
use crate::key::{check_key, public_url, ArtifactKey};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Default ACL header making uploaded documents publicly readable
pub const DEFAULT_ACL_HEADER: &str = "x-goog-acl: public-read";

/// Object storage bucket backend
#[derive(Debug, Clone)]
pub struct ObjectStore {
    endpoint: String,
    bucket: String,
    public_base_url: String,
    bearer_token: Option<String>,
    acl: Option<(HeaderName, HeaderValue)>,
    retry: RetryPolicy,
    client: Client,
}

impl ObjectStore {
    /// Backend for `bucket` at `endpoint`; public URLs default to `<endpoint>/<bucket>`
    ///
    /// # Errors
    /// Returns a validation error if the HTTP client cannot be built
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Result<Self, StoreError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let bucket = bucket.into().trim_matches('/').to_string();
        if bucket.is_empty() {
            return Err(StoreError::new(StoreErrorCode::Validation, "bucket name is empty"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::new(StoreErrorCode::Validation, e.to_string()))?;
        Ok(Self {
            public_base_url: format!("{endpoint}/{bucket}"),
            endpoint,
            bucket,
            bearer_token: None,
            acl: Some(parse_header(DEFAULT_ACL_HEADER)?),
            retry: RetryPolicy::default(),
            client,
        })
    }

    #[must_use]
    pub fn with_public_base_url(mut self, base: Option<String>) -> Self {
        if let Some(base) = base.filter(|b| !b.trim().is_empty()) {
            self.public_base_url = base.trim_end_matches('/').to_string();
        }
        self
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    /// ACL header as `name: value`; `None` sends no ACL header
    ///
    /// # Errors
    /// Returns a validation error if the header cannot be parsed
    pub fn with_acl_header(mut self, header: Option<&str>) -> Result<Self, StoreError> {
        self.acl = header.map(parse_header).transpose()?;
        Ok(self)
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, key: &ArtifactKey) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key.as_str())
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn put_once(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        let mut req = self
            .client
            .put(self.object_url(key))
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        if let Some((name, value)) = &self.acl {
            req = req.header(name.clone(), value.clone());
        }
        let resp = self.authorize(req).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(status_error("put", status, &body))
    }

    async fn head_once(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        let req = self.client.head(self.object_url(key));
        let resp = self.authorize(req).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(status_error("head", s, "")),
        }
    }
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), StoreError> {
    let invalid = || StoreError::new(StoreErrorCode::Validation, format!("invalid header: {raw:?}"));
    let (name, value) = raw.split_once(':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
    Ok((name, value))
}

fn status_error(op: &str, status: StatusCode, body: &str) -> StoreError {
    let code = match status {
        StatusCode::NOT_FOUND => StoreErrorCode::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreErrorCode::Permission,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => StoreErrorCode::Network,
        s if s.is_server_error() => StoreErrorCode::Network,
        _ => StoreErrorCode::Internal,
    };
    let detail: String = body.chars().take(200).collect();
    StoreError::new(code, format!("object {op} failed: {status} {detail}").trim_end().to_string())
}

/// Run `op` under the retry policy, retrying only retryable failures
async fn with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && policy.should_retry(attempt) => {
                let delay = policy.jittered_delay(attempt);
                tracing::warn!(
                    op = what,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "object storage request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[async_trait]
impl ArtifactStore for ObjectStore {
    async fn put(
        &self,
        key: &ArtifactKey,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredArtifact, StoreError> {
        check_key(key.as_str())?;
        with_retry(self.retry, "put", || self.put_once(key, bytes, content_type)).await?;
        let checksum = Checksum::of(bytes);
        tracing::debug!(
            %key,
            bucket = %self.bucket,
            size = bytes.len(),
            checksum = %checksum.short(),
            "artifact uploaded"
        );
        Ok(StoredArtifact {
            key: key.clone(),
            location: self.location(key),
            checksum,
            size: bytes.len() as u64,
            unchanged: false,
        })
    }

    async fn exists(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        check_key(key.as_str())?;
        with_retry(self.retry, "head", || self.head_once(key)).await
    }

    fn location(&self, key: &ArtifactKey) -> String {
        public_url(&self.public_base_url, key.as_str())
    }

    fn backend_name(&self) -> &'static str {
        "object"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_base_defaults_to_endpoint_and_bucket() {
        let store = ObjectStore::new("https://storage.googleapis.com/", "bridge-lead-pdfs").unwrap();
        let key = ArtifactKey::parse("lead_pdfs/2025/01/HI-2025-1_health_20250101.pdf").unwrap();
        assert_eq!(
            store.location(&key),
            "https://storage.googleapis.com/bridge-lead-pdfs/lead_pdfs/2025/01/HI-2025-1_health_20250101.pdf"
        );
        let cdn = store.with_public_base_url(Some("https://cdn.example.com/docs/".into()));
        assert_eq!(
            cdn.location(&key),
            "https://cdn.example.com/docs/lead_pdfs/2025/01/HI-2025-1_health_20250101.pdf"
        );
    }

    #[test]
    fn acl_header_parsing() {
        let (name, value) = parse_header("x-amz-acl: public-read").unwrap();
        assert_eq!(name.as_str(), "x-amz-acl");
        assert_eq!(value, "public-read");
        assert!(parse_header("no-colon").is_err());
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            status_error("put", StatusCode::FORBIDDEN, "").code,
            StoreErrorCode::Permission
        );
        assert!(status_error("put", StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(!status_error("put", StatusCode::BAD_REQUEST, "").is_retryable());
    }

    #[test]
    fn empty_bucket_rejected() {
        assert!(ObjectStore::new("http://localhost", "/").is_err());
    }
}
