//! XRPC client for the `com.atproto.repo.*` record operations.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use ringlet_types::{AtUri, Did};

use crate::{PdsError, RepoRecord, RepoStore, Result};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct PdsConfig {
    /// Bounded per-request timeout. A hung repository must not stall the
    /// caller indefinitely.
    pub request_timeout: Duration,
    /// Page size for listRecords.
    pub page_size: u32,
}

impl Default for PdsConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            page_size: 100,
        }
    }
}

/// HTTP client for one repository service host.
pub struct PdsClient {
    service_url: String,
    config: PdsConfig,
    token: Option<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    records: Vec<WireRecord>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    uri: String,
    cid: Option<String>,
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

impl PdsClient {
    /// Create a client for the given service URL (e.g. `https://pds.example`).
    pub fn new(service_url: &str) -> Result<Self> {
        Self::with_config(service_url, PdsConfig::default())
    }

    pub fn with_config(service_url: &str, config: PdsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("ringlet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PdsError::Unavailable(e.to_string()))?;
        Ok(Self {
            service_url: service_url.trim_end_matches('/').to_string(),
            config,
            token: None,
            http,
        })
    }

    /// Attach a bearer token for write operations.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}/xrpc/{nsid}", self.service_url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PdsError::NotFound);
        }
        // XRPC reports missing records as 400 with a RecordNotFound error body
        if status == reqwest::StatusCode::BAD_REQUEST {
            if let Ok(body) = response.json::<serde_json::Value>().await {
                if body.get("error").and_then(|e| e.as_str()) == Some("RecordNotFound") {
                    return Err(PdsError::NotFound);
                }
            }
            return Err(PdsError::Status(400));
        }
        Err(PdsError::Status(status.as_u16()))
    }

    fn wire_error(e: reqwest::Error) -> PdsError {
        if e.is_timeout() {
            PdsError::Timeout
        } else {
            PdsError::Unavailable(e.to_string())
        }
    }

    fn parse_record(wire: WireRecord) -> Result<RepoRecord> {
        let uri = wire
            .uri
            .parse::<AtUri>()
            .map_err(|e| PdsError::InvalidResponse(e.to_string()))?;
        Ok(RepoRecord {
            uri,
            cid: wire.cid,
            value: wire.value,
        })
    }
}

#[async_trait]
impl RepoStore for PdsClient {
    async fn list_records(&self, repo: &Did, collection: &str) -> Result<Vec<RepoRecord>> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(self.endpoint("com.atproto.repo.listRecords"))
                .query(&[
                    ("repo", repo.as_str()),
                    ("collection", collection),
                    ("limit", &self.config.page_size.to_string()),
                ]);
            if let Some(ref c) = cursor {
                req = req.query(&[("cursor", c.as_str())]);
            }

            let response = self
                .authorize(req)
                .send()
                .await
                .map_err(Self::wire_error)?;
            let page: ListRecordsResponse = self
                .check(response)
                .await?
                .json()
                .await
                .map_err(|e| PdsError::InvalidResponse(e.to_string()))?;

            let page_len = page.records.len();
            for wire in page.records {
                records.push(Self::parse_record(wire)?);
            }

            cursor = page.cursor;
            if cursor.is_none() || page_len == 0 {
                break;
            }
        }

        debug!(repo = %repo, collection, count = records.len(), "listed records");
        Ok(records)
    }

    async fn get_record(&self, uri: &AtUri) -> Result<Option<RepoRecord>> {
        let req = self
            .http
            .get(self.endpoint("com.atproto.repo.getRecord"))
            .query(&[
                ("repo", uri.authority().as_str()),
                ("collection", uri.collection()),
                ("rkey", uri.rkey()),
            ]);

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(Self::wire_error)?;
        match self.check(response).await {
            Ok(ok) => {
                let wire: WireRecord = ok
                    .json()
                    .await
                    .map_err(|e| PdsError::InvalidResponse(e.to_string()))?;
                Ok(Some(Self::parse_record(wire)?))
            }
            Err(PdsError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_record(
        &self,
        repo: &Did,
        collection: &str,
        value: serde_json::Value,
    ) -> Result<AtUri> {
        let req = self
            .http
            .post(self.endpoint("com.atproto.repo.createRecord"))
            .json(&serde_json::json!({
                "repo": repo.as_str(),
                "collection": collection,
                "record": value,
            }));

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(Self::wire_error)?;
        let created: CreateRecordResponse = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| PdsError::InvalidResponse(e.to_string()))?;
        created
            .uri
            .parse()
            .map_err(|e: ringlet_types::UriError| PdsError::InvalidResponse(e.to_string()))
    }

    async fn put_record(&self, uri: &AtUri, value: serde_json::Value) -> Result<()> {
        let req = self
            .http
            .post(self.endpoint("com.atproto.repo.putRecord"))
            .json(&serde_json::json!({
                "repo": uri.authority().as_str(),
                "collection": uri.collection(),
                "rkey": uri.rkey(),
                "record": value,
            }));

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(Self::wire_error)?;
        self.check(response).await?;
        Ok(())
    }

    async fn delete_record(&self, uri: &AtUri) -> Result<()> {
        let req = self
            .http
            .post(self.endpoint("com.atproto.repo.deleteRecord"))
            .json(&serde_json::json!({
                "repo": uri.authority().as_str(),
                "collection": uri.collection(),
                "rkey": uri.rkey(),
            }));

        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(Self::wire_error)?;
        match self.check(response).await {
            // Deleting an absent record is a no-op
            Ok(_) | Err(PdsError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_formatting() {
        let client = PdsClient::new("https://pds.example/").expect("client");
        assert_eq!(
            client.endpoint("com.atproto.repo.listRecords"),
            "https://pds.example/xrpc/com.atproto.repo.listRecords"
        );
    }

    #[test]
    fn test_default_timeout_is_bounded() {
        let config = PdsConfig::default();
        assert!(config.request_timeout <= Duration::from_secs(10));
    }

    #[test]
    fn test_with_config_keeps_requested_timeout() {
        let config = PdsConfig {
            request_timeout: Duration::from_secs(3),
            page_size: 25,
        };
        let client = PdsClient::with_config("https://pds.example", config).expect("client");
        assert_eq!(client.config.request_timeout, Duration::from_secs(3));
        assert_eq!(client.config.page_size, 25);
    }

    #[test]
    fn test_parse_record_rejects_bad_uri() {
        let wire = WireRecord {
            uri: "https://not-an-at-uri".to_string(),
            cid: None,
            value: serde_json::json!({}),
        };
        assert!(matches!(
            PdsClient::parse_record(wire),
            Err(PdsError::InvalidResponse(_))
        ));
    }
}
