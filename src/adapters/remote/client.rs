//! HTTP client for the remote data service
//!
//! Implements both [`ExportService`] and [`ChangesetFeed`] with `reqwest`. Every
//! request carries the static API key as `Authorization: key <api_key>`.

use crate::adapters::remote::models::{ChangesetQuery, ExportRequest, ExportStatus, ExportValidation};
use crate::adapters::remote::traits::{ChangesetFeed, ExportService};
use crate::config::{SecretString, ServiceConfig};
use crate::domain::{GeosyncError, JobId, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Remote data service client
///
/// # Example
///
/// ```no_run
/// use geosync::adapters::remote::DataServiceClient;
/// use geosync::config::{secret_string, ServiceConfig};
///
/// # fn example() -> geosync::domain::Result<()> {
/// let mut service = ServiceConfig::default();
/// service.api_key = Some(secret_string("my-key".to_string()));
/// let client = DataServiceClient::new(&service)?;
/// # let _ = client;
/// # Ok(())
/// # }
/// ```
pub struct DataServiceClient {
    client: Client,
    api_base_url: String,
    feed_url: String,
    api_key: SecretString,
}

impl DataServiceClient {
    /// Creates a client from the service configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no API key is configured, a proxy
    /// URL is invalid, or the HTTP client cannot be built.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.clone();

        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("geosync/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = config.http_proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            builder = builder.proxy(reqwest::Proxy::http(proxy).map_err(|e| {
                GeosyncError::Configuration(format!("Invalid HTTP proxy '{proxy}': {e}"))
            })?);
        }
        if let Some(proxy) = config.https_proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            builder = builder.proxy(reqwest::Proxy::https(proxy).map_err(|e| {
                GeosyncError::Configuration(format!("Invalid HTTPS proxy '{proxy}': {e}"))
            })?);
        }

        let client = builder.build().map_err(|e| {
            GeosyncError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            feed_url: config.feed_url.clone(),
            api_key,
        })
    }

    fn exports_url(&self) -> String {
        format!("{}/exports/", self.api_base_url)
    }

    fn status_url(&self, id: &JobId) -> String {
        format!("{}/exports/{}/", self.api_base_url, id)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(
            AUTHORIZATION,
            format!("key {}", self.api_key.expose_secret().as_str()),
        )
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        self.authorized(request)
            .send()
            .await
            .map_err(|e| GeosyncError::transport(format!("{what} failed: {e}")))
    }

    /// Reads a JSON body, turning error statuses and non-JSON bodies into
    /// retrieval errors that keep the raw text
    async fn json_body(response: Response, what: &str) -> Result<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GeosyncError::transport(format!("{what}: failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(GeosyncError::retrieval(
                format!("{what} returned HTTP {status}"),
                text,
            ));
        }
        serde_json::from_str(&text).map_err(|e| {
            GeosyncError::retrieval(format!("{what} returned invalid JSON: {e}"), text)
        })
    }

    /// Streams a successful response body to `dest` through a `.part` file
    async fn stream_to_file(response: Response, dest: &Path, what: &str) -> Result<u64> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeosyncError::retrieval(
                format!("{what} returned HTTP {status}"),
                body,
            ));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = dest.with_extension("part");
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut response = response;
        let mut written = 0u64;
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(GeosyncError::transport(format!("{what} interrupted: {e}")));
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&partial, dest).await?;
        Ok(written)
    }
}

#[async_trait]
impl ExportService for DataServiceClient {
    async fn validate_export(&self, request: &ExportRequest) -> Result<()> {
        let url = format!("{}validate/", self.exports_url());
        let response = self
            .send(self.client.post(&url).json(request), "Export validation")
            .await?;
        let body = Self::json_body(response, "Export validation").await?;
        let validation: ExportValidation = serde_json::from_value(body.clone()).map_err(|e| {
            GeosyncError::retrieval(
                format!("Export validation response not understood: {e}"),
                body.to_string(),
            )
        })?;
        if validation.invalid_items().next().is_some() {
            return Err(GeosyncError::retrieval(
                "Export request rejected by validation; see invalid_reasons",
                body.to_string(),
            ));
        }
        tracing::debug!("Export parameters passed validation");
        Ok(())
    }

    async fn create_export(&self, request: &ExportRequest) -> Result<ExportStatus> {
        let response = self
            .send(self.client.post(self.exports_url()).json(request), "Export request")
            .await?;
        let body = Self::json_body(response, "Export request").await?;
        ExportStatus::from_json(&body).ok_or_else(|| {
            GeosyncError::retrieval("Export response has no job id", body.to_string())
        })
    }

    async fn export_status(&self, id: &JobId) -> Result<ExportStatus> {
        let what = format!("Status check for export {id}");
        let response = self.send(self.client.get(self.status_url(id)), &what).await?;
        let body = Self::json_body(response, &what).await?;
        ExportStatus::from_json(&body).ok_or_else(|| {
            GeosyncError::retrieval(format!("{what}: response has no job id"), body.to_string())
        })
    }

    async fn download_export(&self, status: &ExportStatus, dest: &Path) -> Result<u64> {
        let url = status
            .download_url
            .clone()
            .unwrap_or_else(|| format!("{}download/", self.status_url(&status.id)));
        let what = format!("Download of export {}", status.id);
        let response = self.send(self.client.get(&url), &what).await?;
        Self::stream_to_file(response, dest, &what).await
    }
}

#[async_trait]
impl ChangesetFeed for DataServiceClient {
    async fn fetch_changeset(&self, query: &ChangesetQuery, dest: &Path) -> Result<u64> {
        let params = query.to_params();
        tracing::debug!(url = %self.feed_url, ?params, "Requesting changeset");
        let response = self
            .send(self.client.get(&self.feed_url).query(&params), "Changeset request")
            .await?;
        Self::stream_to_file(response, dest, "Changeset request").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::remote::models::RequestConstraint;
    use crate::config::secret_string;
    use crate::domain::LayerId;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> DataServiceClient {
        let mut config = ServiceConfig::default();
        config.api_base_url = format!("{}/api/", server.url());
        config.feed_url = format!("{}/wfs", server.url());
        config.api_key = Some(secret_string("test-key".to_string()));
        DataServiceClient::new(&config).unwrap()
    }

    fn request() -> ExportRequest {
        ExportRequest::new("https://x/api", &LayerId::new("50772").unwrap(), 2193, "f", None)
    }

    #[test]
    fn test_client_requires_api_key() {
        let err = DataServiceClient::new(&ServiceConfig::default()).err().unwrap();
        assert!(matches!(err, GeosyncError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_create_export_sends_key_and_reads_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/exports/")
            .match_header("authorization", "key test-key")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 901, "state": "processing", "progress": 0.0}"#)
            .create_async()
            .await;

        let status = client_for(&server).create_export(&request()).await.unwrap();
        assert_eq!(status.id.as_str(), "901");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_validation_rejection_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/exports/validate/")
            .with_status(200)
            .with_body(r#"{"items": [{"is_valid": false, "invalid_reasons": ["extent too large"]}]}"#)
            .create_async()
            .await;

        let err = client_for(&server).validate_export(&request()).await.unwrap_err();
        assert!(matches!(err, GeosyncError::Retrieval { .. }));
        assert!(err.raw_body().unwrap().contains("extent too large"));
    }

    #[tokio::test]
    async fn test_status_error_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/exports/901/")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let err = client_for(&server)
            .export_status(&JobId::new("901").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.raw_body(), Some("upstream exploded"));
    }

    #[tokio::test]
    async fn test_download_falls_back_to_status_url() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/exports/901/download/")
            .with_status(200)
            .with_body("PK-archive-bytes")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("full").join("layer.zip");
        let status = ExportStatus::from_json(&serde_json::json!({"id": 901, "state": "complete"})).unwrap();
        let written = client_for(&server).download_export(&status, &dest).await.unwrap();
        assert_eq!(written, 16);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "PK-archive-bytes");
        assert!(!dest.with_extension("part").exists());
    }

    #[tokio::test]
    async fn test_fetch_changeset_sends_window_and_filter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/wfs")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("typeNames".into(), "layer-50772-changeset".into()),
                Matcher::UrlEncoded(
                    "viewparams".into(),
                    "from:2024-06-20T01:00:00Z;to:2024-06-20T02:00:00Z".into(),
                ),
                Matcher::UrlEncoded("cql_filter".into(), "status='current'".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"type":"FeatureCollection","numberReturned":0,"features":[]}"#)
            .create_async()
            .await;

        let query = ChangesetQuery {
            layer: LayerId::new("50772").unwrap(),
            wkid: 2193,
            from: Utc.with_ymd_and_hms(2024, 6, 20, 1, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 6, 20, 2, 0, 0).unwrap(),
            constraint: RequestConstraint::Filter("status='current'".to_string()),
        };
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("changeset.json");
        client_for(&server).fetch_changeset(&query, &dest).await.unwrap();

        mock.assert_async().await;
        assert!(std::fs::read_to_string(&dest).unwrap().contains("FeatureCollection"));
    }
}
