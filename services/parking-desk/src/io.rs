//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;

use crate::DeskError;

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request to the given URL
    async fn get(&self, url: &str) -> crate::Result<HttpResponse>;

    /// Send a GET request and return the raw body, failing on non-2xx
    async fn get_bytes(&self, url: &str) -> crate::Result<Vec<u8>>;

    /// Send a POST request with a JSON body
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> crate::Result<HttpResponse>;

    /// Send a POST request with a single multipart file part
    async fn post_file(
        &self,
        url: &str,
        field: &str,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> crate::Result<HttpResponse>;

    /// Send a DELETE request
    async fn delete(&self, url: &str) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
#[derive(Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeskError::Http(format!("Building HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn finish(method: &str, url: &str, response: reqwest::Response) -> crate::Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| DeskError::Http(format!("Reading response body: {}", e)))?;

        tracing::debug!("{} {} -> {} ({} bytes)", method, url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DeskError::Http(format!("GET {} failed: {}", url, e)))?;

        Self::finish("GET", url, response).await
    }

    async fn get_bytes(&self, url: &str) -> crate::Result<Vec<u8>> {
        tracing::debug!("GET {} (binary)", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DeskError::Http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(DeskError::Http(format!("GET {} returned status {}", url, status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DeskError::Http(format!("Reading response body: {}", e)))?;

        tracing::debug!("GET {} -> {} ({} bytes)", url, status, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> crate::Result<HttpResponse> {
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| DeskError::Http(format!("POST {} failed: {}", url, e)))?;

        Self::finish("POST", url, response).await
    }

    async fn post_file(
        &self,
        url: &str,
        field: &str,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> crate::Result<HttpResponse> {
        tracing::debug!("POST {} (multipart, {} bytes)", url, bytes.len());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| DeskError::Http(format!("Invalid MIME type {}: {}", mime, e)))?;
        let form = reqwest::multipart::Form::new().part(field.to_string(), part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeskError::Http(format!("POST {} failed: {}", url, e)))?;

        Self::finish("POST", url, response).await
    }

    async fn delete(&self, url: &str) -> crate::Result<HttpResponse> {
        tracing::debug!("DELETE {}", url);
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| DeskError::Http(format!("DELETE {} failed: {}", url, e)))?;

        Self::finish("DELETE", url, response).await
    }
}
