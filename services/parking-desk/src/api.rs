//! Typed client for the parking backend HTTP API

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::BackendConfig;
use crate::io::{HttpClient, HttpResponse};
use crate::types::{
    ExitResponse, FeeEstimate, FoundRecord, MessageResponse, Record, Space,
};
use crate::DeskError;

/// Client for the parking backend
pub struct BackendApi {
    base_url: String,
    records_path: String,
    spaces_path: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for BackendApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendApi")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BackendApi {
    pub fn new(config: &BackendConfig, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created BackendApi at {}", config.base());
        Self {
            base_url: config.base().to_string(),
            records_path: config.records_path.clone(),
            spaces_path: config.spaces_path.clone(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Full records snapshot
    pub async fn records(&self) -> crate::Result<Vec<Record>> {
        let response = self.http.get(&self.url(&self.records_path)).await?;
        decode(response)
    }

    /// Full parking spaces snapshot
    pub async fn spaces(&self) -> crate::Result<Vec<Space>> {
        let response = self.http.get(&self.url(&self.spaces_path)).await?;
        decode(response)
    }

    pub async fn entry(&self, plate: &str) -> crate::Result<MessageResponse> {
        let response = self
            .http
            .post_json(&self.url("/entry"), &json!({ "plate_number": plate }))
            .await?;
        decode(response)
    }

    pub async fn entry_at_space(&self, space_id: u64, plate: &str) -> crate::Result<MessageResponse> {
        let response = self
            .http
            .post_json(
                &self.url(&format!("/entry/{}", space_id)),
                &json!({ "plate_number": plate }),
            )
            .await?;
        decode(response)
    }

    pub async fn exit(&self, record_id: u64) -> crate::Result<ExitResponse> {
        let response = self
            .http
            .post_json(&self.url(&format!("/exit/{}", record_id)), &json!({}))
            .await?;
        decode(response)
    }

    pub async fn delete_record(&self, record_id: u64) -> crate::Result<MessageResponse> {
        let response = self
            .http
            .delete(&self.url(&format!("/delete_record/{}", record_id)))
            .await?;
        decode(response)
    }

    pub async fn toggle_charging(&self, space_id: u64) -> crate::Result<MessageResponse> {
        let response = self
            .http
            .post_json(&self.url(&format!("/toggle_charging/{}", space_id)), &json!({}))
            .await?;
        decode(response)
    }

    pub async fn toggle_occupied(
        &self,
        space_id: u64,
        plate: Option<&str>,
        occupied: bool,
    ) -> crate::Result<MessageResponse> {
        let response = self
            .http
            .post_json(
                &self.url(&format!("/toggle_occupied/{}", space_id)),
                &json!({ "plate_number": plate, "is_occupied": occupied }),
            )
            .await?;
        decode(response)
    }

    /// Id of the active record for `plate`
    pub async fn find_record(&self, plate: &str) -> crate::Result<u64> {
        let encoded = utf8_percent_encode(plate, NON_ALPHANUMERIC).to_string();
        let response = self
            .http
            .get(&self.url(&format!("/find_record/{}", encoded)))
            .await?;
        let found: FoundRecord = decode(response)?;
        Ok(found.record_id)
    }

    pub async fn calculate_fee(&self, plate: &str) -> crate::Result<FeeEstimate> {
        let response = self
            .http
            .post_json(&self.url("/calculate_fee"), &json!({ "plate_number": plate }))
            .await?;
        decode(response)
    }
}

/// Parse a 2xx body, or turn anything else into [`DeskError::Server`]
pub(crate) fn decode<T: DeserializeOwned>(response: HttpResponse) -> crate::Result<T> {
    if !response.is_success() {
        let message = serde_json::from_str::<MessageResponse>(&response.body)
            .ok()
            .and_then(|m| m.text().map(str::to_string));
        return Err(DeskError::Server {
            status: response.status,
            message,
        });
    }
    Ok(serde_json::from_str(&response.body)?)
}
