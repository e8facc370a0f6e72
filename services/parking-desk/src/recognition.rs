//! Plate recognition over the backend's detection endpoint

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::api::decode;
use crate::capture::Frame;
use crate::config::UploadMode;
use crate::io::HttpClient;
use crate::types::RecognitionResponse;
use crate::DeskError;

/// Turns a frame into a plate number
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Recognizer: Send + Sync {
    /// `Ok(None)` when the frame was processed but no plate was found
    async fn recognize(&self, frame: Frame) -> crate::Result<Option<String>>;
}

/// Recognizer backed by `POST /detect_license_plate` or `/yolo_plate_recognition`
pub struct HttpRecognizer {
    url: String,
    upload: UploadMode,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for HttpRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRecognizer")
            .field("url", &self.url)
            .field("upload", &self.upload)
            .finish()
    }
}

impl HttpRecognizer {
    pub fn new(url: impl Into<String>, upload: UploadMode, http: Arc<dyn HttpClient>) -> Self {
        Self {
            url: url.into(),
            upload,
            http,
        }
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(&self, frame: Frame) -> crate::Result<Option<String>> {
        let response = match self.upload {
            UploadMode::Json => {
                let body = json!({ "image": frame.to_data_url() });
                self.http.post_json(&self.url, &body).await?
            }
            UploadMode::Multipart => {
                let file_name = frame.file_name();
                self.http
                    .post_file(&self.url, "file", file_name, &frame.mime, frame.bytes)
                    .await?
            }
        };

        let parsed: RecognitionResponse = decode(response).map_err(|e| match e {
            DeskError::Server { status, message } => DeskError::Recognition(format!(
                "status {}: {}",
                status,
                message.unwrap_or_else(|| "no message".to_string())
            )),
            other => other,
        })?;

        Ok(parsed.plate().map(str::to_string))
    }
}
