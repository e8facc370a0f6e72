//! Frame sources for the recognition poller
//!
//! The poller only ever asks for the latest frame; where that frame comes
//! from (an IP camera snapshot URL, a file kept fresh by an external grabber,
//! a test double) is decided here.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::config::CaptureConfig;
use crate::io::HttpClient;
use crate::DeskError;

/// One encoded still image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Frame {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "image/jpeg".to_string(),
        }
    }

    /// `data:` URL carrying the frame as base64
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// File name to use for multipart uploads
    pub fn file_name(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "frame.png",
            _ => "frame.jpg",
        }
    }
}

/// Source of the most recent camera frame
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait FrameSource: Send + Sync {
    /// Acquire the source. Called once before polling starts.
    async fn open(&self) -> crate::Result<()>;

    /// Pull the latest available frame
    async fn latest_frame(&self) -> crate::Result<Frame>;
}

/// Camera exposing a still snapshot over HTTP
pub struct SnapshotUrlSource {
    url: String,
    http: Arc<dyn HttpClient>,
}

impl SnapshotUrlSource {
    pub fn new(url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }
}

#[async_trait]
impl FrameSource for SnapshotUrlSource {
    async fn open(&self) -> crate::Result<()> {
        tracing::debug!("Opening snapshot camera at {}", self.url);
        self.latest_frame().await.map(|_| ())
    }

    async fn latest_frame(&self) -> crate::Result<Frame> {
        let bytes = self
            .http
            .get_bytes(&self.url)
            .await
            .map_err(|e| DeskError::Capture(format!("{}: {}", self.url, e)))?;
        if bytes.is_empty() {
            return Err(DeskError::Capture(format!("{}: empty frame", self.url)));
        }
        Ok(Frame::jpeg(bytes))
    }
}

/// Frame file overwritten in place by an external capture process
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn mime(&self) -> &'static str {
        match self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("png") => "image/png",
            _ => "image/jpeg",
        }
    }
}

#[async_trait]
impl FrameSource for FileSource {
    async fn open(&self) -> crate::Result<()> {
        tracing::debug!("Opening frame file {:?}", self.path);
        tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| DeskError::Capture(format!("{:?}: {}", self.path, e)))?;
        Ok(())
    }

    async fn latest_frame(&self) -> crate::Result<Frame> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| DeskError::Capture(format!("{:?}: {}", self.path, e)))?;
        if bytes.is_empty() {
            return Err(DeskError::Capture(format!("{:?}: empty frame", self.path)));
        }
        Ok(Frame {
            bytes,
            mime: self.mime().to_string(),
        })
    }
}

/// Build the frame source described by `config`
pub fn build_frame_source(config: &CaptureConfig, http: Arc<dyn HttpClient>) -> Arc<dyn FrameSource> {
    match config {
        CaptureConfig::SnapshotUrl { url } => Arc::new(SnapshotUrlSource::new(url.clone(), http)),
        CaptureConfig::File { path } => Arc::new(FileSource::new(path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MockHttpClient;

    #[test]
    fn data_url_is_base64() {
        let frame = Frame::jpeg(vec![0xff, 0xd8, 0xff]);
        assert_eq!(frame.to_data_url(), "data:image/jpeg;base64,/9j/");
        assert_eq!(frame.file_name(), "frame.jpg");
    }

    #[tokio::test]
    async fn snapshot_source_returns_bytes() {
        let mut mock = MockHttpClient::new();
        mock.expect_get_bytes()
            .withf(|url| url.ends_with("/snapshot.jpg"))
            .returning(|_| Box::pin(async { Ok(vec![1, 2, 3]) }));

        let source = SnapshotUrlSource::new("http://cam.local/snapshot.jpg", Arc::new(mock));
        let frame = source.latest_frame().await.unwrap();
        assert_eq!(frame.bytes, vec![1, 2, 3]);
        assert_eq!(frame.mime, "image/jpeg");
    }

    #[tokio::test]
    async fn snapshot_source_rejects_empty_frame() {
        let mut mock = MockHttpClient::new();
        mock.expect_get_bytes()
            .returning(|_| Box::pin(async { Ok(Vec::new()) }));

        let source = SnapshotUrlSource::new("http://cam.local/snapshot.jpg", Arc::new(mock));
        let err = source.open().await.unwrap_err();
        assert!(matches!(err, DeskError::Capture(_)));
    }

    #[tokio::test]
    async fn snapshot_source_wraps_transport_errors() {
        let mut mock = MockHttpClient::new();
        mock.expect_get_bytes().returning(|_| {
            Box::pin(async { Err(DeskError::Http("connection refused".to_string())) })
        });

        let source = SnapshotUrlSource::new("http://cam.local/snapshot.jpg", Arc::new(mock));
        let err = source.latest_frame().await.unwrap_err();
        assert!(err.to_string().contains("connection refused"), "{err}");
    }

    #[tokio::test]
    async fn file_source_reads_latest_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.PNG");
        std::fs::write(&path, [9u8, 9, 9]).unwrap();

        let source = FileSource::new(&path);
        source.open().await.unwrap();
        let first = source.latest_frame().await.unwrap();
        assert_eq!(first.mime, "image/png");
        assert_eq!(first.file_name(), "frame.png");

        std::fs::write(&path, [7u8]).unwrap();
        let second = source.latest_frame().await.unwrap();
        assert_eq!(second.bytes, vec![7]);
    }

    #[tokio::test]
    async fn file_source_open_fails_when_missing() {
        let source = FileSource::new("/nonexistent/frame.jpg");
        assert!(matches!(source.open().await, Err(DeskError::Capture(_))));
    }
}
