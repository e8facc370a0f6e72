//! Configuration types for the parking desk

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Parking backend HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// `/get_records` on the desk build of the backend, `/records` on the recognition build
    #[serde(default = "default_records_path")]
    pub records_path: String,
    /// `/get_spaces` or `/get_parking_spaces`
    #[serde(default = "default_spaces_path")]
    pub spaces_path: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            records_path: default_records_path(),
            spaces_path: default_spaces_path(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    /// Base URL without a trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Push channel (Socket.IO) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Channel endpoint; the backend base URL when unset
    #[serde(default)]
    pub channel_url: Option<String>,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_seconds: u64,
    /// Unlimited when unset
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_url: None,
            auto_reconnect: true,
            reconnect_interval_seconds: default_reconnect_interval(),
            max_retries: None,
            connection_timeout_seconds: default_connection_timeout(),
        }
    }
}

/// How captured frames are uploaded to the recognition endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// JSON body `{"image": "data:image/jpeg;base64,..."}`
    #[default]
    Json,
    /// Multipart form with a `file` part
    Multipart,
}

/// Where the recognition poller pulls frames from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureConfig {
    /// Camera exposing a still-image snapshot URL
    SnapshotUrl { url: String },
    /// Frame file continuously overwritten by an external grabber
    File { path: PathBuf },
}

/// Plate recognition poller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_recognition_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_recognition_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub upload: UploadMode,
    #[serde(default)]
    pub capture: Option<CaptureConfig>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_recognition_interval(),
            endpoint: default_recognition_endpoint(),
            upload: UploadMode::default(),
            capture: None,
        }
    }
}

/// Local dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_notice_history_size")]
    pub notice_history_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
            notice_history_size: default_notice_history_size(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_records_path() -> String {
    "/get_records".to_string()
}

fn default_spaces_path() -> String {
    "/get_spaces".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_reconnect_interval() -> u64 {
    5
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_recognition_interval() -> u64 {
    3000
}

fn default_recognition_endpoint() -> String {
    "/detect_license_plate".to_string()
}

fn default_dashboard_port() -> u16 {
    11120
}

fn default_notice_history_size() -> usize {
    50
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::DeskError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Reject settings the desk cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let base = self.backend.base();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(crate::DeskError::Validation(format!(
                "backend base_url must be an http(s) URL, got {:?}",
                self.backend.base_url
            )));
        }
        if self.recognition.interval_ms == 0 {
            return Err(crate::DeskError::Validation(
                "recognition interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.sync.connection_timeout_seconds == 0 {
            return Err(crate::DeskError::Validation(
                "sync connection_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "backend": {
                "base_url": "http://10.0.0.5:5000/",
                "records_path": "/records",
                "spaces_path": "/get_parking_spaces",
                "request_timeout_seconds": 3
            },
            "sync": {
                "enabled": true,
                "channel_url": "http://10.0.0.5:5001",
                "auto_reconnect": false,
                "reconnect_interval_seconds": 2,
                "max_retries": 4,
                "connection_timeout_seconds": 1
            },
            "recognition": {
                "enabled": true,
                "interval_ms": 1500,
                "endpoint": "/yolo_plate_recognition",
                "upload": "multipart",
                "capture": { "type": "snapshot_url", "url": "http://cam.local/snapshot.jpg" }
            },
            "dashboard": {
                "enabled": false,
                "port": 8088,
                "notice_history_size": 5
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.backend.base(), "http://10.0.0.5:5000");
        assert_eq!(config.backend.records_path, "/records");
        assert_eq!(config.backend.spaces_path, "/get_parking_spaces");
        assert_eq!(config.backend.request_timeout_seconds, 3);

        assert_eq!(
            config.sync.channel_url.as_deref(),
            Some("http://10.0.0.5:5001")
        );
        assert!(!config.sync.auto_reconnect);
        assert_eq!(config.sync.max_retries, Some(4));

        assert!(config.recognition.enabled);
        assert_eq!(config.recognition.interval_ms, 1500);
        assert_eq!(config.recognition.upload, UploadMode::Multipart);
        assert_eq!(
            config.recognition.capture,
            Some(CaptureConfig::SnapshotUrl {
                url: "http://cam.local/snapshot.jpg".to_string()
            })
        );

        assert!(!config.dashboard.enabled);
        assert_eq!(config.dashboard.port, 8088);
        assert_eq!(config.dashboard.notice_history_size, 5);
    }

    #[test]
    fn validate_rejects_unusable_settings() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.backend.base_url = "127.0.0.1:5000".to_string();
        assert!(matches!(
            config.validate(),
            Err(crate::DeskError::Validation(_))
        ));

        let mut config = Config::default();
        config.recognition.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desk.json");
        std::fs::write(&path, r#"{"backend": {"base_url": "ftp://nowhere"}}"#).unwrap();

        assert!(matches!(
            load_config(&path),
            Err(crate::DeskError::Validation(_))
        ));
    }

    #[test]
    fn parse_minimal_config() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.backend.records_path, "/get_records");
        assert_eq!(config.backend.spaces_path, "/get_spaces");
        assert!(config.sync.enabled);
        assert!(config.sync.auto_reconnect);
        assert_eq!(config.sync.max_retries, None);
        assert!(!config.recognition.enabled);
        assert_eq!(config.recognition.interval_ms, 3000);
        assert_eq!(config.recognition.endpoint, "/detect_license_plate");
        assert_eq!(config.recognition.upload, UploadMode::Json);
        assert!(config.recognition.capture.is_none());
        assert!(config.dashboard.enabled);
        assert_eq!(config.dashboard.port, 11120);
    }

    #[test]
    fn parse_file_capture() {
        let json = r#"{
            "recognition": {
                "capture": { "type": "file", "path": "/run/camera/latest.jpg" }
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.recognition.capture,
            Some(CaptureConfig::File {
                path: PathBuf::from("/run/camera/latest.jpg")
            })
        );
    }

    #[test]
    fn load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/desk.json"));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("desk.json");
        std::fs::write(
            &config_path,
            r#"{"backend": {"base_url": "http://parking.local"}}"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.backend.base_url, "http://parking.local");
    }

    #[test]
    fn load_config_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("desk.json");
        std::fs::write(&config_path, "not json").unwrap();

        assert!(load_config(&config_path).is_err());
    }
}
