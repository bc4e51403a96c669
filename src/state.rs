//! Application state
//!
//! Configuration from the environment and the composition root that owns
//! the single `DetectionService` instance.

use crate::alert_sound::{AlertSound, SilentSound, TerminalBell, ToneSpec};
use crate::api_client::HttpDetectionApi;
use crate::desktop_notifier::{LogNotifier, Permission};
use crate::detection_service::{Capabilities, DetectionService, DetectionServiceConfig};
use crate::error::{Error, Result};
use crate::frame_capture::{FrameGrabber, HttpFrameGrabber, NoFrame};
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Detection backend URL (serves /api/detection-status etc.)
    pub api_base_url: String,
    /// Live MJPEG stream or single-frame JPEG URL used for log images
    pub stream_url: Option<String>,
    /// Camera id sent with detection logs
    pub camera_id: u32,
    /// Status poll period in milliseconds
    pub poll_interval_ms: u64,
    /// Per camera/weapon log cooldown in seconds
    pub log_cooldown_sec: u64,
    /// Pause after each log request in milliseconds
    pub log_spacing_ms: u64,
    /// Retained detection history entries
    pub history_capacity: usize,
    /// HTTP request timeout in seconds
    pub http_timeout_sec: u64,
    /// Bearer token for log/incident calls
    pub auth_token: Option<String>,
    /// Ring the terminal bell on new detections
    pub alert_bell: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key = %key, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            stream_url: std::env::var("STREAM_URL").ok().filter(|s| !s.is_empty()),
            camera_id: env_or("CAMERA_ID", 1),
            poll_interval_ms: env_or("POLL_INTERVAL_MS", 500),
            log_cooldown_sec: env_or("LOG_COOLDOWN_SEC", 300),
            log_spacing_ms: env_or("LOG_SPACING_MS", 100),
            history_capacity: env_or("HISTORY_CAPACITY", 50),
            http_timeout_sec: env_or("HTTP_TIMEOUT_SEC", 10),
            auth_token: std::env::var("AUTH_TOKEN").ok().filter(|s| !s.is_empty()),
            alert_bell: env_or("ALERT_BELL", true),
        }
    }
}

impl AppConfig {
    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "API_BASE_URL must be an http(s) URL, got {}",
                self.api_base_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("POLL_INTERVAL_MS must be > 0".to_string()));
        }
        if self.history_capacity == 0 {
            return Err(Error::Config("HISTORY_CAPACITY must be > 0".to_string()));
        }
        if self.http_timeout_sec == 0 {
            return Err(Error::Config("HTTP_TIMEOUT_SEC must be > 0".to_string()));
        }
        Ok(())
    }

    /// Service tunables derived from this config
    pub fn service_config(&self) -> DetectionServiceConfig {
        DetectionServiceConfig {
            camera_id: self.camera_id,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            log_cooldown: Duration::from_secs(self.log_cooldown_sec),
            log_spacing: Duration::from_millis(self.log_spacing_ms),
            history_capacity: self.history_capacity,
            tone: ToneSpec::default(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_sec)
    }
}

/// Application state shared with consumers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// DetectionService (polling, logging, alerts)
    pub detection: Arc<DetectionService>,
}

impl AppState {
    /// Wire the service to the HTTP backend and local capability providers
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let api = Arc::new(HttpDetectionApi::new(
            config.api_base_url.clone(),
            config.http_timeout(),
        )?);

        let frames: Arc<dyn FrameGrabber> = match config.stream_url {
            Some(ref url) => Arc::new(HttpFrameGrabber::new(url.clone(), config.http_timeout())?),
            None => Arc::new(NoFrame),
        };
        let sound: Arc<dyn AlertSound> = if config.alert_bell {
            Arc::new(TerminalBell)
        } else {
            Arc::new(SilentSound)
        };

        let capabilities = Capabilities {
            frames,
            sound,
            notifier: Arc::new(LogNotifier::new(Permission::Granted)),
        };

        let detection = Arc::new(DetectionService::new(
            api,
            capabilities,
            config.service_config(),
        ));

        Ok(Self { config, detection })
    }
}
