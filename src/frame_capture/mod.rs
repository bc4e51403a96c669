//! FrameCapture - Still Frame Grab from the Live Stream
//!
//! ## Responsibilities
//!
//! - Pull one JPEG frame from the dashboard video stream
//! - Accept either an MJPEG multipart stream or a single-frame JPEG endpoint
//! - Encode the frame as a `data:image/jpeg;base64,` URI for detection logs
//!
//! Capture is best-effort: every failure is logged and reported as `None`.

use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;
use tokio::sync::Mutex;

/// JPEG start-of-image marker
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Stop reading a stream after this many bytes without a complete frame
const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Source of still frames for detection logs
#[async_trait]
pub trait FrameGrabber: Send + Sync {
    /// Current frame as a JPEG data URI, `None` when unavailable
    async fn capture(&self) -> Option<String>;
}

/// Grabber for environments without a video stream
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFrame;

#[async_trait]
impl FrameGrabber for NoFrame {
    async fn capture(&self) -> Option<String> {
        None
    }
}

/// HTTP frame grabber for MJPEG (`multipart/x-mixed-replace`) or JPEG URLs
pub struct HttpFrameGrabber {
    client: reqwest::Client,
    stream_url: String,
    max_frame_bytes: usize,
    /// Scratch buffer reused across captures
    buffer: Mutex<Vec<u8>>,
}

impl HttpFrameGrabber {
    /// Create new grabber for `stream_url`
    pub fn new(stream_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            stream_url: stream_url.into(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            buffer: Mutex::new(Vec::new()),
        })
    }

    /// Read the stream until one complete JPEG is buffered
    async fn grab_jpeg(&self) -> Result<Vec<u8>> {
        let mut resp = self.client.get(&self.stream_url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Capability(format!(
                "stream returned {}",
                resp.status()
            )));
        }

        let mut buffer = self.buffer.lock().await;
        buffer.clear();

        while let Some(chunk) = resp.chunk().await? {
            buffer.extend_from_slice(&chunk);
            if let Some(frame) = extract_jpeg(&buffer) {
                return Ok(frame.to_vec());
            }
            if buffer.len() > self.max_frame_bytes {
                return Err(Error::Capability(format!(
                    "no complete frame within {} bytes",
                    self.max_frame_bytes
                )));
            }
        }

        // Single-frame endpoints end the body right after EOI
        extract_jpeg(&buffer)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::Capability("stream ended without a JPEG frame".to_string()))
    }
}

#[async_trait]
impl FrameGrabber for HttpFrameGrabber {
    async fn capture(&self) -> Option<String> {
        match self.grab_jpeg().await {
            Ok(frame) => {
                tracing::debug!(size = frame.len(), "Captured frame from video stream");
                Some(to_data_uri(&frame))
            }
            Err(e) => {
                tracing::warn!(
                    stream_url = %self.stream_url,
                    error = %e,
                    "Frame capture failed, logging without image"
                );
                None
            }
        }
    }
}

/// First complete JPEG (SOI..=EOI) in `buf`
pub fn extract_jpeg(buf: &[u8]) -> Option<&[u8]> {
    let start = find_marker(buf, &JPEG_SOI, 0)?;
    let end = find_marker(buf, &JPEG_EOI, start + JPEG_SOI.len())?;
    Some(&buf[start..end + JPEG_EOI.len()])
}

fn find_marker(buf: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

/// Encode JPEG bytes as a data URI
pub fn to_data_uri(jpeg: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(jpeg)
    )
}
