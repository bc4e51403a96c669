//! AlertSound - Audible Alert on New Detections

use crate::error::{Error, Result};
use std::io::Write;
use std::time::Duration;

/// Synthesised beep parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f32,
    pub duration: Duration,
    /// Gain at tone start
    pub start_gain: f32,
    /// Gain reached by exponential ramp at tone end
    pub end_gain: f32,
}

impl Default for ToneSpec {
    /// 880 Hz sine, 200 ms, 0.3 -> 0.01
    fn default() -> Self {
        Self {
            frequency_hz: 880.0,
            duration: Duration::from_millis(200),
            start_gain: 0.3,
            end_gain: 0.01,
        }
    }
}

/// Audio output capability
pub trait AlertSound: Send + Sync {
    fn play(&self, tone: &ToneSpec) -> Result<()>;
}

/// No audio (headless)
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSound;

impl AlertSound for SilentSound {
    fn play(&self, _tone: &ToneSpec) -> Result<()> {
        Ok(())
    }
}

/// Rings the terminal bell on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl AlertSound for TerminalBell {
    fn play(&self, tone: &ToneSpec) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| Error::Capability(format!("terminal bell: {}", e)))?;
        tracing::debug!(
            frequency_hz = tone.frequency_hz,
            duration_ms = tone.duration.as_millis() as u64,
            start_gain = tone.start_gain,
            end_gain = tone.end_gain,
            "Alert tone played"
        );
        Ok(())
    }
}
