//! Weapon Alert Client Library
//!
//! Client-side polling and alerting for the weapon detection dashboard.
//!
//! ## Architecture
//!
//! 1. DetectionService - Polling loop, debounce, logging, alert lifecycle
//! 2. ApiClient - Detection backend adapter (status, log, incidents)
//! 3. CooldownCache - Per camera/weapon log cooldown
//! 4. DetectionHistory - Bounded most-recent-first history
//! 5. ListenerHub - State fan-out to subscribers
//! 6. FrameCapture - Still frame grab from the live stream
//! 7. AlertSound / DesktopNotifier - Local alert capabilities
//!
//! ## Design Principles
//!
//! - One explicit `DetectionService` per `AppState`, no process-wide singleton
//! - Platform capabilities behind traits with headless implementations
//! - Failures are logged and downgraded, never surfaced to subscribers as panics

pub mod alert_sound;
pub mod api_client;
pub mod cooldown_cache;
pub mod desktop_notifier;
pub mod detection_history;
pub mod detection_service;
pub mod frame_capture;
pub mod listener_hub;
pub mod models;
pub mod weapon_label;
pub mod error;
pub mod state;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use state::AppState;
