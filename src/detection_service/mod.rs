//! DetectionService - Detection Polling and Alerting
//!
//! ## Responsibilities
//!
//! - Poll the detection status endpoint on a fixed period
//! - Debounce detections by timestamp and keep a bounded history
//! - Sound, desktop notification and backend logging for new detections
//! - Per camera/weapon log cooldown
//! - Incident alert lifecycle (none -> active -> none)
//! - Publish the aggregate state to subscribers
//!
//! ## Tick ordering
//!
//! Ticks run one after another on a single task; ticks missed while a slow
//! check runs are skipped rather than overlapped. Every tick carries
//! the generation it started under, and `stop`/`reset` bump the generation,
//! so a response that arrives afterwards is dropped instead of applied.

use crate::alert_sound::{AlertSound, ToneSpec};
use crate::api_client::DetectionApi;
use crate::cooldown_cache::{CooldownCache, DEFAULT_LOG_COOLDOWN};
use crate::desktop_notifier::{self, DesktopNotifier, Notification};
use crate::detection_history::{DetectionHistory, DEFAULT_HISTORY_CAPACITY};
use crate::frame_capture::FrameGrabber;
use crate::listener_hub::{ListenerHub, Subscription};
use crate::models::{
    Alert, DetectionSnapshot, LogDetectionRequest, LogDetectionResponse, ServiceState,
    NEVER_CHECKED,
};
use crate::weapon_label;
use chrono::{Local, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};


/// Tunables for the polling service
#[derive(Debug, Clone)]
pub struct DetectionServiceConfig {
    /// Camera the dashboard stream belongs to
    pub camera_id: u32,
    pub poll_interval: Duration,
    pub log_cooldown: Duration,
    /// Pause after each log request
    pub log_spacing: Duration,
    pub history_capacity: usize,
    pub tone: ToneSpec,
}

impl Default for DetectionServiceConfig {
    fn default() -> Self {
        Self {
            camera_id: 1,
            poll_interval: Duration::from_millis(500),
            log_cooldown: DEFAULT_LOG_COOLDOWN,
            log_spacing: Duration::from_millis(100),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            tone: ToneSpec::default(),
        }
    }
}

/// Capability providers used on new detections
pub struct Capabilities {
    pub frames: Arc<dyn FrameGrabber>,
    pub sound: Arc<dyn AlertSound>,
    pub notifier: Arc<dyn DesktopNotifier>,
}

impl Default for Capabilities {
    /// Headless: no frames, no sound, no notifications
    fn default() -> Self {
        Self {
            frames: Arc::new(crate::frame_capture::NoFrame),
            sound: Arc::new(crate::alert_sound::SilentSound),
            notifier: Arc::new(desktop_notifier::NoopNotifier),
        }
    }
}

/// Mutable service state, only touched under the service mutex
struct Inner {
    current_detection: DetectionSnapshot,
    history: DetectionHistory,
    is_connected: bool,
    last_check_time: String,
    current_alert: Option<Alert>,
    token: Option<String>,
    /// Timestamp of the last detection treated as new
    last_timestamp: Option<String>,
    cooldowns: CooldownCache,
    polling: bool,
}

impl Inner {
    fn new(config: &DetectionServiceConfig) -> Self {
        Self {
            current_detection: DetectionSnapshot::default(),
            history: DetectionHistory::new(config.history_capacity),
            is_connected: false,
            last_check_time: NEVER_CHECKED.to_string(),
            current_alert: None,
            token: None,
            last_timestamp: None,
            cooldowns: CooldownCache::new(config.log_cooldown),
            polling: false,
        }
    }

    fn snapshot(&self) -> ServiceState {
        ServiceState {
            current_detection: self.current_detection.clone(),
            detection_history: self.history.to_vec(),
            is_connected: self.is_connected,
            last_check_time: self.last_check_time.clone(),
            current_alert: self.current_alert.clone(),
        }
    }
}

/// Clears the in-flight flag when a check finishes or is cancelled
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// DetectionService instance
pub struct DetectionService {
    api: Arc<dyn DetectionApi>,
    capabilities: Capabilities,
    config: DetectionServiceConfig,
    inner: Mutex<Inner>,
    hub: ListenerHub<ServiceState>,
    generation: AtomicU64,
    poll_in_flight: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DetectionService {
    /// Create new DetectionService
    pub fn new(
        api: Arc<dyn DetectionApi>,
        capabilities: Capabilities,
        config: DetectionServiceConfig,
    ) -> Self {
        Self {
            api,
            capabilities,
            inner: Mutex::new(Inner::new(&config)),
            config,
            hub: ListenerHub::new(),
            generation: AtomicU64::new(0),
            poll_in_flight: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) != generation
    }

    pub fn config(&self) -> &DetectionServiceConfig {
        &self.config
    }

    pub fn is_polling(&self) -> bool {
        self.inner().polling
    }

    /// Start polling with `token` for authenticated calls.
    /// An empty token disables detection logging.
    ///
    /// Checks immediately, then every `poll_interval`. No-op while running.
    pub fn start(self: &Arc<Self>, token: impl Into<String>) {
        {
            let mut inner = self.inner();
            if inner.polling {
                tracing::warn!("Detection service already polling");
                return;
            }
            inner.polling = true;
            let token = token.into();
            inner.token = (!token.is_empty()).then_some(token);
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let service = Arc::downgrade(self);
        let period = self.config.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(service) = service.upgrade() else {
                    break;
                };
                if service.is_stale(generation) {
                    break;
                }
                service.run_check(generation).await;
            }

            tracing::debug!(generation = generation, "Polling task exited");
        });

        if let Some(previous) = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle)
        {
            previous.abort();
        }

        tracing::info!(
            interval_ms = period.as_millis() as u64,
            "Detection service started"
        );
    }

    /// Stop polling. In-flight responses are discarded.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);

        if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }

        self.inner().polling = false;
        tracing::info!("Detection service stopped");
    }

    /// Stop and clear all state, listeners included
    pub fn reset(&self) {
        self.stop();
        self.hub.clear();
        *self.inner() = Inner::new(&self.config);
        tracing::info!("Detection service reset");
    }

    /// Current aggregate state
    pub fn get_state(&self) -> ServiceState {
        self.inner().snapshot()
    }

    /// Register `callback`; it receives the current state immediately
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ServiceState) + Send + Sync + 'static,
    {
        let state = self.get_state();
        self.hub.subscribe(callback, &state)
    }

    /// Receive state updates over a channel, seeded with the current state
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<ServiceState> {
        let state = self.get_state();
        self.hub.subscribe_channel(&state)
    }

    /// Clear the active alert
    pub fn dismiss_alert(&self) {
        self.inner().current_alert = None;
        tracing::info!("Alert dismissed");
        self.notify_listeners();
    }

    fn notify_listeners(&self) {
        let state = self.get_state();
        self.hub.publish(&state);
    }

    /// Run one poll now, outside the timer.
    ///
    /// Skipped when another poll is still in flight.
    pub async fn check_detection(&self) {
        let generation = self.generation.load(Ordering::Acquire);
        self.run_check(generation).await;
    }

    async fn run_check(&self, generation: u64) {
        let Some(_in_flight) = InFlightGuard::acquire(&self.poll_in_flight) else {
            tracing::debug!("Previous poll still in flight, skipping");
            return;
        };

        let snapshot = match self.api.fetch_status().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if self.is_stale(generation) {
                    return;
                }
                tracing::warn!(error = %e, "Detection status check failed");
                self.inner().is_connected = false;
                self.notify_listeners();
                return;
            }
        };

        if self.is_stale(generation) {
            tracing::debug!("Discarding detection status from a stopped poll");
            return;
        }

        let (is_new, history_len) = {
            let mut inner = self.inner();
            inner.is_connected = true;
            inner.last_check_time = Local::now().format("%H:%M:%S").to_string();

            let is_new = snapshot.is_new_since(inner.last_timestamp.as_deref());
            if is_new {
                inner.last_timestamp = snapshot.timestamp.clone();
                inner.history.push(snapshot.clone());
            }
            (is_new, inner.history.len())
        };

        if is_new {
            tracing::info!(
                timestamp = ?snapshot.timestamp,
                weapons = ?snapshot.objects.keys().collect::<Vec<_>>(),
                history = history_len,
                "New detection"
            );

            self.play_alert_sound();
            self.show_notification(&snapshot).await;
            self.capture_and_log_detections(&snapshot, generation).await;

            if self.is_stale(generation) {
                return;
            }
        }

        self.inner().current_detection = snapshot;
        self.notify_listeners();
    }

    fn play_alert_sound(&self) {
        if let Err(e) = self.capabilities.sound.play(&self.config.tone) {
            tracing::warn!(error = %e, "Could not play alert sound");
        }
    }

    async fn show_notification(&self, detection: &DetectionSnapshot) {
        let notification = Notification::for_detection(detection, Local::now());
        desktop_notifier::notify(self.capabilities.notifier.as_ref(), &notification).await;
    }

    /// Log every weapon label of `detection` that is not cooling down
    async fn capture_and_log_detections(&self, detection: &DetectionSnapshot, generation: u64) {
        let token = self.inner().token.clone();
        let Some(token) = token else {
            tracing::warn!("No token available for logging detection");
            return;
        };

        let camera_id = self.config.camera_id;
        // Captured on first use, shared by every label of this detection
        let mut image: Option<Option<String>> = None;

        for (label, object) in &detection.objects {
            if self.is_stale(generation) {
                tracing::debug!("Polling stopped, abandoning detection logging");
                return;
            }

            let Some(confidence) = object.mean_confidence() else {
                continue;
            };
            let weapon_type = weapon_label::normalize(label);
            let key = weapon_label::cooldown_key(camera_id, label);

            {
                let inner = self.inner();
                let now = Instant::now();
                if let Some(remaining) = inner.cooldowns.remaining(&key, now) {
                    let elapsed = inner.cooldowns.elapsed(&key, now).unwrap_or_default();
                    tracing::info!(
                        weapon_type = %weapon_type,
                        last_logged_secs = elapsed.as_secs(),
                        remaining_secs = remaining.as_secs_f64().ceil() as u64,
                        "Skipping detection log, cooldown active"
                    );
                    continue;
                }
            }

            let frame = match &image {
                Some(frame) => frame.clone(),
                None => {
                    let frame = self.capabilities.frames.capture().await;
                    image = Some(frame.clone());
                    frame
                }
            };

            tracing::info!(
                camera_id = camera_id,
                weapon_type = %weapon_type,
                confidence = confidence,
                has_image = frame.is_some(),
                "Logging detection"
            );

            let request = LogDetectionRequest {
                camera_id,
                weapon_type: weapon_type.clone(),
                confidence_score: confidence,
                image: frame,
            };

            match self.api.log_detection(&token, &request).await {
                Ok(response) => {
                    self.handle_log_response(&key, &weapon_type, response, &token, generation)
                        .await
                }
                Err(e) => {
                    tracing::error!(
                        weapon_type = %weapon_type,
                        error = %e,
                        "Failed to log detection"
                    );
                }
            }

            tokio::time::sleep(self.config.log_spacing).await;
        }
    }

    async fn handle_log_response(
        &self,
        key: &str,
        weapon_type: &str,
        response: LogDetectionResponse,
        token: &str,
        generation: u64,
    ) {
        tracing::info!(weapon_type = %weapon_type, message = %response.message, "Detection log accepted");

        if let Some(ref image_path) = response.image_path {
            tracing::debug!(image_path = %image_path, "Detection image saved");
        }

        if response.is_new_log {
            let mut inner = self.inner();
            let now = Instant::now();
            inner.cooldowns.record(key, now);
            let swept = inner.cooldowns.sweep(now);
            if swept > 0 {
                tracing::debug!(
                    swept = swept,
                    tracked = inner.cooldowns.len(),
                    "Expired cooldown entries removed"
                );
            }
        }

        if let (Some(incident_id), true) = (response.incident_id, response.is_new_incident) {
            tracing::warn!(
                incident_id = incident_id,
                weapon_type = %weapon_type,
                "New incident created"
            );
            self.fetch_and_set_incident_alert(token, incident_id, generation)
                .await;
        }
    }

    /// Fetch incident detail and make it the active alert
    async fn fetch_and_set_incident_alert(&self, token: &str, incident_id: u64, generation: u64) {
        match self.api.fetch_incident(token, incident_id).await {
            Ok(response) => {
                if self.is_stale(generation) {
                    return;
                }
                let replaced = self
                    .inner()
                    .current_alert
                    .replace(Alert {
                        incident_id,
                        incident: response.incident,
                        created_at: Utc::now(),
                    })
                    .map(|prev| prev.incident_id);

                tracing::info!(
                    incident_id = incident_id,
                    replaced = ?replaced,
                    "Alert set for incident"
                );
                self.notify_listeners();
            }
            Err(e) => {
                tracing::error!(
                    incident_id = incident_id,
                    error = %e,
                    "Error fetching incident details"
                );
            }
        }
    }
}

impl Drop for DetectionService {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}
