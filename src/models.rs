//! Shared data types
//!
//! Wire types of the detection backend and the aggregate state
//! delivered to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Per-label detection data from the status endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaponObject {
    /// One confidence per detected instance.
    /// The backend sometimes sends a bare number instead of a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub confidences: Vec<f64>,
    /// Instance count as reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Bounding boxes `[x1, y1, x2, y2]`, passed through for overlay drawing
    #[serde(default)]
    pub boxes: Vec<[f64; 4]>,
}

impl WeaponObject {
    pub fn new(confidences: Vec<f64>) -> Self {
        Self {
            confidences,
            ..Default::default()
        }
    }

    /// Mean confidence over all samples, `None` when there are none
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.confidences.is_empty() {
            return None;
        }
        Some(self.confidences.iter().sum::<f64>() / self.confidences.len() as f64)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(f64),
        Many(Vec<f64>),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(v) => vec![v],
        OneOrMany::Many(v) => v,
        OneOrMany::Null(()) => Vec::new(),
    })
}

/// One poll result (GET /api/detection-status)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    #[serde(default)]
    pub detected: bool,
    /// label -> instances; ordered so logging walks labels deterministically
    #[serde(default, deserialize_with = "null_as_empty")]
    pub objects: BTreeMap<String, WeaponObject>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn null_as_empty<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, WeaponObject>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, WeaponObject>>::deserialize(deserializer)?.unwrap_or_default())
}

impl DetectionSnapshot {
    pub fn has_objects(&self) -> bool {
        !self.objects.is_empty()
    }

    /// True when this poll reports a detection that differs from `last_seen`
    pub fn is_new_since(&self, last_seen: Option<&str>) -> bool {
        if !self.detected || !self.has_objects() {
            return false;
        }
        match self.timestamp.as_deref() {
            Some(ts) if !ts.is_empty() => Some(ts) != last_seen,
            _ => false,
        }
    }
}

/// POST /api/log-detection body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDetectionRequest {
    pub camera_id: u32,
    pub weapon_type: String,
    pub confidence_score: f64,
    /// JPEG data URI, null when no frame could be captured
    pub image: Option<String>,
}

/// POST /api/log-detection response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogDetectionResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub is_new_log: bool,
    #[serde(default)]
    pub incident_id: Option<u64>,
    #[serde(default)]
    pub is_new_incident: bool,
}

/// GET /api/incidents/{id} response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentResponse {
    #[serde(default)]
    pub incident: serde_json::Value,
}

/// Active alert raised from a new incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub incident_id: u64,
    /// Incident detail as returned by the backend
    pub incident: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Aggregate state delivered to every subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    pub current_detection: DetectionSnapshot,
    /// Most recent first
    pub detection_history: Vec<DetectionSnapshot>,
    pub is_connected: bool,
    pub last_check_time: String,
    pub current_alert: Option<Alert>,
}

/// `last_check_time` before the first successful poll
pub const NEVER_CHECKED: &str = "Never";

impl Default for ServiceState {
    fn default() -> Self {
        Self {
            current_detection: DetectionSnapshot::default(),
            detection_history: Vec::new(),
            is_connected: false,
            last_check_time: NEVER_CHECKED.to_string(),
            current_alert: None,
        }
    }
}
