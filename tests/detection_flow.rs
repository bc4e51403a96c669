//! End-to-end flow through the public DetectionService API

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weapon_alert_client::api_client::DetectionApi;
use weapon_alert_client::detection_service::{
    Capabilities, DetectionService, DetectionServiceConfig,
};
use weapon_alert_client::models::{
    DetectionSnapshot, IncidentResponse, LogDetectionRequest, LogDetectionResponse, ServiceState,
    WeaponObject,
};
use weapon_alert_client::Result;

/// Backend that always reports the same detection and opens incident 11
struct StaticBackend {
    snapshot: DetectionSnapshot,
    logs: Mutex<Vec<LogDetectionRequest>>,
}

#[async_trait]
impl DetectionApi for StaticBackend {
    async fn fetch_status(&self) -> Result<DetectionSnapshot> {
        Ok(self.snapshot.clone())
    }

    async fn log_detection(
        &self,
        _token: &str,
        request: &LogDetectionRequest,
    ) -> Result<LogDetectionResponse> {
        self.logs.lock().unwrap().push(request.clone());
        Ok(LogDetectionResponse {
            message: "Detection logged".to_string(),
            image_path: None,
            is_new_log: true,
            incident_id: Some(11),
            is_new_incident: true,
        })
    }

    async fn fetch_incident(&self, _token: &str, incident_id: u64) -> Result<IncidentResponse> {
        Ok(IncidentResponse {
            incident: serde_json::json!({ "id": incident_id, "status": "open" }),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn polling_raises_one_alert_for_a_held_detection() {
    let backend = Arc::new(StaticBackend {
        snapshot: DetectionSnapshot {
            detected: true,
            objects: BTreeMap::from([("gun".to_string(), WeaponObject::new(vec![0.92]))]),
            timestamp: Some("2025-01-02T10:00:00".to_string()),
        },
        logs: Mutex::new(Vec::new()),
    });

    let service = Arc::new(DetectionService::new(
        backend.clone(),
        Capabilities::default(),
        DetectionServiceConfig::default(),
    ));

    let states: Arc<Mutex<Vec<ServiceState>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    let _subscription = service.subscribe(move |s| sink.lock().unwrap().push(s.clone()));

    service.start("secret-token");
    tokio::time::sleep(Duration::from_secs(3)).await;
    service.stop();

    let state = service.get_state();
    assert!(state.is_connected);
    assert_eq!(state.detection_history.len(), 1);
    assert_eq!(state.current_alert.as_ref().map(|a| a.incident_id), Some(11));
    assert_eq!(backend.logs.lock().unwrap().len(), 1);
    assert_eq!(backend.logs.lock().unwrap()[0].weapon_type, "pistol");

    let states = states.lock().unwrap();
    assert!(!states[0].is_connected);
    assert!(states.len() > 2);
    // Release the guard: dismiss_alert notifies the subscriber, which locks `states`
    drop(states);

    service.dismiss_alert();
    assert!(service.get_state().current_alert.is_none());
}
