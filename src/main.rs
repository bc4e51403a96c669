//! Weapon Alert Client
//!
//! Polls the detection backend and logs every dashboard state change.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weapon_alert_client::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weapon_alert_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting weapon alert client v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        api_base_url = %config.api_base_url,
        stream_url = ?config.stream_url,
        camera_id = config.camera_id,
        poll_interval_ms = config.poll_interval_ms,
        log_cooldown_sec = config.log_cooldown_sec,
        "Configuration loaded"
    );

    let token = config.auth_token.clone().unwrap_or_default();
    if token.is_empty() {
        tracing::warn!("AUTH_TOKEN not set, detections will not be logged");
    }

    let state = AppState::new(config)?;

    // Log each state transition the dashboard would render
    let subscription = state.detection.subscribe({
        let last = std::sync::Mutex::new(None::<(bool, Option<String>, Option<u64>)>);
        move |s| {
            let key = (
                s.is_connected,
                s.detection_history.first().and_then(|d| d.timestamp.clone()),
                s.current_alert.as_ref().map(|a| a.incident_id),
            );
            let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
            if last.as_ref() == Some(&key) {
                return;
            }
            tracing::info!(
                connected = s.is_connected,
                last_check = %s.last_check_time,
                history = s.detection_history.len(),
                alert = ?key.2,
                "Dashboard state changed"
            );
            *last = Some(key);
        }
    });

    state.detection.start(token);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    subscription.unsubscribe();
    state.detection.stop();

    Ok(())
}
