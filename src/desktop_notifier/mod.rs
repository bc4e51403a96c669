//! DesktopNotifier - Desktop Notifications for New Detections
//!
//! ## Responsibilities
//!
//! - Model the notification permission (granted / default / denied)
//! - Format the "Weapon Detected!" notification
//! - Request permission instead of showing while undecided

use crate::error::Result;
use crate::models::DetectionSnapshot;
use crate::weapon_label;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Notification permission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    /// Not yet asked
    Default,
    Denied,
}

/// Desktop notification payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    /// Notifications with the same tag replace each other
    pub tag: String,
    pub require_interaction: bool,
}

impl Notification {
    /// Build the weapon alert for `detection`, stamped with `at`
    pub fn for_detection(detection: &DetectionSnapshot, at: DateTime<Local>) -> Self {
        let weapons = detection
            .objects
            .keys()
            .map(|label| weapon_label::display_name(label))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            title: "Weapon Detected!".to_string(),
            body: format!("{} detected at {}", weapons, at.format("%H:%M:%S")),
            icon: "/favicon.ico".to_string(),
            tag: "weapon-detection".to_string(),
            require_interaction: true,
        }
    }
}

/// Desktop notification capability
#[async_trait]
pub trait DesktopNotifier: Send + Sync {
    fn permission(&self) -> Permission;

    /// Ask the user for permission, returning the decision
    async fn request_permission(&self) -> Result<Permission>;

    fn show(&self, notification: &Notification) -> Result<()>;
}

/// Show `notification` if permitted, otherwise ask for permission.
///
/// Returns whether the notification was shown. Failures are logged.
pub async fn notify(notifier: &dyn DesktopNotifier, notification: &Notification) -> bool {
    match notifier.permission() {
        Permission::Granted => match notifier.show(notification) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to show desktop notification");
                false
            }
        },
        Permission::Default => {
            match notifier.request_permission().await {
                Ok(permission) => {
                    tracing::info!(permission = ?permission, "Notification permission decided")
                }
                Err(e) => tracing::warn!(error = %e, "Notification permission request failed"),
            }
            false
        }
        Permission::Denied => false,
    }
}

/// Notifier that writes notifications to the log
pub struct LogNotifier {
    permission: RwLock<Permission>,
}

impl LogNotifier {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission: RwLock::new(permission),
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(Permission::Default)
    }
}

#[async_trait]
impl DesktopNotifier for LogNotifier {
    fn permission(&self) -> Permission {
        *self.permission.read().unwrap_or_else(|e| e.into_inner())
    }

    async fn request_permission(&self) -> Result<Permission> {
        // A log sink has nobody to ask, so the request is always granted
        let mut permission = self.permission.write().unwrap_or_else(|e| e.into_inner());
        if *permission == Permission::Default {
            *permission = Permission::Granted;
        }
        Ok(*permission)
    }

    fn show(&self, notification: &Notification) -> Result<()> {
        tracing::warn!(
            title = %notification.title,
            tag = %notification.tag,
            "{}",
            notification.body
        );
        Ok(())
    }
}

/// Notifier for headless environments
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl DesktopNotifier for NoopNotifier {
    fn permission(&self) -> Permission {
        Permission::Denied
    }

    async fn request_permission(&self) -> Result<Permission> {
        Ok(Permission::Denied)
    }

    fn show(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeaponObject;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn detection() -> DetectionSnapshot {
        DetectionSnapshot {
            detected: true,
            objects: BTreeMap::from([
                ("gun".to_string(), WeaponObject::new(vec![0.9])),
                ("heavy-weapon".to_string(), WeaponObject::new(vec![0.6])),
            ]),
            timestamp: Some("T1".to_string()),
        }
    }

    #[test]
    fn test_notification_format() {
        let at = Local.with_ymd_and_hms(2025, 1, 2, 13, 4, 5).unwrap();
        let n = Notification::for_detection(&detection(), at);
        assert_eq!(n.title, "Weapon Detected!");
        assert_eq!(n.body, "Pistol, Heavy Weapon detected at 13:04:05");
        assert_eq!(n.tag, "weapon-detection");
        assert!(n.require_interaction);
    }

    #[tokio::test]
    async fn test_default_permission_requests_instead_of_showing() {
        let notifier = LogNotifier::default();
        let n = Notification::for_detection(&detection(), Local::now());

        assert!(!notify(&notifier, &n).await);
        assert_eq!(notifier.permission(), Permission::Granted);
        assert!(notify(&notifier, &n).await);
    }

    #[tokio::test]
    async fn test_denied_permission_skips() {
        let n = Notification::for_detection(&detection(), Local::now());
        assert!(!notify(&NoopNotifier, &n).await);
        assert!(!notify(&LogNotifier::new(Permission::Denied), &n).await);
    }
}
