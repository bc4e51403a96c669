//! Weapon label normalisation
//!
//! The detector reports labels with a few aliases ("gun", "heavy-weapon").
//! Logging and cooldowns use the normalised form; notifications use the
//! display form.

/// Alias table: lowercase detector label -> canonical weapon type
const ALIASES: &[(&str, &str)] = &[
    ("gun", "pistol"),
    ("pistol", "pistol"),
    ("heavy-weapon", "heavy_weapon"),
    ("heavy_weapon", "heavy_weapon"),
    ("knife", "knife"),
];

/// Display names keyed by raw detector label
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("gun", "Pistol"),
    ("pistol", "Pistol"),
    ("heavy-weapon", "Heavy Weapon"),
    ("heavy_weapon", "Heavy Weapon"),
    ("knife", "Knife"),
];

/// Canonical weapon type for a detector label.
/// Unknown labels are lowercased and passed through.
pub fn normalize(label: &str) -> String {
    let lower = label.to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lower)
}

/// Human readable weapon name for notifications.
///
/// Unknown labels get their first `-` and first `_` replaced by a space.
pub fn display_name(label: &str) -> String {
    if let Some((_, name)) = DISPLAY_NAMES.iter().find(|(raw, _)| *raw == label) {
        return name.to_string();
    }
    label.replacen('-', " ", 1).replacen('_', " ", 1)
}

/// Cooldown key for a camera and detector label
pub fn cooldown_key(camera_id: u32, label: &str) -> String {
    format!("{}:{}", camera_id, normalize(label))
}
