//! Per-user alert configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    VisibilityDrop,
    CompetitorOvertake,
}

impl AlertKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::VisibilityDrop => "visibility_drop",
            AlertKind::CompetitorOvertake => "competitor_overtake",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds and toggles controlling which alerts fire for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub visibility_drop_enabled: bool,
    /// Score on the 0–100 scale that a prompt must fall below to alert.
    pub visibility_drop_threshold: f64,
    pub competitor_overtake_enabled: bool,
    pub email_enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            visibility_drop_enabled: true,
            visibility_drop_threshold: 50.0,
            competitor_overtake_enabled: true,
            email_enabled: false,
        }
    }
}
