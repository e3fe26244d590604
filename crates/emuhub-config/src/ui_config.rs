//! Presentation preferences
//!
//! Stored alongside the core settings but only read by front ends.

use serde::{Deserialize, Serialize};

/// Rendering trade-off selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    /// Full-size cover art and animations
    #[default]
    Quality,
    /// Smaller thumbnails, no animations
    Performance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default)]
    pub performance_mode: PerformanceMode,

    /// "grid" or "list"
    #[serde(default = "default_view_mode")]
    pub view_mode: String,

    #[serde(default = "default_sort_order")]
    pub sort_order: String,
}

fn default_theme() -> String {
    "Modern Dark".to_string()
}

fn default_view_mode() -> String {
    "grid".to_string()
}

fn default_sort_order() -> String {
    "name".to_string()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            performance_mode: PerformanceMode::default(),
            view_mode: default_view_mode(),
            sort_order: default_sort_order(),
        }
    }
}
