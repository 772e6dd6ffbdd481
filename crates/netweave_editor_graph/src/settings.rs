// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings stored as RON.

use crate::bundle::BundleStyle;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings file format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Default settings file name
pub const SETTINGS_FILE_NAME: &str = "netweave_editor.ron";

/// Editor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// File format version
    pub version: u32,
    /// Distance between bundle start/end handles and the connected nodes
    pub bundle_margin: f32,
    /// Handle size of an empty bundle
    pub bundle_handle_size: f32,
    /// Extra handle size per bundled connection
    pub bundle_handle_growth: f32,
    /// Name given to new aggregates
    pub default_aggregate_name: String,
    /// Link camera properties automatically when a network has no own setting
    pub auto_link_cameras: bool,
    /// Default `tracing` filter directive
    pub log_filter: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        let style = BundleStyle::default();
        Self {
            version: SETTINGS_FORMAT_VERSION,
            bundle_margin: style.margin,
            bundle_handle_size: style.handle_size,
            bundle_handle_growth: style.handle_growth,
            default_aggregate_name: "Aggregation".to_string(),
            auto_link_cameras: true,
            log_filter: "netweave=info".to_string(),
        }
    }
}

impl EditorSettings {
    /// Load settings; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_ron(&content)
    }

    /// Parse settings from RON text
    pub fn from_ron(content: &str) -> Result<Self, SettingsError> {
        let settings: EditorSettings = ron::from_str(content)?;
        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion(settings.version));
        }
        Ok(settings)
    }

    /// Save settings
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Bundle routing parameters
    pub fn bundle_style(&self) -> BundleStyle {
        BundleStyle {
            margin: self.bundle_margin,
            handle_size: self.bundle_handle_size,
            handle_growth: self.bundle_handle_growth,
        }
    }
}

/// Error loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON
    #[error("Invalid settings file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be encoded
    #[error("Failed to encode settings: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer editor
    #[error("Settings version {0} is newer than supported version {SETTINGS_FORMAT_VERSION}")]
    UnsupportedVersion(u32),
}
