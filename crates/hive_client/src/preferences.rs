//! Layout preferences persistence.
//!
//! Only UI layout data is kept on disk, under:
//! `.agenthive/preferences.json`
//!
//! ```json
//! { "drawerWidth": 280, "drawerCollapsed": false }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClientResult;

pub const DEFAULT_DRAWER_WIDTH: u32 = 280;

/// Persisted layout of the session drawer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutPreferences {
    pub drawer_width: u32,
    pub drawer_collapsed: bool,
}

impl Default for LayoutPreferences {
    fn default() -> Self {
        Self {
            drawer_width: DEFAULT_DRAWER_WIDTH,
            drawer_collapsed: false,
        }
    }
}

/// Reads and writes [`LayoutPreferences`] in a workspace
#[derive(Debug, Clone)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    /// Preferences file of the workspace at `workspace_root`
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            path: workspace_root
                .as_ref()
                .join(".agenthive")
                .join("preferences.json"),
        }
    }

    /// Use an explicit file path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences; a missing file yields the defaults.
    pub fn load(&self) -> ClientResult<LayoutPreferences> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No preferences file, using defaults");
            return Ok(LayoutPreferences::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, preferences: &LayoutPreferences) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(preferences)?;
        fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), "Saved preferences");
        Ok(())
    }

    /// Load, modify and save in one step.
    pub fn update(
        &self,
        f: impl FnOnce(&mut LayoutPreferences),
    ) -> ClientResult<LayoutPreferences> {
        let mut preferences = self.load()?;
        f(&mut preferences);
        self.save(&preferences)?;
        Ok(preferences)
    }
}
