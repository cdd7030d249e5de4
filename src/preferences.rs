use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::TMError;
use crate::record::FIXED_FIELDS;
use crate::store::AppState;

const APP_DIR: &str = "tabman";
const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// The persisted partition of the application state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub theme: Theme,
    pub column_order: Vec<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            column_order: FIXED_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// `<config dir>/tabman`, e.g. `~/.config/tabman` on Linux.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

/// JSON file holding the preferences.
#[derive(Debug, Clone)]
pub struct PreferencesStorage {
    path: PathBuf,
}

impl PreferencesStorage {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(PREFERENCES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored preferences, or the defaults when the file is missing or unreadable.
    pub fn load(&self) -> Preferences {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(preferences) => preferences,
                Err(e) => {
                    warn!("Ignoring corrupt preferences {:?}: {e}", self.path);
                    Preferences::default()
                }
            },
            Err(_) => {
                debug!("No preferences at {:?}, using defaults", self.path);
                Preferences::default()
            }
        }
    }

    pub fn save(&self, preferences: &Preferences) -> Result<(), TMError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(preferences)?;
        fs::write(&self.path, content)?;
        debug!("Saved preferences to {:?}", self.path);
        Ok(())
    }

    /// Store listener writing the preferences whenever they change. The table partition is never written.
    pub fn into_listener(self, initial: Preferences) -> impl FnMut(&AppState) + 'static {
        let mut last_saved = initial;
        move |state: &AppState| {
            if state.preferences == last_saved {
                return;
            }
            match self.save(&state.preferences) {
                Ok(()) => last_saved = state.preferences.clone(),
                Err(e) => warn!("Could not save preferences: {e}"),
            }
        }
    }
}
