//! Settings store
//! App settings persisted as a JSON file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::TerminalBehavior;

/// Key used when no key path has been configured.
pub const DEFAULT_SSH_KEY_PATH: &str = "~/.ssh/id_ed25519";

/// File name of the settings file inside the app config directory.
pub const SETTINGS_FILE_NAME: &str = "podpanel-settings.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub ssh_key_path: String,
    pub default_terminal_behavior: TerminalBehavior,
    pub theme: Theme,
    pub terminal_font: String,
    pub terminal_font_size: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ssh_key_path: String::new(),
            default_terminal_behavior: TerminalBehavior::NewTab,
            theme: Theme::Light,
            terminal_font: "Monaco, monospace".to_string(),
            terminal_font_size: 14,
        }
    }
}

impl Settings {
    /// The configured key path, or the conventional default when unset.
    pub fn effective_ssh_key_path(&self) -> &str {
        if self.ssh_key_path.trim().is_empty() {
            DEFAULT_SSH_KEY_PATH
        } else {
            &self.ssh_key_path
        }
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub ssh_key_path: Option<String>,
    pub default_terminal_behavior: Option<TerminalBehavior>,
    pub theme: Option<Theme>,
    pub terminal_font: Option<String>,
    pub terminal_font_size: Option<u16>,
}

pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load settings from `path`, or defaults if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| AppError::SettingsIo(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&content)
                .map_err(|e| AppError::SettingsFormat(format!("{}: {}", path.display(), e)))?
        } else {
            Settings::default()
        };
        Ok(Self { path, settings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn update(&mut self, patch: SettingsPatch) -> Result<Settings> {
        let mut updated = self.settings.clone();
        if let Some(ssh_key_path) = patch.ssh_key_path {
            updated.ssh_key_path = ssh_key_path;
        }
        if let Some(behavior) = patch.default_terminal_behavior {
            updated.default_terminal_behavior = behavior;
        }
        if let Some(theme) = patch.theme {
            updated.theme = theme;
        }
        if let Some(font) = patch.terminal_font {
            updated.terminal_font = font;
        }
        if let Some(size) = patch.terminal_font_size {
            updated.terminal_font_size = size;
        }
        self.replace(updated)
    }

    pub fn reset(&mut self) -> Result<Settings> {
        self.replace(Settings::default())
    }

    pub fn export(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.settings)?)
    }

    /// Replace settings with `json`. Missing fields take their defaults;
    /// invalid JSON leaves the current settings untouched.
    pub fn import(&mut self, json: &str) -> Result<Settings> {
        let imported: Settings = serde_json::from_str(json)
            .map_err(|e| AppError::SettingsFormat(format!("invalid settings format: {}", e)))?;
        self.replace(imported)
    }

    fn replace(&mut self, settings: Settings) -> Result<Settings> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::SettingsIo(format!("{}: {}", parent.display(), e)))?;
        }
        let content = serde_json::to_string_pretty(&settings)?;
        fs::write(&self.path, content)
            .map_err(|e| AppError::SettingsIo(format!("{}: {}", self.path.display(), e)))?;

        log::debug!("Saved settings to {}", self.path.display());
        self.settings = settings;
        Ok(self.settings.clone())
    }
}
