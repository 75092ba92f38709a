use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Display toggles of the permission usage screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetailsToggles {
    pub show_system: bool,
    pub show_7_days: bool,
}

/// Device and release gates that change pipeline behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureFlags {
    /// Emergency location is tracked and clusters only with itself.
    pub location_bypass_enabled: bool,
    /// The 7 day view may be selected; otherwise only 24h is shown.
    pub seven_day_toggle_enabled: bool,
    /// Handheld devices keep 7 days of history, others 1 day.
    pub handheld: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            location_bypass_enabled: false,
            seven_day_toggle_enabled: true,
            handheld: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    /// Level used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub toggles: DetailsToggles,
    pub features: FeatureFlags,
    pub logging: LoggingSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Open the settings file, falling back to defaults when it is missing or unreadable JSON.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> UserSettings {
        self.read().clone()
    }

    pub fn toggles(&self) -> DetailsToggles {
        self.read().toggles
    }

    pub fn features(&self) -> FeatureFlags {
        self.read().features
    }

    pub fn logging(&self) -> LoggingSettings {
        self.read().logging.clone()
    }

    /// Returns whether the stored value changed.
    pub fn update_show_system(&self, show_system: bool) -> Result<bool> {
        self.update(|settings| {
            let changed = settings.toggles.show_system != show_system;
            settings.toggles.show_system = show_system;
            changed
        })
    }

    /// Returns whether the stored value changed.
    pub fn update_show_7_days(&self, show_7_days: bool) -> Result<bool> {
        self.update(|settings| {
            let changed = settings.toggles.show_7_days != show_7_days;
            settings.toggles.show_7_days = show_7_days;
            changed
        })
    }

    pub fn update_features(&self, features: FeatureFlags) -> Result<()> {
        self.update(|settings| {
            settings.features = features;
            true
        })
        .map(|_| ())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut UserSettings) -> bool,
    {
        let mut guard = self.write();
        let changed = apply(&mut guard);
        if changed {
            self.persist(&guard)?;
        }
        Ok(changed)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
